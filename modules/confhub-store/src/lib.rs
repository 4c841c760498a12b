pub mod pg;
pub mod save;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use pg::PgStore;
pub use save::save_conference;
pub use store::{ConferenceStore, DynStore, StoreTx};
