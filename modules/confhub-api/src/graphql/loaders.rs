//! Batch loaders over the store's grouped reads.
//!
//! Each loader turns the keys accumulated during one resolver flush into a
//! single grouped query. Keys with no matching row are absent from the
//! returned map, which the dataloader surfaces as `None`. A failed fetch is
//! shared: every caller waiting on that flush sees the same error.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dataloader::{DataLoader, HashMapCache, Loader};

use confhub_common::{
    Attendance, AttendanceKey, Conference, ConferenceSpeaker, Dictionary, DictionaryEntry,
    Location, StoreError,
};
use confhub_store::DynStore;

/// A dataloader whose cache lives as long as the request it was built for.
pub type CachedLoader<T> = DataLoader<T, HashMapCache>;

pub struct ConferenceByIdLoader {
    pub store: DynStore,
}

impl Loader<i64> for ConferenceByIdLoader {
    type Value = Conference;
    type Error = Arc<StoreError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Conference>, Self::Error> {
        self.store.conferences_by_ids(keys).await.map_err(Arc::new)
    }
}

pub struct LocationByIdLoader {
    pub store: DynStore,
}

impl Loader<i64> for LocationByIdLoader {
    type Value = Location;
    type Error = Arc<StoreError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Location>, Self::Error> {
        self.store.locations_by_ids(keys).await.map_err(Arc::new)
    }
}

/// Fan-out loader: every speaker link for a conference, in one query for the
/// whole flush. Conferences without speakers resolve to `None`.
pub struct SpeakersByConferenceLoader {
    pub store: DynStore,
}

impl Loader<i64> for SpeakersByConferenceLoader {
    type Value = Vec<ConferenceSpeaker>;
    type Error = Arc<StoreError>;

    async fn load(
        &self,
        keys: &[i64],
    ) -> Result<HashMap<i64, Vec<ConferenceSpeaker>>, Self::Error> {
        self.store
            .speakers_by_conference_ids(keys)
            .await
            .map_err(Arc::new)
    }
}

/// Composite-key loader for per-viewer attendance status. The key
/// canonicalizes the email, so spelling variants of the same attendee
/// deduplicate before the fetch.
pub struct AttendanceLoader {
    pub store: DynStore,
}

impl Loader<AttendanceKey> for AttendanceLoader {
    type Value = Attendance;
    type Error = Arc<StoreError>;

    async fn load(
        &self,
        keys: &[AttendanceKey],
    ) -> Result<HashMap<AttendanceKey, Attendance>, Self::Error> {
        self.store.attendance_by_keys(keys).await.map_err(Arc::new)
    }
}

// ---------------------------------------------------------------------------
// Dictionary loaders
// ---------------------------------------------------------------------------
//
// One loader type per dictionary so each gets its own batch and cache; a
// category id and a city id must never land in the same grouped query.

macro_rules! dictionary_loader {
    ($name:ident, $dict:expr) => {
        pub struct $name {
            pub store: DynStore,
        }

        impl Loader<i32> for $name {
            type Value = DictionaryEntry;
            type Error = Arc<StoreError>;

            async fn load(
                &self,
                keys: &[i32],
            ) -> Result<HashMap<i32, DictionaryEntry>, Self::Error> {
                self.store
                    .dictionary_by_ids($dict, keys)
                    .await
                    .map_err(Arc::new)
            }
        }
    };
}

dictionary_loader!(CategoryByIdLoader, Dictionary::Category);
dictionary_loader!(TypeByIdLoader, Dictionary::ConferenceType);
dictionary_loader!(CountryByIdLoader, Dictionary::Country);
dictionary_loader!(CountyByIdLoader, Dictionary::County);
dictionary_loader!(CityByIdLoader, Dictionary::City);
