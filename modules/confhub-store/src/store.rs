use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use confhub_common::{
    Attendance, AttendanceKey, AttendanceStatus, Conference, ConferenceDraft, ConferenceFilter,
    ConferenceSpeaker, Dictionary, DictionaryEntry, Location, LocationDraft, Pager, Speaker,
    SpeakerDraft, StoreError,
};

pub type DynStore = Arc<dyn ConferenceStore>;

/// The relational store consumed by the loaders and the save orchestrator.
///
/// Grouped reads take the deduplicated key set for one loader flush and
/// return a map from requested key to value; keys with no matching rows are
/// simply absent. Writes that must be atomic go through [`StoreTx`].
#[async_trait]
pub trait ConferenceStore: Send + Sync {
    // --- Grouped reads (one query per loader flush) ---

    async fn conferences_by_ids(&self, ids: &[i64])
        -> Result<HashMap<i64, Conference>, StoreError>;

    async fn locations_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Location>, StoreError>;

    async fn dictionary_by_ids(
        &self,
        dict: Dictionary,
        ids: &[i32],
    ) -> Result<HashMap<i32, DictionaryEntry>, StoreError>;

    /// Fan-out read: all speaker links for the given conferences, grouped by
    /// conference id. A conference with no speakers has no entry.
    async fn speakers_by_conference_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Vec<ConferenceSpeaker>>, StoreError>;

    async fn attendance_by_keys(
        &self,
        keys: &[AttendanceKey],
    ) -> Result<HashMap<AttendanceKey, Attendance>, StoreError>;

    // --- List reads ---

    async fn conference_page(
        &self,
        pager: &Pager,
        filter: &ConferenceFilter,
    ) -> Result<Vec<Conference>, StoreError>;

    /// Total count over the same predicates, independent of the page window.
    async fn conference_count(&self, filter: &ConferenceFilter) -> Result<i64, StoreError>;

    async fn dictionary_list(&self, dict: Dictionary) -> Result<Vec<DictionaryEntry>, StoreError>;

    // --- Writes ---

    /// Start an atomic write unit. Dropping the returned handle without
    /// calling [`StoreTx::commit`] discards every write made through it.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    /// Update-or-insert the attendance row keyed by
    /// `(conference_id, attendee_email)`. Returns the persisted status.
    async fn update_attendance(
        &self,
        conference_id: i64,
        attendee_email: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceStatus, StoreError>;
}

/// One atomic sequence of writes against the store.
#[async_trait]
pub trait StoreTx: Send {
    /// `Some(id)` updates the existing row (NotFound if absent), `None`
    /// inserts. Returns the persisted row including its identity.
    async fn upsert_location(&mut self, draft: &LocationDraft) -> Result<Location, StoreError>;

    async fn upsert_conference(
        &mut self,
        draft: &ConferenceDraft,
        location_id: i64,
    ) -> Result<Conference, StoreError>;

    async fn upsert_speaker(&mut self, draft: &SpeakerDraft) -> Result<Speaker, StoreError>;

    /// Upsert the `(conference_id, speaker_id)` link; the pair is unique, so
    /// re-saving an existing pair updates `is_main_speaker` in place.
    /// Returns the persisted flag.
    async fn upsert_speaker_link(
        &mut self,
        conference_id: i64,
        speaker_id: i64,
        is_main_speaker: bool,
    ) -> Result<bool, StoreError>;

    async fn delete_speaker_links(&mut self, speaker_ids: &[i64]) -> Result<u64, StoreError>;

    async fn delete_speakers(&mut self, speaker_ids: &[i64]) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
