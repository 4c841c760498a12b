//! In-memory store used by tests. Mirrors the Postgres store's semantics:
//! writes made through a transaction are buffered and only become visible
//! on commit, grouped reads return maps with absent keys omitted, and the
//! `(conference_id, speaker_id)` / `(conference_id, attendee_email)` pairs
//! stay unique.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use confhub_common::{
    Attendance, AttendanceKey, AttendanceStatus, Conference, ConferenceDraft, ConferenceFilter,
    ConferenceSpeaker, Dictionary, DictionaryEntry, Location, LocationDraft, Pager, Speaker,
    SpeakerDraft, StoreError,
};

use crate::store::{ConferenceStore, StoreTx};

#[derive(Debug, Clone)]
struct LinkRow {
    conference_id: i64,
    speaker_id: i64,
    is_main_speaker: bool,
}

#[derive(Default, Clone)]
struct State {
    conferences: BTreeMap<i64, Conference>,
    locations: BTreeMap<i64, Location>,
    speakers: BTreeMap<i64, Speaker>,
    links: Vec<LinkRow>,
    attendance: Vec<Attendance>,
    dictionaries: HashMap<Dictionary, Vec<DictionaryEntry>>,
    next_id: i64,
}

impl State {
    fn alloc(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

struct Inner {
    state: Mutex<State>,
    /// Grouped reads issued, as (query name, deduplicated key count).
    read_log: Mutex<Vec<(&'static str, usize)>>,
    /// Committed write operations, in commit order.
    op_log: Mutex<Vec<&'static str>>,
    /// If set, transaction write ops beyond this count fail.
    fail_after: Mutex<Option<usize>>,
    fail_reads: Mutex<bool>,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    next_id: 0,
                    ..State::default()
                }),
                read_log: Mutex::new(Vec::new()),
                op_log: Mutex::new(Vec::new()),
                fail_after: Mutex::new(None),
                fail_reads: Mutex::new(false),
            }),
        }
    }

    pub fn seed_dictionary(&self, dict: Dictionary, entries: Vec<DictionaryEntry>) {
        self.inner
            .state
            .lock()
            .unwrap()
            .dictionaries
            .insert(dict, entries);
    }

    /// Make every transaction write op after the first `n` fail.
    pub fn fail_after(&self, n: usize) {
        *self.inner.fail_after.lock().unwrap() = Some(n);
    }

    /// Make every grouped read fail.
    pub fn fail_reads(&self) {
        *self.inner.fail_reads.lock().unwrap() = true;
    }

    pub fn conferences(&self) -> Vec<Conference> {
        self.inner
            .state
            .lock()
            .unwrap()
            .conferences
            .values()
            .cloned()
            .collect()
    }

    pub fn locations(&self) -> Vec<Location> {
        self.inner
            .state
            .lock()
            .unwrap()
            .locations
            .values()
            .cloned()
            .collect()
    }

    pub fn speakers(&self) -> Vec<Speaker> {
        self.inner
            .state
            .lock()
            .unwrap()
            .speakers
            .values()
            .cloned()
            .collect()
    }

    pub fn links(&self) -> Vec<(i64, i64, bool)> {
        self.inner
            .state
            .lock()
            .unwrap()
            .links
            .iter()
            .map(|l| (l.conference_id, l.speaker_id, l.is_main_speaker))
            .collect()
    }

    pub fn attendance(&self) -> Vec<Attendance> {
        self.inner.state.lock().unwrap().attendance.clone()
    }

    pub fn read_log(&self) -> Vec<(&'static str, usize)> {
        self.inner.read_log.lock().unwrap().clone()
    }

    pub fn clear_read_log(&self) {
        self.inner.read_log.lock().unwrap().clear();
    }

    pub fn op_log(&self) -> Vec<&'static str> {
        self.inner.op_log.lock().unwrap().clone()
    }

    fn grouped_read(&self, name: &'static str, keys: usize) -> Result<(), StoreError> {
        if *self.inner.fail_reads.lock().unwrap() {
            return Err(StoreError::Database("injected read failure".to_string()));
        }
        self.inner.read_log.lock().unwrap().push((name, keys));
        Ok(())
    }
}

fn matches(filter: &ConferenceFilter, conference: &Conference) -> bool {
    if let Some(start) = filter.start_date {
        if conference.start_date < start {
            return false;
        }
    }
    if let Some(end) = filter.end_date {
        if conference.end_date > end {
            return false;
        }
    }
    if let Some(email) = &filter.organizer_email {
        if &conference.organizer_email != email {
            return false;
        }
    }
    true
}

#[async_trait]
impl ConferenceStore for MemoryStore {
    async fn conferences_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Conference>, StoreError> {
        self.grouped_read("conferences_by_ids", ids.len())?;
        let state = self.inner.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.conferences.get(id).map(|c| (*id, c.clone())))
            .collect())
    }

    async fn locations_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Location>, StoreError> {
        self.grouped_read("locations_by_ids", ids.len())?;
        let state = self.inner.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.locations.get(id).map(|l| (*id, l.clone())))
            .collect())
    }

    async fn dictionary_by_ids(
        &self,
        dict: Dictionary,
        ids: &[i32],
    ) -> Result<HashMap<i32, DictionaryEntry>, StoreError> {
        self.grouped_read(dict.table(), ids.len())?;
        let state = self.inner.state.lock().unwrap();
        let entries = state.dictionaries.get(&dict).cloned().unwrap_or_default();
        Ok(entries
            .into_iter()
            .filter(|e| ids.contains(&e.id))
            .map(|e| (e.id, e))
            .collect())
    }

    async fn speakers_by_conference_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Vec<ConferenceSpeaker>>, StoreError> {
        self.grouped_read("speakers_by_conference_ids", ids.len())?;
        let state = self.inner.state.lock().unwrap();
        let mut map: HashMap<i64, Vec<ConferenceSpeaker>> = HashMap::new();
        for link in &state.links {
            if !ids.contains(&link.conference_id) {
                continue;
            }
            if let Some(speaker) = state.speakers.get(&link.speaker_id) {
                map.entry(link.conference_id)
                    .or_default()
                    .push(ConferenceSpeaker {
                        speaker: speaker.clone(),
                        is_main_speaker: link.is_main_speaker,
                    });
            }
        }
        Ok(map)
    }

    async fn attendance_by_keys(
        &self,
        keys: &[AttendanceKey],
    ) -> Result<HashMap<AttendanceKey, Attendance>, StoreError> {
        self.grouped_read("attendance_by_keys", keys.len())?;
        let state = self.inner.state.lock().unwrap();
        let mut map = HashMap::new();
        for row in &state.attendance {
            let key = AttendanceKey::new(row.conference_id, &row.attendee_email);
            if keys.contains(&key) {
                map.insert(key, row.clone());
            }
        }
        Ok(map)
    }

    async fn conference_page(
        &self,
        pager: &Pager,
        filter: &ConferenceFilter,
    ) -> Result<Vec<Conference>, StoreError> {
        let state = self.inner.state.lock().unwrap();
        Ok(state
            .conferences
            .values()
            .filter(|c| matches(filter, c))
            .skip(pager.page.saturating_mul(pager.page_size) as usize)
            .take(pager.page_size as usize)
            .cloned()
            .collect())
    }

    async fn conference_count(&self, filter: &ConferenceFilter) -> Result<i64, StoreError> {
        let state = self.inner.state.lock().unwrap();
        Ok(state
            .conferences
            .values()
            .filter(|c| matches(filter, c))
            .count() as i64)
    }

    async fn dictionary_list(&self, dict: Dictionary) -> Result<Vec<DictionaryEntry>, StoreError> {
        let state = self.inner.state.lock().unwrap();
        Ok(state.dictionaries.get(&dict).cloned().unwrap_or_default())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let working = self.inner.state.lock().unwrap().clone();
        let budget = *self.inner.fail_after.lock().unwrap();
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            working,
            ops: Vec::new(),
            budget,
        }))
    }

    async fn update_attendance(
        &self,
        conference_id: i64,
        attendee_email: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceStatus, StoreError> {
        let mut state = self.inner.state.lock().unwrap();
        match state
            .attendance
            .iter_mut()
            .find(|a| a.conference_id == conference_id && a.attendee_email == attendee_email)
        {
            Some(row) => row.status = status,
            None => state.attendance.push(Attendance {
                conference_id,
                attendee_email: attendee_email.to_string(),
                status,
            }),
        }
        self.inner.op_log.lock().unwrap().push("update_attendance");
        Ok(status)
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

struct MemoryTx {
    inner: Arc<Inner>,
    working: State,
    ops: Vec<&'static str>,
    budget: Option<usize>,
}

impl MemoryTx {
    fn charge(&mut self, op: &'static str) -> Result<(), StoreError> {
        if let Some(budget) = self.budget.as_mut() {
            if *budget == 0 {
                return Err(StoreError::Database("injected write failure".to_string()));
            }
            *budget -= 1;
        }
        self.ops.push(op);
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn upsert_location(&mut self, draft: &LocationDraft) -> Result<Location, StoreError> {
        self.charge("upsert_location")?;
        let id = match draft.id {
            Some(id) => {
                if !self.working.locations.contains_key(&id) {
                    return Err(StoreError::NotFound {
                        entity: "location",
                        id,
                    });
                }
                id
            }
            None => self.working.alloc(),
        };
        let row = Location {
            id,
            name: draft.name.clone(),
            address: draft.address.clone(),
            latitude: draft.latitude,
            longitude: draft.longitude,
            city_id: draft.city_id,
            county_id: draft.county_id,
            country_id: draft.country_id,
        };
        self.working.locations.insert(id, row.clone());
        Ok(row)
    }

    async fn upsert_conference(
        &mut self,
        draft: &ConferenceDraft,
        location_id: i64,
    ) -> Result<Conference, StoreError> {
        self.charge("upsert_conference")?;
        let id = match draft.id {
            Some(id) => {
                if !self.working.conferences.contains_key(&id) {
                    return Err(StoreError::NotFound {
                        entity: "conference",
                        id,
                    });
                }
                id
            }
            None => self.working.alloc(),
        };
        let row = Conference {
            id,
            name: draft.name.clone(),
            organizer_email: draft.organizer_email.clone(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            conference_type_id: draft.conference_type_id,
            category_id: draft.category_id,
            location_id,
        };
        self.working.conferences.insert(id, row.clone());
        Ok(row)
    }

    async fn upsert_speaker(&mut self, draft: &SpeakerDraft) -> Result<Speaker, StoreError> {
        self.charge("upsert_speaker")?;
        let id = match draft.id {
            Some(id) => {
                if !self.working.speakers.contains_key(&id) {
                    return Err(StoreError::NotFound {
                        entity: "speaker",
                        id,
                    });
                }
                id
            }
            None => self.working.alloc(),
        };
        let row = Speaker {
            id,
            name: draft.name.clone(),
            nationality: draft.nationality.clone(),
            rating: draft.rating,
        };
        self.working.speakers.insert(id, row.clone());
        Ok(row)
    }

    async fn upsert_speaker_link(
        &mut self,
        conference_id: i64,
        speaker_id: i64,
        is_main_speaker: bool,
    ) -> Result<bool, StoreError> {
        self.charge("upsert_speaker_link")?;
        match self
            .working
            .links
            .iter_mut()
            .find(|l| l.conference_id == conference_id && l.speaker_id == speaker_id)
        {
            Some(link) => link.is_main_speaker = is_main_speaker,
            None => self.working.links.push(LinkRow {
                conference_id,
                speaker_id,
                is_main_speaker,
            }),
        }
        Ok(is_main_speaker)
    }

    async fn delete_speaker_links(&mut self, speaker_ids: &[i64]) -> Result<u64, StoreError> {
        self.charge("delete_speaker_links")?;
        let before = self.working.links.len();
        self.working
            .links
            .retain(|l| !speaker_ids.contains(&l.speaker_id));
        Ok((before - self.working.links.len()) as u64)
    }

    async fn delete_speakers(&mut self, speaker_ids: &[i64]) -> Result<u64, StoreError> {
        self.charge("delete_speakers")?;
        let before = self.working.speakers.len();
        self.working.speakers.retain(|id, _| !speaker_ids.contains(id));
        Ok((before - self.working.speakers.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.inner.state.lock().unwrap() = self.working;
        self.inner.op_log.lock().unwrap().extend(self.ops);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn attendance_upsert_overwrites_in_place() {
        let store = MemoryStore::new();
        store
            .update_attendance(7, "a@x.com", AttendanceStatus::Attended)
            .await
            .unwrap();
        store
            .update_attendance(7, "a@x.com", AttendanceStatus::Withdrawn)
            .await
            .unwrap();

        let rows = store.attendance();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttendanceStatus::Withdrawn);
    }

    #[tokio::test]
    async fn uncommitted_transaction_is_invisible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_speaker(&SpeakerDraft {
            id: None,
            name: "Ghost".to_string(),
            nationality: None,
            rating: None,
            is_main_speaker: false,
        })
        .await
        .unwrap();
        drop(tx);

        assert!(store.speakers().is_empty());
        assert!(store.op_log().is_empty());
    }

    #[tokio::test]
    async fn page_window_far_past_the_end_is_empty() {
        let store = MemoryStore::new();
        // Offset math must saturate, not overflow, at the extreme page index.
        let pager = Pager {
            page: i64::MAX,
            page_size: 200,
        };
        let rows = store
            .conference_page(&pager, &ConferenceFilter::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn grouped_reads_omit_missing_keys() {
        let store = MemoryStore::new();
        let map = store.speakers_by_conference_ids(&[42]).await.unwrap();
        assert!(map.is_empty());
        assert_eq!(store.read_log(), vec![("speakers_by_conference_ids", 1)]);
    }
}
