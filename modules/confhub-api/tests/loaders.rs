//! Loader behavior against the in-memory store: one grouped fetch per flush,
//! request-lifetime memoization, absent keys, and shared batch failures.

use std::sync::Arc;

use confhub_api::graphql::context::cached;
use confhub_api::graphql::loaders::{
    AttendanceLoader, SpeakersByConferenceLoader, TypeByIdLoader,
};
use confhub_common::{AttendanceKey, AttendanceStatus, Dictionary, DictionaryEntry};
use confhub_store::memory::MemoryStore;
use confhub_store::{ConferenceStore, DynStore};

fn type_entries() -> Vec<DictionaryEntry> {
    (1..=3)
        .map(|id| DictionaryEntry {
            id,
            name: format!("Type {id}"),
            code: None,
        })
        .collect()
}

#[tokio::test]
async fn one_grouped_fetch_per_flush_with_deduplication() {
    let store = MemoryStore::new();
    store.seed_dictionary(Dictionary::ConferenceType, type_entries());
    let dyn_store: DynStore = Arc::new(store.clone());
    let loader = cached(TypeByIdLoader { store: dyn_store });

    let (a, b, c) = tokio::join!(loader.load_one(1), loader.load_one(2), loader.load_one(1));
    assert_eq!(a.unwrap().unwrap().name, "Type 1");
    assert_eq!(b.unwrap().unwrap().name, "Type 2");
    assert_eq!(c.unwrap().unwrap().name, "Type 1");

    // One grouped query carrying the two distinct keys.
    assert_eq!(store.read_log(), vec![("dictionary_conference_type", 2)]);
}

#[tokio::test]
async fn repeated_key_is_memoized_across_flushes() {
    let store = MemoryStore::new();
    store.seed_dictionary(Dictionary::ConferenceType, type_entries());
    let dyn_store: DynStore = Arc::new(store.clone());
    let loader = cached(TypeByIdLoader { store: dyn_store });

    loader.load_one(1).await.unwrap();
    loader.load_one(1).await.unwrap();
    loader.load_one(1).await.unwrap();

    assert_eq!(store.read_log(), vec![("dictionary_conference_type", 1)]);
}

#[tokio::test]
async fn fan_out_key_with_no_rows_resolves_absent() {
    let store = MemoryStore::new();
    let loader = cached(SpeakersByConferenceLoader {
        store: Arc::new(store.clone()),
    });

    // Resolvers map the absent entry to an empty speaker list.
    let result = loader.load_one(42).await.unwrap();
    assert!(result.is_none());
    assert_eq!(store.read_log(), vec![("speakers_by_conference_ids", 1)]);
}

#[tokio::test]
async fn batch_failure_fails_every_pending_caller() {
    let store = MemoryStore::new();
    store.fail_reads();
    let loader = cached(TypeByIdLoader {
        store: Arc::new(store.clone()),
    });

    let (a, b) = tokio::join!(loader.load_one(1), loader.load_one(2));
    let a_err = a.unwrap_err();
    let b_err = b.unwrap_err();
    assert_eq!(a_err.to_string(), b_err.to_string());
    // No grouped read was recorded: the batch failed as a unit.
    assert!(store.read_log().is_empty());
}

#[tokio::test]
async fn composite_keys_canonicalize_and_dedupe() {
    let store = MemoryStore::new();
    store
        .update_attendance(7, "a@x.com", AttendanceStatus::Attended)
        .await
        .unwrap();
    let loader = cached(AttendanceLoader {
        store: Arc::new(store.clone()),
    });

    // Spelling variants of the same attendee collapse into one key.
    let (a, b) = tokio::join!(
        loader.load_one(AttendanceKey::new(7, " A@X.com ")),
        loader.load_one(AttendanceKey::new(7, "a@x.com")),
    );
    assert_eq!(a.unwrap().unwrap().status, AttendanceStatus::Attended);
    assert_eq!(b.unwrap().unwrap().status, AttendanceStatus::Attended);
    assert_eq!(store.read_log(), vec![("attendance_by_keys", 1)]);
}
