use tracing::info;

use confhub_common::{ConferenceAggregate, ConferenceSpeaker, SaveConference, StoreError};

use crate::store::ConferenceStore;

/// Persist one edited conference aggregate: its location, the conference row
/// itself, its speaker set and links, and any requested speaker removals.
///
/// The ordering is load-bearing: the conference row references the location's
/// persisted identity, every link references the conference and its speaker,
/// and link rows are removed before the speaker rows they point at. The whole
/// sequence runs in one store transaction — a failure at any step persists
/// nothing.
pub async fn save_conference(
    store: &dyn ConferenceStore,
    input: &SaveConference,
) -> Result<ConferenceAggregate, StoreError> {
    let mut tx = store.begin().await?;

    let location = tx.upsert_location(&input.location).await?;
    let conference = tx.upsert_conference(&input.conference, location.id).await?;

    let mut speakers = Vec::with_capacity(input.speakers.len());
    for draft in &input.speakers {
        let speaker = tx.upsert_speaker(draft).await?;
        let is_main_speaker = tx
            .upsert_speaker_link(conference.id, speaker.id, draft.is_main_speaker)
            .await?;
        speakers.push(ConferenceSpeaker {
            speaker,
            is_main_speaker,
        });
    }

    if !input.deleted_speaker_ids.is_empty() {
        // Links first, so no link row is ever left pointing at a deleted speaker.
        tx.delete_speaker_links(&input.deleted_speaker_ids).await?;
        tx.delete_speakers(&input.deleted_speaker_ids).await?;
    }

    tx.commit().await?;

    info!(
        conference_id = conference.id,
        speakers = speakers.len(),
        deleted = input.deleted_speaker_ids.len(),
        "conference saved"
    );

    Ok(ConferenceAggregate {
        conference,
        location,
        speakers,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use confhub_common::{ConferenceDraft, LocationDraft, SaveConference, SpeakerDraft};

    use super::*;
    use crate::memory::MemoryStore;

    fn devcon() -> SaveConference {
        SaveConference {
            conference: ConferenceDraft {
                id: None,
                name: "DevCon".to_string(),
                organizer_email: "org@devcon.io".to_string(),
                start_date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
                end_date: Utc.with_ymd_and_hms(2024, 5, 3, 18, 0, 0).unwrap(),
                conference_type_id: 1,
                category_id: 1,
            },
            location: LocationDraft {
                id: None,
                name: Some("Main Hall".to_string()),
                address: Some("1 Conference Way".to_string()),
                latitude: Some(51.5),
                longitude: Some(-0.1),
                city_id: 1,
                county_id: 1,
                country_id: 1,
            },
            speakers: vec![SpeakerDraft {
                id: None,
                name: "Ada Lovelace".to_string(),
                nationality: Some("UK".to_string()),
                rating: Some(4.8),
                is_main_speaker: true,
            }],
            deleted_speaker_ids: vec![],
        }
    }

    /// Second-save input built from the first save's persisted identities,
    /// with unchanged field values.
    fn resave_input(aggregate: &ConferenceAggregate) -> SaveConference {
        SaveConference {
            conference: ConferenceDraft {
                id: Some(aggregate.conference.id),
                name: aggregate.conference.name.clone(),
                organizer_email: aggregate.conference.organizer_email.clone(),
                start_date: aggregate.conference.start_date,
                end_date: aggregate.conference.end_date,
                conference_type_id: aggregate.conference.conference_type_id,
                category_id: aggregate.conference.category_id,
            },
            location: LocationDraft {
                id: Some(aggregate.location.id),
                name: aggregate.location.name.clone(),
                address: aggregate.location.address.clone(),
                latitude: aggregate.location.latitude,
                longitude: aggregate.location.longitude,
                city_id: aggregate.location.city_id,
                county_id: aggregate.location.county_id,
                country_id: aggregate.location.country_id,
            },
            speakers: aggregate
                .speakers
                .iter()
                .map(|cs| SpeakerDraft {
                    id: Some(cs.speaker.id),
                    name: cs.speaker.name.clone(),
                    nationality: cs.speaker.nationality.clone(),
                    rating: cs.speaker.rating,
                    is_main_speaker: cs.is_main_speaker,
                })
                .collect(),
            deleted_speaker_ids: vec![],
        }
    }

    #[tokio::test]
    async fn new_conference_returns_generated_identities() {
        let store = MemoryStore::new();
        let aggregate = save_conference(&store, &devcon()).await.unwrap();

        assert!(aggregate.conference.id > 0);
        assert!(aggregate.location.id > 0);
        assert_eq!(aggregate.conference.location_id, aggregate.location.id);
        assert_eq!(aggregate.speakers.len(), 1);
        assert!(aggregate.speakers[0].speaker.id > 0);
        assert!(aggregate.speakers[0].is_main_speaker);
        assert_eq!(aggregate.conference.name, "DevCon");
    }

    #[tokio::test]
    async fn resave_with_returned_identities_is_idempotent() {
        let store = MemoryStore::new();
        let first = save_conference(&store, &devcon()).await.unwrap();
        let second = save_conference(&store, &resave_input(&first)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.conferences().len(), 1);
        assert_eq!(store.locations().len(), 1);
        assert_eq!(store.speakers().len(), 1);
        assert_eq!(store.links().len(), 1);
    }

    #[tokio::test]
    async fn deleting_speakers_removes_links_before_speakers() {
        let store = MemoryStore::new();
        let mut input = devcon();
        input.speakers.push(SpeakerDraft {
            id: None,
            name: "Grace Hopper".to_string(),
            nationality: Some("US".to_string()),
            rating: Some(4.9),
            is_main_speaker: false,
        });
        let first = save_conference(&store, &input).await.unwrap();
        let removed_id = first.speakers[1].speaker.id;

        let mut second = resave_input(&first);
        second.speakers.truncate(1);
        second.deleted_speaker_ids = vec![removed_id];
        save_conference(&store, &second).await.unwrap();

        assert!(store.speakers().iter().all(|s| s.id != removed_id));
        assert!(store
            .links()
            .iter()
            .all(|(_, speaker_id, _)| *speaker_id != removed_id));

        let ops = store.op_log();
        let links_pos = ops.iter().rposition(|op| *op == "delete_speaker_links");
        let speakers_pos = ops.iter().rposition(|op| *op == "delete_speakers");
        assert!(links_pos.unwrap() < speakers_pos.unwrap());
    }

    #[tokio::test]
    async fn empty_speaker_list_with_deletions_leaves_no_links() {
        let store = MemoryStore::new();
        let first = save_conference(&store, &devcon()).await.unwrap();
        let speaker_id = first.speakers[0].speaker.id;

        let mut second = resave_input(&first);
        second.speakers.clear();
        second.deleted_speaker_ids = vec![speaker_id];
        let aggregate = save_conference(&store, &second).await.unwrap();

        assert!(aggregate.speakers.is_empty());
        assert!(store.links().is_empty());
        assert!(store.speakers().is_empty());
    }

    #[tokio::test]
    async fn failure_mid_save_persists_nothing() {
        let store = MemoryStore::new();
        // Location and conference upserts succeed, the speaker upsert fails.
        store.fail_after(2);

        let result = save_conference(&store, &devcon()).await;
        assert!(matches!(result, Err(StoreError::Database(_))));
        assert!(store.conferences().is_empty());
        assert!(store.locations().is_empty());
        assert!(store.speakers().is_empty());
        assert!(store.links().is_empty());
    }

    #[tokio::test]
    async fn updating_missing_location_fails_not_found() {
        let store = MemoryStore::new();
        let mut input = devcon();
        input.location.id = Some(999);

        let result = save_conference(&store, &input).await;
        assert!(matches!(
            result,
            Err(StoreError::NotFound {
                entity: "location",
                id: 999
            })
        ));
        assert!(store.conferences().is_empty());
    }
}
