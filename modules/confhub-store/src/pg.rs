use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::info;

use confhub_common::{
    Attendance, AttendanceKey, AttendanceStatus, Conference, ConferenceDraft, ConferenceFilter,
    ConferenceSpeaker, Dictionary, DictionaryEntry, Location, LocationDraft, Pager, Speaker,
    SpeakerDraft, StoreError,
};

use crate::store::{ConferenceStore, StoreTx};

// ---------------------------------------------------------------------------
// Row tuples
// ---------------------------------------------------------------------------

type ConferenceRow = (
    i64,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    i32,
    i32,
    i64,
);
type LocationRow = (
    i64,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<f64>,
    i32,
    i32,
    i32,
);
type SpeakerRow = (i64, String, Option<String>, Option<f64>);

const CONFERENCE_COLUMNS: &str =
    "id, name, organizer_email, start_date, end_date, conference_type_id, category_id, location_id";
const LOCATION_COLUMNS: &str =
    "id, name, address, latitude, longitude, city_id, county_id, country_id";
const SPEAKER_COLUMNS: &str = "id, name, nationality, rating";

fn conference(r: ConferenceRow) -> Conference {
    Conference {
        id: r.0,
        name: r.1,
        organizer_email: r.2,
        start_date: r.3,
        end_date: r.4,
        conference_type_id: r.5,
        category_id: r.6,
        location_id: r.7,
    }
}

fn location(r: LocationRow) -> Location {
    Location {
        id: r.0,
        name: r.1,
        address: r.2,
        latitude: r.3,
        longitude: r.4,
        city_id: r.5,
        county_id: r.6,
        country_id: r.7,
    }
}

fn speaker(r: SpeakerRow) -> Speaker {
    Speaker {
        id: r.0,
        name: r.1,
        nationality: r.2,
        rating: r.3,
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Database(e.to_string())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(map_sqlx)?;
        info!("connected to Postgres");
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

/// Append the optional, AND-combined list predicates.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ConferenceFilter) {
    let mut clause = " WHERE ";
    if let Some(start) = filter.start_date {
        qb.push(clause).push("start_date >= ").push_bind(start);
        clause = " AND ";
    }
    if let Some(end) = filter.end_date {
        qb.push(clause).push("end_date <= ").push_bind(end);
        clause = " AND ";
    }
    if let Some(email) = &filter.organizer_email {
        qb.push(clause)
            .push("organizer_email = ")
            .push_bind(email.clone());
    }
}

#[async_trait]
impl ConferenceStore for PgStore {
    async fn conferences_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Conference>, StoreError> {
        let rows: Vec<ConferenceRow> = sqlx::query_as(&format!(
            "SELECT {CONFERENCE_COLUMNS} FROM conference WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(|r| (r.0, conference(r))).collect())
    }

    async fn locations_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Location>, StoreError> {
        let rows: Vec<LocationRow> = sqlx::query_as(&format!(
            "SELECT {LOCATION_COLUMNS} FROM location WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(|r| (r.0, location(r))).collect())
    }

    async fn dictionary_by_ids(
        &self,
        dict: Dictionary,
        ids: &[i32],
    ) -> Result<HashMap<i32, DictionaryEntry>, StoreError> {
        let rows: Vec<(i32, String, Option<String>)> = sqlx::query_as(&format!(
            "SELECT id, name, code FROM {} WHERE id = ANY($1)",
            dict.table()
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, code)| (id, DictionaryEntry { id, name, code }))
            .collect())
    }

    async fn speakers_by_conference_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Vec<ConferenceSpeaker>>, StoreError> {
        let rows: Vec<(i64, i64, String, Option<String>, Option<f64>, bool)> = sqlx::query_as(
            "SELECT cs.conference_id, s.id, s.name, s.nationality, s.rating, cs.is_main_speaker \
             FROM conference_speaker cs \
             JOIN speaker s ON s.id = cs.speaker_id \
             WHERE cs.conference_id = ANY($1) \
             ORDER BY s.id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut map: HashMap<i64, Vec<ConferenceSpeaker>> = HashMap::new();
        for (conference_id, id, name, nationality, rating, is_main_speaker) in rows {
            map.entry(conference_id).or_default().push(ConferenceSpeaker {
                speaker: Speaker {
                    id,
                    name,
                    nationality,
                    rating,
                },
                is_main_speaker,
            });
        }
        Ok(map)
    }

    async fn attendance_by_keys(
        &self,
        keys: &[AttendanceKey],
    ) -> Result<HashMap<AttendanceKey, Attendance>, StoreError> {
        let ids: Vec<i64> = keys.iter().map(|k| k.conference_id).collect();
        let emails: Vec<String> = keys.iter().map(|k| k.attendee_email.clone()).collect();

        let rows: Vec<(i64, String, i32)> = sqlx::query_as(
            "SELECT conference_id, attendee_email, status_id FROM conference_attendee \
             WHERE (conference_id, attendee_email) IN \
                   (SELECT * FROM unnest($1::bigint[], $2::text[]))",
        )
        .bind(&ids)
        .bind(&emails)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut map = HashMap::new();
        for (conference_id, attendee_email, status_id) in rows {
            let status = AttendanceStatus::from_code(status_id).ok_or_else(|| {
                StoreError::Database(format!("unknown attendance status code {status_id}"))
            })?;
            map.insert(
                AttendanceKey::new(conference_id, &attendee_email),
                Attendance {
                    conference_id,
                    attendee_email,
                    status,
                },
            );
        }
        Ok(map)
    }

    async fn conference_page(
        &self,
        pager: &Pager,
        filter: &ConferenceFilter,
    ) -> Result<Vec<Conference>, StoreError> {
        let mut qb = QueryBuilder::new(format!("SELECT {CONFERENCE_COLUMNS} FROM conference"));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY id OFFSET ");
        qb.push_bind(pager.page.saturating_mul(pager.page_size));
        qb.push(" LIMIT ");
        qb.push_bind(pager.page_size);

        let rows: Vec<ConferenceRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(conference).collect())
    }

    async fn conference_count(&self, filter: &ConferenceFilter) -> Result<i64, StoreError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM conference");
        push_filters(&mut qb, filter);

        qb.build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn dictionary_list(&self, dict: Dictionary) -> Result<Vec<DictionaryEntry>, StoreError> {
        let rows: Vec<(i32, String, Option<String>)> = sqlx::query_as(&format!(
            "SELECT id, name, code FROM {} ORDER BY id",
            dict.table()
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, code)| DictionaryEntry { id, name, code })
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn update_attendance(
        &self,
        conference_id: i64,
        attendee_email: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceStatus, StoreError> {
        let (status_id,): (i32,) = sqlx::query_as(
            "INSERT INTO conference_attendee (conference_id, attendee_email, status_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (conference_id, attendee_email) \
             DO UPDATE SET status_id = EXCLUDED.status_id \
             RETURNING status_id",
        )
        .bind(conference_id)
        .bind(attendee_email)
        .bind(status.code())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        AttendanceStatus::from_code(status_id).ok_or_else(|| {
            StoreError::Database(format!("unknown attendance status code {status_id}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn upsert_location(&mut self, draft: &LocationDraft) -> Result<Location, StoreError> {
        let row: Option<LocationRow> = match draft.id {
            Some(id) => sqlx::query_as(&format!(
                "UPDATE location SET name = $1, address = $2, latitude = $3, longitude = $4, \
                 city_id = $5, county_id = $6, country_id = $7 \
                 WHERE id = $8 RETURNING {LOCATION_COLUMNS}"
            ))
            .bind(&draft.name)
            .bind(&draft.address)
            .bind(draft.latitude)
            .bind(draft.longitude)
            .bind(draft.city_id)
            .bind(draft.county_id)
            .bind(draft.country_id)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?,
            None => Some(
                sqlx::query_as(&format!(
                    "INSERT INTO location (name, address, latitude, longitude, city_id, county_id, country_id) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {LOCATION_COLUMNS}"
                ))
                .bind(&draft.name)
                .bind(&draft.address)
                .bind(draft.latitude)
                .bind(draft.longitude)
                .bind(draft.city_id)
                .bind(draft.county_id)
                .bind(draft.country_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_sqlx)?,
            ),
        };

        match row {
            Some(r) => Ok(location(r)),
            None => Err(StoreError::NotFound {
                entity: "location",
                id: draft.id.unwrap_or_default(),
            }),
        }
    }

    async fn upsert_conference(
        &mut self,
        draft: &ConferenceDraft,
        location_id: i64,
    ) -> Result<Conference, StoreError> {
        let row: Option<ConferenceRow> = match draft.id {
            Some(id) => sqlx::query_as(&format!(
                "UPDATE conference SET name = $1, organizer_email = $2, start_date = $3, \
                 end_date = $4, conference_type_id = $5, category_id = $6, location_id = $7 \
                 WHERE id = $8 RETURNING {CONFERENCE_COLUMNS}"
            ))
            .bind(&draft.name)
            .bind(&draft.organizer_email)
            .bind(draft.start_date)
            .bind(draft.end_date)
            .bind(draft.conference_type_id)
            .bind(draft.category_id)
            .bind(location_id)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?,
            None => Some(
                sqlx::query_as(&format!(
                    "INSERT INTO conference (name, organizer_email, start_date, end_date, \
                     conference_type_id, category_id, location_id) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CONFERENCE_COLUMNS}"
                ))
                .bind(&draft.name)
                .bind(&draft.organizer_email)
                .bind(draft.start_date)
                .bind(draft.end_date)
                .bind(draft.conference_type_id)
                .bind(draft.category_id)
                .bind(location_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_sqlx)?,
            ),
        };

        match row {
            Some(r) => Ok(conference(r)),
            None => Err(StoreError::NotFound {
                entity: "conference",
                id: draft.id.unwrap_or_default(),
            }),
        }
    }

    async fn upsert_speaker(&mut self, draft: &SpeakerDraft) -> Result<Speaker, StoreError> {
        let row: Option<SpeakerRow> = match draft.id {
            Some(id) => sqlx::query_as(&format!(
                "UPDATE speaker SET name = $1, nationality = $2, rating = $3 \
                 WHERE id = $4 RETURNING {SPEAKER_COLUMNS}"
            ))
            .bind(&draft.name)
            .bind(&draft.nationality)
            .bind(draft.rating)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?,
            None => Some(
                sqlx::query_as(&format!(
                    "INSERT INTO speaker (name, nationality, rating) \
                     VALUES ($1, $2, $3) RETURNING {SPEAKER_COLUMNS}"
                ))
                .bind(&draft.name)
                .bind(&draft.nationality)
                .bind(draft.rating)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_sqlx)?,
            ),
        };

        match row {
            Some(r) => Ok(speaker(r)),
            None => Err(StoreError::NotFound {
                entity: "speaker",
                id: draft.id.unwrap_or_default(),
            }),
        }
    }

    async fn upsert_speaker_link(
        &mut self,
        conference_id: i64,
        speaker_id: i64,
        is_main_speaker: bool,
    ) -> Result<bool, StoreError> {
        let (flag,): (bool,) = sqlx::query_as(
            "INSERT INTO conference_speaker (conference_id, speaker_id, is_main_speaker) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (conference_id, speaker_id) \
             DO UPDATE SET is_main_speaker = EXCLUDED.is_main_speaker \
             RETURNING is_main_speaker",
        )
        .bind(conference_id)
        .bind(speaker_id)
        .bind(is_main_speaker)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        Ok(flag)
    }

    async fn delete_speaker_links(&mut self, speaker_ids: &[i64]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM conference_speaker WHERE speaker_id = ANY($1)")
            .bind(speaker_ids)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn delete_speakers(&mut self, speaker_ids: &[i64]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM speaker WHERE id = ANY($1)")
            .bind(speaker_ids)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}
