use async_graphql::{Context, InputObject, Object, Result, SimpleObject};
use chrono::{DateTime, Utc};

use confhub_common::{
    Attendance, AttendanceKey, AttendanceStatus, Conference, ConferenceAggregate, ConferenceDraft,
    ConferenceFilter, ConferenceSpeaker, DictionaryEntry, Location, LocationDraft, Pager,
    SaveConference, SpeakerDraft,
};

use super::loaders::{
    AttendanceLoader, CachedLoader, CategoryByIdLoader, CityByIdLoader, CountryByIdLoader,
    CountyByIdLoader, LocationByIdLoader, SpeakersByConferenceLoader, TypeByIdLoader,
};

// --- Output types ---

#[derive(SimpleObject)]
#[graphql(name = "DictionaryEntry")]
pub struct GqlDictionaryEntry {
    pub id: i32,
    pub name: String,
    pub code: Option<String>,
}

impl From<DictionaryEntry> for GqlDictionaryEntry {
    fn from(entry: DictionaryEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            code: entry.code,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Speaker")]
pub struct GqlSpeaker {
    pub id: i64,
    pub name: String,
    pub nationality: Option<String>,
    pub rating: Option<f64>,
    pub is_main_speaker: bool,
}

impl From<ConferenceSpeaker> for GqlSpeaker {
    fn from(cs: ConferenceSpeaker) -> Self {
        Self {
            id: cs.speaker.id,
            name: cs.speaker.name,
            nationality: cs.speaker.nationality,
            rating: cs.speaker.rating,
            is_main_speaker: cs.is_main_speaker,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "AttendanceStatus")]
pub struct GqlAttendanceStatus {
    pub id: i32,
    pub name: String,
}

impl From<AttendanceStatus> for GqlAttendanceStatus {
    fn from(status: AttendanceStatus) -> Self {
        Self {
            id: status.code(),
            name: status.name().to_string(),
        }
    }
}

// --- Location ---

pub struct GqlLocation(pub Location);

#[Object(name = "Location")]
impl GqlLocation {
    async fn id(&self) -> i64 {
        self.0.id
    }
    async fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }
    async fn address(&self) -> Option<&str> {
        self.0.address.as_deref()
    }
    async fn latitude(&self) -> Option<f64> {
        self.0.latitude
    }
    async fn longitude(&self) -> Option<f64> {
        self.0.longitude
    }
    async fn city(&self, ctx: &Context<'_>) -> Result<GqlDictionaryEntry> {
        dictionary_field::<CityByIdLoader>(ctx, self.0.city_id, "city").await
    }
    async fn county(&self, ctx: &Context<'_>) -> Result<GqlDictionaryEntry> {
        dictionary_field::<CountyByIdLoader>(ctx, self.0.county_id, "county").await
    }
    async fn country(&self, ctx: &Context<'_>) -> Result<GqlDictionaryEntry> {
        dictionary_field::<CountryByIdLoader>(ctx, self.0.country_id, "country").await
    }
}

/// Resolve one dictionary reference through its loader. Dictionary rows are
/// foreign-keyed, so a missing entry is a data error, not an absent field.
async fn dictionary_field<L>(
    ctx: &Context<'_>,
    id: i32,
    entity: &str,
) -> Result<GqlDictionaryEntry>
where
    L: async_graphql::dataloader::Loader<
            i32,
            Value = DictionaryEntry,
            Error = std::sync::Arc<confhub_common::StoreError>,
        > + Send
        + Sync
        + 'static,
{
    let loader = ctx.data_unchecked::<CachedLoader<L>>();
    loader
        .load_one(id)
        .await?
        .map(GqlDictionaryEntry::from)
        .ok_or_else(|| format!("{entity} {id} not found").into())
}

// --- Conference ---

pub struct GqlConference(pub Conference);

#[Object(name = "Conference")]
impl GqlConference {
    async fn id(&self) -> i64 {
        self.0.id
    }
    async fn name(&self) -> &str {
        &self.0.name
    }
    async fn organizer_email(&self) -> &str {
        &self.0.organizer_email
    }
    async fn start_date(&self) -> DateTime<Utc> {
        self.0.start_date
    }
    async fn end_date(&self) -> DateTime<Utc> {
        self.0.end_date
    }

    #[graphql(name = "type")]
    async fn conference_type(&self, ctx: &Context<'_>) -> Result<GqlDictionaryEntry> {
        dictionary_field::<TypeByIdLoader>(ctx, self.0.conference_type_id, "conference type").await
    }

    async fn category(&self, ctx: &Context<'_>) -> Result<GqlDictionaryEntry> {
        dictionary_field::<CategoryByIdLoader>(ctx, self.0.category_id, "category").await
    }

    async fn location(&self, ctx: &Context<'_>) -> Result<GqlLocation> {
        let loader = ctx.data_unchecked::<CachedLoader<LocationByIdLoader>>();
        loader
            .load_one(self.0.location_id)
            .await?
            .map(GqlLocation)
            .ok_or_else(|| format!("location {} not found", self.0.location_id).into())
    }

    async fn speakers(&self, ctx: &Context<'_>) -> Result<Vec<GqlSpeaker>> {
        let loader = ctx.data_unchecked::<CachedLoader<SpeakersByConferenceLoader>>();
        Ok(loader
            .load_one(self.0.id)
            .await?
            .unwrap_or_default()
            .into_iter()
            .map(GqlSpeaker::from)
            .collect())
    }

    /// The given attendee's registration status for this conference, if any.
    async fn status(
        &self,
        ctx: &Context<'_>,
        attendee_email: String,
    ) -> Result<Option<GqlAttendanceStatus>> {
        let loader = ctx.data_unchecked::<CachedLoader<AttendanceLoader>>();
        let key = AttendanceKey::new(self.0.id, &attendee_email);
        Ok(loader
            .load_one(key)
            .await?
            .map(|a: Attendance| GqlAttendanceStatus::from(a.status)))
    }
}

// --- Saved aggregate ---

/// What a successful save returns: the persisted rows with their generated
/// identities, so the client can re-save without guessing ids.
pub struct GqlSavedConference(pub ConferenceAggregate);

#[Object(name = "SavedConference")]
impl GqlSavedConference {
    async fn id(&self) -> i64 {
        self.0.conference.id
    }
    async fn name(&self) -> &str {
        &self.0.conference.name
    }
    async fn organizer_email(&self) -> &str {
        &self.0.conference.organizer_email
    }
    async fn start_date(&self) -> DateTime<Utc> {
        self.0.conference.start_date
    }
    async fn end_date(&self) -> DateTime<Utc> {
        self.0.conference.end_date
    }
    #[graphql(name = "type")]
    async fn conference_type(&self, ctx: &Context<'_>) -> Result<GqlDictionaryEntry> {
        dictionary_field::<TypeByIdLoader>(ctx, self.0.conference.conference_type_id, "conference type")
            .await
    }
    async fn category(&self, ctx: &Context<'_>) -> Result<GqlDictionaryEntry> {
        dictionary_field::<CategoryByIdLoader>(ctx, self.0.conference.category_id, "category").await
    }
    async fn location(&self) -> GqlLocation {
        GqlLocation(self.0.location.clone())
    }
    async fn speakers(&self) -> Vec<GqlSpeaker> {
        self.0.speakers.iter().cloned().map(GqlSpeaker::from).collect()
    }
}

// --- List wrapper ---

#[derive(SimpleObject)]
#[graphql(name = "Pagination")]
pub struct GqlPagination {
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
}

#[derive(SimpleObject)]
#[graphql(name = "ConferenceList")]
pub struct GqlConferenceList {
    pub values: Vec<GqlConference>,
    pub pagination: GqlPagination,
}

// --- Input types ---

#[derive(InputObject)]
pub struct PagerInput {
    pub page: i64,
    pub page_size: i64,
}

impl PagerInput {
    /// Clamp client values into a sane window: negative pages read as the
    /// first page, page size is capped.
    pub fn clamped(&self) -> Pager {
        Pager {
            page: self.page.max(0),
            page_size: self.page_size.clamp(1, 200),
        }
    }
}

#[derive(InputObject)]
pub struct ConferenceFilterInput {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub organizer_email: Option<String>,
}

impl From<ConferenceFilterInput> for ConferenceFilter {
    fn from(input: ConferenceFilterInput) -> Self {
        ConferenceFilter {
            start_date: input.start_date,
            end_date: input.end_date,
            organizer_email: input.organizer_email,
        }
    }
}

#[derive(InputObject)]
pub struct AttendeeInput {
    pub attendee_email: String,
    pub conference_id: i64,
}

#[derive(InputObject)]
pub struct TypeInput {
    pub id: i32,
    pub name: String,
}

#[derive(InputObject)]
pub struct CategoryInput {
    pub id: i32,
    pub name: String,
}

#[derive(InputObject)]
pub struct LocationInput {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city_id: i32,
    pub county_id: i32,
    pub country_id: i32,
}

#[derive(InputObject)]
pub struct SpeakerInput {
    pub id: Option<i64>,
    pub name: String,
    pub nationality: Option<String>,
    pub rating: Option<f64>,
    #[graphql(default)]
    pub is_main_speaker: bool,
}

#[derive(InputObject)]
pub struct ConferenceInput {
    pub id: Option<i64>,
    pub name: String,
    pub organizer_email: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[graphql(name = "type")]
    pub conference_type: TypeInput,
    pub category: CategoryInput,
    pub location: LocationInput,
    pub speakers: Vec<SpeakerInput>,
    #[graphql(default)]
    pub deleted_speakers: Vec<i64>,
}

impl ConferenceInput {
    pub fn into_save(self) -> SaveConference {
        SaveConference {
            conference: ConferenceDraft {
                id: normalize_id(self.id),
                name: self.name,
                organizer_email: self.organizer_email,
                start_date: self.start_date,
                end_date: self.end_date,
                conference_type_id: self.conference_type.id,
                category_id: self.category.id,
            },
            location: LocationDraft {
                id: normalize_id(self.location.id),
                name: self.location.name,
                address: self.location.address,
                latitude: self.location.latitude,
                longitude: self.location.longitude,
                city_id: self.location.city_id,
                county_id: self.location.county_id,
                country_id: self.location.country_id,
            },
            speakers: self
                .speakers
                .into_iter()
                .map(|s| SpeakerDraft {
                    id: normalize_id(s.id),
                    name: s.name,
                    nationality: s.nationality,
                    rating: s.rating,
                    is_main_speaker: s.is_main_speaker,
                })
                .collect(),
            deleted_speaker_ids: self
                .deleted_speakers
                .into_iter()
                .filter(|id| *id > 0)
                .collect(),
        }
    }
}

/// Clients historically send zero or a negative id to mean "no identity yet".
/// Normalized once here: everything downstream sees `Some(id)` = update,
/// `None` = insert.
fn normalize_id(id: Option<i64>) -> Option<i64> {
    id.filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn normalize_id_treats_non_positive_as_absent() {
        assert_eq!(normalize_id(None), None);
        assert_eq!(normalize_id(Some(0)), None);
        assert_eq!(normalize_id(Some(-1)), None);
        assert_eq!(normalize_id(Some(42)), Some(42));
    }

    #[test]
    fn into_save_normalizes_every_identity() {
        let input = ConferenceInput {
            id: Some(0),
            name: "DevCon".to_string(),
            organizer_email: "org@devcon.io".to_string(),
            start_date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 5, 3, 18, 0, 0).unwrap(),
            conference_type: TypeInput {
                id: 1,
                name: "Tech".to_string(),
            },
            category: CategoryInput {
                id: 2,
                name: "General".to_string(),
            },
            location: LocationInput {
                id: Some(-7),
                name: None,
                address: None,
                latitude: None,
                longitude: None,
                city_id: 1,
                county_id: 1,
                country_id: 1,
            },
            speakers: vec![SpeakerInput {
                id: Some(9),
                name: "Ada Lovelace".to_string(),
                nationality: None,
                rating: None,
                is_main_speaker: true,
            }],
            deleted_speakers: vec![0, -3, 5],
        };

        let save = input.into_save();
        assert_eq!(save.conference.id, None);
        assert_eq!(save.location.id, None);
        assert_eq!(save.speakers[0].id, Some(9));
        assert_eq!(save.deleted_speaker_ids, vec![5]);
        assert_eq!(save.conference.conference_type_id, 1);
        assert_eq!(save.conference.category_id, 2);
    }

    #[test]
    fn pager_clamps_out_of_range_values() {
        let pager = PagerInput {
            page: -3,
            page_size: 100_000,
        }
        .clamped();
        assert_eq!(pager.page, 0);
        assert_eq!(pager.page_size, 200);

        let pager = PagerInput {
            page: 2,
            page_size: 0,
        }
        .clamped();
        assert_eq!(pager.page, 2);
        assert_eq!(pager.page_size, 1);
    }
}
