use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Persisted entities
// ---------------------------------------------------------------------------

/// A conference row. Owns exactly one location and zero or more speaker links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conference {
    pub id: i64,
    pub name: String,
    pub organizer_email: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub conference_type_id: i32,
    pub category_id: i32,
    pub location_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city_id: i32,
    pub county_id: i32,
    pub country_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: i64,
    pub name: String,
    pub nationality: Option<String>,
    pub rating: Option<f64>,
}

/// A speaker together with its link attributes for one conference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferenceSpeaker {
    pub speaker: Speaker,
    pub is_main_speaker: bool,
}

/// One attendee's registration state for one conference.
/// `(conference_id, attendee_email)` is unique — status updates overwrite
/// in place rather than appending history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    pub conference_id: i64,
    pub attendee_email: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Registered,
    Withdrawn,
    Attended,
}

impl AttendanceStatus {
    pub fn code(self) -> i32 {
        match self {
            AttendanceStatus::Registered => 1,
            AttendanceStatus::Withdrawn => 2,
            AttendanceStatus::Attended => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(AttendanceStatus::Registered),
            2 => Some(AttendanceStatus::Withdrawn),
            3 => Some(AttendanceStatus::Attended),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttendanceStatus::Registered => "Registered",
            AttendanceStatus::Withdrawn => "Withdrawn",
            AttendanceStatus::Attended => "Attended",
        }
    }
}

// ---------------------------------------------------------------------------
// Dictionaries
// ---------------------------------------------------------------------------

/// The flat, read-only lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dictionary {
    Category,
    ConferenceType,
    Country,
    County,
    City,
}

impl Dictionary {
    pub fn table(self) -> &'static str {
        match self {
            Dictionary::Category => "dictionary_category",
            Dictionary::ConferenceType => "dictionary_conference_type",
            Dictionary::Country => "dictionary_country",
            Dictionary::County => "dictionary_county",
            Dictionary::City => "dictionary_city",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub id: i32,
    pub name: String,
    pub code: Option<String>,
}

// ---------------------------------------------------------------------------
// Loader keys
// ---------------------------------------------------------------------------

/// Composite key for the per-viewer attendance-status loader.
///
/// The email is canonicalized on construction so logically identical keys
/// collide in the loader cache and in batch deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendanceKey {
    pub conference_id: i64,
    pub attendee_email: String,
}

impl AttendanceKey {
    pub fn new(conference_id: i64, attendee_email: &str) -> Self {
        Self {
            conference_id,
            attendee_email: canonical_email(attendee_email),
        }
    }
}

/// Canonical form of an attendee email: trimmed, lowercased.
pub fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Write inputs
// ---------------------------------------------------------------------------
//
// One identity convention everywhere: `Some(id)` means update the existing
// row, `None` means insert a new one. Normalization of client-side sentinels
// (zero / negative ids) happens once, at the API input boundary.

#[derive(Debug, Clone, PartialEq)]
pub struct LocationDraft {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city_id: i32,
    pub county_id: i32,
    pub country_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConferenceDraft {
    pub id: Option<i64>,
    pub name: String,
    pub organizer_email: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub conference_type_id: i32,
    pub category_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerDraft {
    pub id: Option<i64>,
    pub name: String,
    pub nationality: Option<String>,
    pub rating: Option<f64>,
    pub is_main_speaker: bool,
}

/// The full input to one conference save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveConference {
    pub conference: ConferenceDraft,
    pub location: LocationDraft,
    pub speakers: Vec<SpeakerDraft>,
    pub deleted_speaker_ids: Vec<i64>,
}

/// The persisted aggregate returned by a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct ConferenceAggregate {
    pub conference: Conference,
    pub location: Location,
    pub speakers: Vec<ConferenceSpeaker>,
}

// ---------------------------------------------------------------------------
// List reads
// ---------------------------------------------------------------------------

/// Zero-based page window. Results are ordered by id ascending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pager {
    pub page: i64,
    pub page_size: i64,
}

/// Optional, AND-combined conference list predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConferenceFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub organizer_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_key_canonicalizes_email() {
        let a = AttendanceKey::new(7, " A@X.com ");
        let b = AttendanceKey::new(7, "a@x.com");
        assert_eq!(a, b);
    }

    #[test]
    fn attendance_status_codes_round_trip() {
        for status in [
            AttendanceStatus::Registered,
            AttendanceStatus::Withdrawn,
            AttendanceStatus::Attended,
        ] {
            assert_eq!(AttendanceStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(AttendanceStatus::from_code(0), None);
    }
}
