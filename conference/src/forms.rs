//! Request and response bodies.
//!
//! Inbound forms are all-optional so that required-field checks produce domain errors
//! (`MissingField`) rather than JSON rejections. Field names are camelCase on the wire.

use conference_core::{Conference, EntityKey, FilterSpec, Record, Session, TeeShirtSize, WishListEntry};
use serde::{Deserialize, Serialize};

// ============================================================================
// Profiles
// ============================================================================

/// Editable profile fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMiniForm {
    /// New display name; empty values are ignored.
    pub display_name: Option<String>,
    /// New tee-shirt size.
    pub tee_shirt_size: Option<TeeShirtSize>,
}

// ============================================================================
// Conferences
// ============================================================================

/// Conference fields for create and update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceForm {
    /// Conference name (required on create).
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Topics, replacing the defaults.
    pub topics: Option<Vec<String>>,
    /// City.
    pub city: Option<String>,
    /// Start date; only the first 10 characters (`YYYY-MM-DD`) are read.
    pub start_date: Option<String>,
    /// End date; only the first 10 characters (`YYYY-MM-DD`) are read.
    pub end_date: Option<String>,
    /// Capacity.
    pub max_attendees: Option<u32>,
}

/// A conference as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceView {
    /// Websafe key of the conference.
    pub websafe_key: EntityKey,
    /// Display name of the organizer, empty if the profile is gone.
    pub organizer_display_name: String,
    /// Stored fields.
    #[serde(flatten)]
    pub conference: Conference,
}

impl ConferenceView {
    /// View of `record` organised by `organizer_display_name`.
    #[must_use]
    pub fn new(record: Record<Conference>, organizer_display_name: impl Into<String>) -> Self {
        Self {
            websafe_key: record.key,
            organizer_display_name: organizer_display_name.into(),
            conference: record.model,
        }
    }
}

/// Body of `POST /api/conferences/query`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConferenceQueryForm {
    /// Filter triples, ANDed.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

// ============================================================================
// Sessions
// ============================================================================

/// Session fields for create.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionForm {
    /// Session name.
    pub name: Option<String>,
    /// Highlights, defaults to "Not Available".
    pub highlights: Option<String>,
    /// Speaker name.
    pub speaker: Option<String>,
    /// Duration in minutes.
    pub duration: Option<u32>,
    /// Session type, defaults to "talk".
    pub type_of_session: Option<String>,
    /// Date, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Start time, `HH:MM`.
    pub start_time: Option<String>,
}

/// A session as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Websafe key of the session.
    pub websafe_key: EntityKey,
    /// Websafe key of the parent conference.
    pub conference_key: Option<EntityKey>,
    /// Stored fields.
    #[serde(flatten)]
    pub session: Session,
}

impl From<Record<Session>> for SessionView {
    fn from(record: Record<Session>) -> Self {
        Self {
            conference_key: record.key.parent(),
            websafe_key: record.key,
            session: record.model,
        }
    }
}

/// Query string of `GET /api/sessions/by-speaker-duration`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeakerDurationQuery {
    /// Speaker name.
    pub speaker: String,
    /// Longest duration to include, in minutes.
    pub duration: u32,
}

/// Query string of `GET /api/sessions/by-type-date`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDateQuery {
    /// Session type.
    pub type_of_session: String,
    /// Date, `YYYY-MM-DD`.
    pub date: String,
}

// ============================================================================
// Wishlist
// ============================================================================

/// Body of `POST /api/wishlist`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistForm {
    /// Websafe key of the session to add.
    pub session_key: String,
}

/// A wishlist entry as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistView {
    /// Websafe key of the entry.
    pub websafe_key: EntityKey,
    /// Stored fields.
    #[serde(flatten)]
    pub entry: WishListEntry,
}

impl From<Record<WishListEntry>> for WishlistView {
    fn from(record: Record<WishListEntry>) -> Self {
        Self {
            websafe_key: record.key,
            entry: record.model,
        }
    }
}

// ============================================================================
// Scalars
// ============================================================================

/// `{ "data": bool }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanMessage {
    /// Outcome.
    pub data: bool,
}

/// `{ "data": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMessage {
    /// Payload, empty when nothing is cached.
    pub data: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conference_core::Kind;
    use serde_json::json;

    #[test]
    fn conference_view_flattens_stored_fields() {
        let key = EntityKey::profile("org").child(Kind::Conference, 3);
        let conference = Conference {
            name: "RustConf".into(),
            description: None,
            organizer_user_id: "org".into(),
            topics: vec!["Rust".into()],
            city: "Portland".into(),
            start_date: None,
            end_date: None,
            month: 0,
            max_attendees: 10,
            seats_available: 10,
        };

        let view = ConferenceView::new(Record::new(key.clone(), conference), "Org");
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["websafeKey"], json!(key.to_urlsafe()));
        assert_eq!(json["organizerDisplayName"], json!("Org"));
        assert_eq!(json["seatsAvailable"], json!(10));
        assert!(json.get("conference").is_none());
    }

    #[test]
    fn forms_accept_camel_case_and_missing_fields() {
        let form: SessionForm =
            serde_json::from_value(json!({"name": "Intro", "typeOfSession": "Workshop"})).unwrap();
        assert_eq!(form.type_of_session.as_deref(), Some("Workshop"));
        assert!(form.speaker.is_none());

        let profile: ProfileMiniForm =
            serde_json::from_value(json!({"teeShirtSize": "XL_M"})).unwrap();
        assert_eq!(profile.tee_shirt_size, Some(TeeShirtSize::XlM));
    }

    #[test]
    fn query_form_defaults_to_no_filters() {
        let form: ConferenceQueryForm = serde_json::from_value(json!({})).unwrap();
        assert!(form.filters.is_empty());
    }
}
