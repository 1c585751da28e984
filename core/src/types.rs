//! Persisted domain types.
//!
//! Property names are camelCase on the wire and in the store, so filter clauses refer to
//! them directly (`maxAttendees`, `typeOfSession`, ...).

use crate::entity::Model;
use crate::key::{EntityKey, Kind};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// City used when a conference is created without one.
pub const DEFAULT_CITY: &str = "Default City";

/// Topics used when a conference is created without any.
pub const DEFAULT_TOPICS: [&str; 2] = ["Default", "Topic"];

/// Highlights used when a session is created without any.
pub const DEFAULT_HIGHLIGHTS: &str = "Not Available";

/// Session type used when a session is created without one.
pub const DEFAULT_SESSION_TYPE: &str = "talk";

/// T-shirt sizes a profile can declare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum TeeShirtSize {
    #[default]
    NotSpecified,
    XsM,
    XsW,
    SM,
    SW,
    MM,
    MW,
    LM,
    LW,
    XlM,
    XlW,
    XxlM,
    XxlW,
    XxxlM,
    XxxlW,
}

/// Authenticated identity of the user making a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    /// Stable user identifier.
    pub user_id: String,
    /// Contact address.
    pub email: String,
    /// Name supplied by the identity provider, if any.
    pub display_name: Option<String>,
}

impl Caller {
    /// Identity with no display name.
    #[must_use]
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            display_name: None,
        }
    }

    /// Key of the caller's profile.
    #[must_use]
    pub fn profile_key(&self) -> EntityKey {
        EntityKey::profile(&self.user_id)
    }

    /// Profile created the first time the caller is seen.
    #[must_use]
    pub fn default_profile(&self) -> Profile {
        let display_name = self
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.user_id.clone());
        Profile::new(&self.user_id, display_name, &self.email)
    }
}

/// A user profile, root of the user's entity group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Stable user identifier (also the key name).
    pub user_id: String,
    /// Name shown to other users.
    pub display_name: String,
    /// Contact address.
    pub main_email: String,
    /// Declared t-shirt size.
    #[serde(default)]
    pub tee_shirt_size: TeeShirtSize,
    /// Conferences the user registered for, in registration order, no duplicates.
    #[serde(default)]
    pub conference_keys_to_attend: Vec<EntityKey>,
}

impl Profile {
    /// Fresh profile with no registrations.
    #[must_use]
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, main_email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            main_email: main_email.into(),
            tee_shirt_size: TeeShirtSize::NotSpecified,
            conference_keys_to_attend: Vec::new(),
        }
    }

    /// Store key of the profile.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        EntityKey::profile(&self.user_id)
    }

    /// Whether the user is registered for `conference`.
    #[must_use]
    pub fn is_attending(&self, conference: &EntityKey) -> bool {
        self.conference_keys_to_attend.contains(conference)
    }
}

impl Model for Profile {
    const KIND: Kind = Kind::Profile;
}

/// A conference, child of its organizer's profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    /// Display name; also the default sort key.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Organizer's user id. Immutable.
    pub organizer_user_id: String,
    /// Topics; filters match any element.
    pub topics: Vec<String>,
    /// Host city.
    pub city: String,
    /// First day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Month of `start_date`, 0 when unknown.
    pub month: u32,
    /// Capacity. Zero means no seats at all.
    pub max_attendees: u32,
    /// Remaining capacity, `0 <= seats_available <= max_attendees`.
    pub seats_available: u32,
}

impl Conference {
    /// Month number derived from a start date.
    #[must_use]
    pub fn month_of(start_date: Option<NaiveDate>) -> u32 {
        start_date.map_or(0, |d| d.month())
    }

    /// Number of seats taken.
    #[must_use]
    pub const fn registered(&self) -> u32 {
        self.max_attendees.saturating_sub(self.seats_available)
    }

    /// One-line summary, used in confirmation emails.
    #[must_use]
    pub fn summary(&self) -> String {
        let dates = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!(", {start} to {end}"),
            (Some(start), None) => format!(", from {start}"),
            _ => String::new(),
        };
        format!(
            "{} ({}{dates}), topics: {}, capacity: {}",
            self.name,
            self.city,
            self.topics.join(", "),
            self.max_attendees
        )
    }
}

impl Model for Conference {
    const KIND: Kind = Kind::Conference;
}

/// A session, child of its conference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Title.
    pub name: String,
    /// Short pitch.
    pub highlights: String,
    /// Speaker name.
    pub speaker: String,
    /// Length in minutes.
    pub duration: u32,
    /// Lower-cased session type (`talk`, `workshop`, ...).
    pub type_of_session: String,
    /// Day of the session.
    pub date: NaiveDate,
    /// Start time, serialized `HH:MM:SS`.
    pub start_time: NaiveTime,
}

impl Model for Session {
    const KIND: Kind = Kind::Session;
}

/// A session bookmarked by a user, child of the user's profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishListEntry {
    /// Owner.
    pub user_id: String,
    /// Bookmarked session.
    pub session_key: EntityKey,
    /// Parent conference of the session.
    pub conference_key: EntityKey,
    /// When the entry was added.
    pub added_at: DateTime<Utc>,
}

impl Model for WishListEntry {
    const KIND: Kind = Kind::WishListEntry;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use serde_json::json;

    #[test]
    fn tee_shirt_sizes_use_screaming_snake_case() {
        assert_eq!(serde_json::to_value(TeeShirtSize::XxxlW).unwrap(), json!("XXXL_W"));
        assert_eq!(
            serde_json::from_value::<TeeShirtSize>(json!("NOT_SPECIFIED")).unwrap(),
            TeeShirtSize::NotSpecified
        );
    }

    #[test]
    fn conference_properties_are_camel_case() {
        let conference = Conference {
            name: "RustConf".into(),
            description: None,
            organizer_user_id: "alice".into(),
            topics: vec!["Rust".into()],
            city: "Portland".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 9, 8),
            end_date: None,
            month: 9,
            max_attendees: 100,
            seats_available: 97,
        };
        let key = EntityKey::profile("alice").child(Kind::Conference, 1);

        let entity = Entity::from_model(key, &conference).unwrap();

        assert_eq!(entity.property("maxAttendees"), Some(&json!(100)));
        assert_eq!(entity.property("startDate"), Some(&json!("2026-09-08")));
        assert!(entity.property("endDate").is_none());
        assert_eq!(entity.to_model::<Conference>().unwrap(), conference);
        assert_eq!(conference.registered(), 3);
    }

    #[test]
    fn session_start_time_sorts_lexically() {
        let at = |h, m| serde_json::to_value(NaiveTime::from_hms_opt(h, m, 0).unwrap()).unwrap();
        assert_eq!(at(9, 30), json!("09:30:00"));
        assert!(at(9, 30).as_str() < at(19, 0).as_str());
    }

    #[test]
    fn model_kind_must_match_key() {
        let profile = Profile::new("alice", "Alice", "alice@example.com");
        let wrong = EntityKey::profile("alice").child(Kind::Conference, 1);
        assert!(Entity::from_model(wrong, &profile).is_err());
        assert!(Entity::from_model(profile.key(), &profile).is_ok());
    }

    #[test]
    fn month_is_zero_without_start_date() {
        assert_eq!(Conference::month_of(None), 0);
        assert_eq!(Conference::month_of(NaiveDate::from_ymd_opt(2026, 2, 1)), 2);
    }
}
