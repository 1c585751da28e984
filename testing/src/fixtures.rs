//! Builders for common test data.

use chrono::{NaiveDate, NaiveTime};
use conference_core::types::{DEFAULT_CITY, DEFAULT_HIGHLIGHTS};
use conference_core::{
    Caller, Conference, EntityKey, EntityStore, EntityStoreExt, Kind, Session, StoreError,
};

/// Caller `user_id` with address `<user_id>@example.com`.
#[must_use]
pub fn caller(user_id: &str) -> Caller {
    Caller::new(user_id, format!("{user_id}@example.com"))
}

/// Conference organised by `organizer` with every seat free.
#[must_use]
pub fn conference(organizer: &str, name: &str, max_attendees: u32) -> Conference {
    Conference {
        name: name.to_string(),
        description: None,
        organizer_user_id: organizer.to_string(),
        topics: vec!["Rust".to_string()],
        city: DEFAULT_CITY.to_string(),
        start_date: None,
        end_date: None,
        month: 0,
        max_attendees,
        seats_available: max_attendees,
    }
}

/// Store `conference` under its organizer's profile and return its key.
///
/// # Errors
///
/// Propagates store failures.
pub async fn seed_conference<S: EntityStore + ?Sized>(
    store: &S,
    conference: &Conference,
) -> Result<EntityKey, StoreError> {
    let parent = EntityKey::profile(&conference.organizer_user_id);
    let key = store.allocate_id(Kind::Conference, Some(parent)).await?;
    store.save(&key, conference).await?;
    Ok(key)
}

/// Session starting at `hour:00` on 2026-06-01.
#[must_use]
pub fn session(name: &str, speaker: &str, type_of_session: &str, hour: u32, duration: u32) -> Session {
    Session {
        name: name.to_string(),
        highlights: DEFAULT_HIGHLIGHTS.to_string(),
        speaker: speaker.to_string(),
        duration,
        type_of_session: type_of_session.to_lowercase(),
        date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap_or_default(),
        start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default(),
    }
}

/// Store `session` under `conference_key` and return its key.
///
/// # Errors
///
/// Propagates store failures.
pub async fn seed_session<S: EntityStore + ?Sized>(
    store: &S,
    conference_key: &EntityKey,
    session: &Session,
) -> Result<EntityKey, StoreError> {
    let key = store
        .allocate_id(Kind::Session, Some(conference_key.clone()))
        .await?;
    store.save(&key, session).await?;
    Ok(key)
}

/// Install a test tracing subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
