//! Application services.
//!
//! Each service owns the collaborators it needs and exposes the operations of one
//! resource. Handlers stay thin: they extract the caller and the body, call a service,
//! and render the result.
//!
//! ```text
//! Services
//! ├── ProfileService       get-or-create, partial update
//! ├── ConferenceService    create, update, queries, registration (RegistrationLedger)
//! ├── SessionService       create, session queries, featured-speaker trigger
//! ├── WishlistService      add, list, remove
//! └── AnnouncementService  advisory cache reads, announcement refresh
//! ```

pub mod announcements;
pub mod conferences;
pub mod profiles;
pub mod sessions;
pub mod wishlist;

pub use announcements::AnnouncementService;
pub use conferences::ConferenceService;
pub use profiles::ProfileService;
pub use sessions::SessionService;
pub use wishlist::WishlistService;

use chrono::NaiveDate;
use conference_core::environment::Clock;
use conference_core::{
    ANNOUNCEMENTS_KEY, Cache, ConferenceError, EntityKey, EntityStore, Kind, NotificationSink,
    Query,
};
use conference_runtime::retry::RetryPolicy;
use conference_runtime::{EmailSender, HealthCheck, RegistrationLedger, TaskWorker, TransactionRunner};
use std::sync::Arc;

/// Collaborators shared by every service.
#[derive(Clone)]
pub struct Dependencies {
    /// Entity store (source of truth)
    pub store: Arc<dyn EntityStore>,
    /// Advisory announcement cache
    pub cache: Arc<dyn Cache>,
    /// Sink for post-commit side effects
    pub notifications: Arc<dyn NotificationSink>,
    /// Email delivery, used when refreshing announcements in-line
    pub email: Arc<dyn EmailSender>,
    /// Time source for wishlist timestamps
    pub clock: Arc<dyn Clock>,
    /// Retry policy of transactional updates
    pub retry: RetryPolicy,
}

/// Every application service, built from one set of [`Dependencies`].
#[derive(Clone)]
pub struct Services {
    /// Profiles
    pub profiles: ProfileService,
    /// Conferences and registration
    pub conferences: ConferenceService,
    /// Sessions
    pub sessions: SessionService,
    /// Wishlists
    pub wishlist: WishlistService,
    /// Announcement and featured speaker
    pub announcements: AnnouncementService,
    store: Arc<dyn EntityStore>,
    cache: Arc<dyn Cache>,
}

impl Services {
    /// Wire every service.
    #[must_use]
    pub fn new(deps: Dependencies) -> Self {
        let runner = TransactionRunner::new(Arc::clone(&deps.store), deps.retry.clone());
        let ledger = RegistrationLedger::new(runner.clone());
        let profiles = ProfileService::new(Arc::clone(&deps.store), runner.clone());
        let worker = TaskWorker::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.cache),
            Arc::clone(&deps.email),
        );

        Self {
            conferences: ConferenceService::new(
                Arc::clone(&deps.store),
                runner.clone(),
                ledger,
                profiles.clone(),
                Arc::clone(&deps.notifications),
            ),
            sessions: SessionService::new(Arc::clone(&deps.store), Arc::clone(&deps.notifications)),
            wishlist: WishlistService::new(
                Arc::clone(&deps.store),
                runner,
                Arc::clone(&deps.clock),
            ),
            announcements: AnnouncementService::new(Arc::clone(&deps.cache), worker),
            profiles,
            store: deps.store,
            cache: deps.cache,
        }
    }

    /// Check the store and the cache.
    ///
    /// A failing store makes the service unhealthy; a failing cache only degrades it,
    /// since nothing reads the cache for correctness.
    pub async fn health_checks(&self) -> Vec<HealthCheck> {
        let store = match self.store.query(Query::new(Kind::Profile).limit(1)).await {
            Ok(_) => HealthCheck::healthy("store"),
            Err(err) => HealthCheck::unhealthy("store", err.to_string()),
        };
        let cache = match self.cache.get(ANNOUNCEMENTS_KEY).await {
            Ok(_) => HealthCheck::healthy("cache"),
            Err(err) => HealthCheck::degraded("cache", err.to_string()),
        };
        vec![store, cache]
    }
}

/// Decode a websafe key that must address an entity of `kind`.
pub(crate) fn parse_key(raw: &str, kind: Kind) -> Result<EntityKey, ConferenceError> {
    let key = EntityKey::from_urlsafe(raw)
        .map_err(|err| ConferenceError::malformed_key(kind.as_str(), raw, &err))?;
    if key.kind() != kind {
        return Err(ConferenceError::MalformedKey {
            kind: kind.as_str(),
            key: raw.to_string(),
            reason: format!("key addresses a {}", key.kind()),
        });
    }
    Ok(key)
}

/// Parse `YYYY-MM-DD` from the first 10 characters of `raw`.
pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ConferenceError> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map_err(|_| ConferenceError::InvalidDate(raw.to_string()))
}

/// A present, non-blank string.
pub(crate) fn provided(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dates_read_only_the_leading_day() {
        let expected = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        assert_eq!(parse_date("2026-05-04").unwrap(), expected);
        assert_eq!(parse_date("2026-05-04T09:30:00.000Z").unwrap(), expected);
        assert!(matches!(
            parse_date("04/05/2026"),
            Err(ConferenceError::InvalidDate(_))
        ));
        assert!(parse_date("").is_err());
    }

    #[test]
    fn keys_must_have_the_expected_kind() {
        let conference = EntityKey::profile("org").child(Kind::Conference, 7);

        assert_eq!(
            parse_key(&conference.to_urlsafe(), Kind::Conference).unwrap(),
            conference
        );

        let err = parse_key(&conference.to_urlsafe(), Kind::Session).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_KEY");

        let err = parse_key("%%%", Kind::Conference).unwrap_err();
        assert!(err.to_string().contains("Invalid Conference key"));
    }

    #[test]
    fn blank_strings_are_not_provided() {
        assert_eq!(provided(Some("  Berlin ")), Some("Berlin"));
        assert_eq!(provided(Some("   ")), None);
        assert_eq!(provided(None), None);
    }
}
