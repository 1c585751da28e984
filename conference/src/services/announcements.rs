//! Announcement and featured speaker.
//!
//! Both are advisory cache entries: a miss or a cache failure reads as an empty string.

use conference_core::{ANNOUNCEMENTS_KEY, Cache, FEATURED_SPEAKER_KEY};
use conference_runtime::{TaskError, TaskWorker};
use std::sync::Arc;

/// Reads of the advisory cache.
#[derive(Clone)]
pub struct AnnouncementService {
    cache: Arc<dyn Cache>,
    worker: TaskWorker,
}

impl AnnouncementService {
    /// Service reading `cache` and refreshing through `worker`.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>, worker: TaskWorker) -> Self {
        Self { cache, worker }
    }

    /// The nearly-sold-out announcement.
    pub async fn announcement(&self) -> String {
        self.cached(ANNOUNCEMENTS_KEY).await
    }

    /// The featured speaker message.
    pub async fn featured_speaker(&self) -> String {
        self.cached(FEATURED_SPEAKER_KEY).await
    }

    /// Recompute the announcement now.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] if the store query or the cache write fails.
    pub async fn refresh(&self) -> Result<Option<String>, TaskError> {
        self.worker.refresh_announcement().await
    }

    async fn cached(&self, key: &str) -> String {
        match self.cache.get(key).await {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(key, error = %err, "Cache read failed, serving empty value");
                String::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conference_core::{BoxFuture, CacheError};
    use conference_testing::{InMemoryCache, InMemoryEntityStore, RecordingEmailSender, fixtures};

    struct BrokenCache;

    impl Cache for BrokenCache {
        fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>, CacheError>> {
            Box::pin(std::future::ready(Err(CacheError("connection refused".into()))))
        }

        fn set<'a>(&'a self, _key: &'a str, _value: String) -> BoxFuture<'a, Result<(), CacheError>> {
            Box::pin(std::future::ready(Err(CacheError("connection refused".into()))))
        }

        fn delete<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
            Box::pin(std::future::ready(Err(CacheError("connection refused".into()))))
        }
    }

    fn service(store: Arc<InMemoryEntityStore>, cache: Arc<dyn Cache>) -> AnnouncementService {
        let worker = TaskWorker::new(store, cache.clone(), Arc::new(RecordingEmailSender::new()));
        AnnouncementService::new(cache, worker)
    }

    #[tokio::test]
    async fn refresh_then_read() {
        let store = Arc::new(InMemoryEntityStore::new());
        let mut nearly_full = fixtures::conference("org", "Almost", 100);
        nearly_full.seats_available = 2;
        fixtures::seed_conference(&*store, &nearly_full).await.unwrap();
        fixtures::seed_conference(&*store, &fixtures::conference("org", "Roomy", 100))
            .await
            .unwrap();

        let announcements = service(store, Arc::new(InMemoryCache::new()));
        assert_eq!(announcements.announcement().await, "");

        let refreshed = announcements.refresh().await.unwrap();

        assert_eq!(
            refreshed.as_deref(),
            Some("Last chance to attend! The following conferences are nearly sold out: Almost")
        );
        assert_eq!(Some(announcements.announcement().await), refreshed);
        assert_eq!(announcements.featured_speaker().await, "");
    }

    #[tokio::test]
    async fn cache_failure_reads_as_empty() {
        let announcements = service(Arc::new(InMemoryEntityStore::new()), Arc::new(BrokenCache));

        assert_eq!(announcements.announcement().await, "");
        assert!(announcements.refresh().await.is_err());
    }
}
