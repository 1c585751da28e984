//! Session wishlists.
//!
//! Entries live under the owner's profile, so listing is an ancestor query and needs
//! no index on the user.

use super::parse_key;
use crate::forms::WishlistView;
use conference_core::environment::Clock;
use conference_core::{
    Caller, ConferenceError, EntityKey, EntityStore, EntityStoreExt, FilterClause, Kind,
    Operator, Query, Record, SortKey, WishListEntry,
};
use conference_runtime::TransactionRunner;
use serde_json::Value;
use std::sync::Arc;

/// Per-user session wishlist.
#[derive(Clone)]
pub struct WishlistService {
    store: Arc<dyn EntityStore>,
    runner: TransactionRunner,
    clock: Arc<dyn Clock>,
}

impl WishlistService {
    /// Wire the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        runner: TransactionRunner,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            runner,
            clock,
        }
    }

    /// Add a session to the caller's wishlist.
    ///
    /// Adding the same session twice stores two entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::SessionNotFound`] for an unknown session.
    pub async fn add_to_wishlist(
        &self,
        caller: &Caller,
        session_key: &str,
    ) -> Result<WishlistView, ConferenceError> {
        let session_key = parse_key(session_key, Kind::Session)?;
        if self.store.get(session_key.clone()).await?.is_none() {
            return Err(ConferenceError::SessionNotFound(session_key));
        }
        let Some(conference_key) = session_key.parent() else {
            return Err(ConferenceError::SessionNotFound(session_key));
        };

        let entry = WishListEntry {
            user_id: caller.user_id.clone(),
            session_key,
            conference_key,
            added_at: self.clock.now(),
        };
        let key = self
            .store
            .allocate_id(Kind::WishListEntry, Some(caller.profile_key()))
            .await?;
        self.store.save(&key, &entry).await?;

        tracing::debug!(user_id = %caller.user_id, session_key = %entry.session_key, "Wishlist entry added");
        Ok(WishlistView::from(Record::new(key, entry)))
    }

    /// The caller's wishlist, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn wishlist(&self, caller: &Caller) -> Result<Vec<WishlistView>, ConferenceError> {
        let query = Query::new(Kind::WishListEntry)
            .with_ancestor(caller.profile_key())
            .order_by(SortKey::ascending("addedAt"));
        Ok(self
            .store
            .query_models::<WishListEntry>(query)
            .await?
            .into_iter()
            .map(WishlistView::from)
            .collect())
    }

    /// Remove every entry of the caller for a session.
    ///
    /// All matching entries are deleted in one transaction on the caller's profile group,
    /// so either every duplicate goes or none does. Returns `true` even if the session was
    /// not on the wishlist.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::MalformedKey`] for a key that is not a session key.
    pub async fn remove_from_wishlist(
        &self,
        caller: &Caller,
        session_key: &str,
    ) -> Result<bool, ConferenceError> {
        let session_key = parse_key(session_key, Kind::Session)?;
        let query = Query::new(Kind::WishListEntry)
            .with_ancestor(caller.profile_key())
            .filter(FilterClause::new(
                "sessionKey",
                Operator::Eq,
                Value::String(session_key.to_urlsafe()),
            ));

        let keys: Vec<EntityKey> = self
            .store
            .query(query)
            .await?
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        let removed = keys.len();
        if removed > 0 {
            self.runner
                .run(vec![caller.profile_key().group()], move |txn| {
                    let keys = keys.clone();
                    Box::pin(async move {
                        for key in keys {
                            txn.delete(key)?;
                        }
                        Ok(())
                    })
                })
                .await?;
        }

        tracing::debug!(user_id = %caller.user_id, removed, "Wishlist entries removed");
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conference_runtime::retry::RetryPolicy;
    use conference_testing::{InMemoryEntityStore, fixtures, test_clock};
    use std::time::Duration;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build()
    }

    fn service_with(store: &Arc<InMemoryEntityStore>, policy: RetryPolicy) -> WishlistService {
        let runner = TransactionRunner::new(store.clone(), policy);
        WishlistService::new(store.clone(), runner, Arc::new(test_clock()))
    }

    fn service(store: &Arc<InMemoryEntityStore>) -> WishlistService {
        service_with(store, policy(3))
    }

    async fn seeded_session(store: &InMemoryEntityStore) -> EntityKey {
        let conference_key =
            fixtures::seed_conference(store, &fixtures::conference("org", "RustConf", 10))
                .await
                .unwrap();
        fixtures::seed_session(
            store,
            &conference_key,
            &fixtures::session("Borrowing", "Ferris", "talk", 10, 30),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn duplicates_are_kept_and_removed_together() {
        let store = Arc::new(InMemoryEntityStore::new());
        let conference_key =
            fixtures::seed_conference(&*store, &fixtures::conference("org", "RustConf", 10))
                .await
                .unwrap();
        let session_key = fixtures::seed_session(
            &*store,
            &conference_key,
            &fixtures::session("Borrowing", "Ferris", "talk", 10, 30),
        )
        .await
        .unwrap();
        let wishlist = service(&store);
        let caller = fixtures::caller("alice");
        let raw = session_key.to_urlsafe();

        let first = wishlist.add_to_wishlist(&caller, &raw).await.unwrap();
        wishlist.add_to_wishlist(&caller, &raw).await.unwrap();

        assert_eq!(first.entry.conference_key, conference_key);
        assert_eq!(first.entry.added_at, test_clock().now());
        assert_eq!(wishlist.wishlist(&caller).await.unwrap().len(), 2);
        assert!(
            wishlist
                .wishlist(&fixtures::caller("bob"))
                .await
                .unwrap()
                .is_empty()
        );

        assert!(wishlist.remove_from_wishlist(&caller, &raw).await.unwrap());
        assert!(wishlist.wishlist(&caller).await.unwrap().is_empty());
        assert_eq!(store.count(Kind::WishListEntry), 0);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = Arc::new(InMemoryEntityStore::new());
        let wishlist = service(&store);
        let missing = conference_core::EntityKey::profile("org")
            .child(Kind::Conference, 1)
            .child(Kind::Session, 2);

        let err = wishlist
            .add_to_wishlist(&fixtures::caller("alice"), &missing.to_urlsafe())
            .await
            .unwrap_err();

        assert!(matches!(err, ConferenceError::SessionNotFound(key) if key == missing));
    }

    #[tokio::test]
    async fn removal_deletes_duplicates_atomically() {
        let store = Arc::new(InMemoryEntityStore::new());
        let raw = seeded_session(&store).await.to_urlsafe();
        let caller = fixtures::caller("alice");

        let strict = service_with(&store, policy(0));
        strict.add_to_wishlist(&caller, &raw).await.unwrap();
        strict.add_to_wishlist(&caller, &raw).await.unwrap();

        store.inject_conflicts(1);
        let err = strict.remove_from_wishlist(&caller, &raw).await.unwrap_err();
        assert!(matches!(err, ConferenceError::TransientConflict { .. }));
        assert_eq!(store.count(Kind::WishListEntry), 2);

        store.inject_conflicts(1);
        assert!(service(&store).remove_from_wishlist(&caller, &raw).await.unwrap());
        assert_eq!(store.count(Kind::WishListEntry), 0);
    }

    #[tokio::test]
    async fn removing_an_absent_session_succeeds() {
        let store = Arc::new(InMemoryEntityStore::new());
        let raw = seeded_session(&store).await.to_urlsafe();

        assert!(
            service(&store)
                .remove_from_wishlist(&fixtures::caller("alice"), &raw)
                .await
                .unwrap()
        );
    }
}
