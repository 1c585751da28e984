//! Registration ledger behaviour against the in-memory store.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)]

use conference_core::{
    Conference, ConferenceError, EntityKey, EntityStore, EntityStoreExt, Kind, Profile,
};
use conference_runtime::retry::RetryPolicy;
use conference_runtime::{RegistrationLedger, TransactionRunner};
use conference_testing::{InMemoryEntityStore, fixtures};
use std::sync::Arc;
use std::time::Duration;

fn fast_policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(3)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .build()
}

async fn setup(max_attendees: u32) -> (Arc<InMemoryEntityStore>, RegistrationLedger, EntityKey) {
    let store = Arc::new(InMemoryEntityStore::new());
    let key = fixtures::seed_conference(&*store, &fixtures::conference("org", "C1", max_attendees))
        .await
        .unwrap();
    let ledger = RegistrationLedger::new(TransactionRunner::new(store.clone(), fast_policy()));
    (store, ledger, key)
}

async fn seats(store: &InMemoryEntityStore, key: &EntityKey) -> u32 {
    store
        .load::<Conference>(key)
        .await
        .unwrap()
        .unwrap()
        .seats_available
}

async fn attending(store: &InMemoryEntityStore, user: &str) -> Vec<EntityKey> {
    store
        .load::<Profile>(&EntityKey::profile(user))
        .await
        .unwrap()
        .map(|p| p.conference_keys_to_attend)
        .unwrap_or_default()
}

#[tokio::test]
async fn register_twice_then_unregister_twice() {
    let (store, ledger, key) = setup(10).await;
    let u1 = fixtures::caller("u1");

    assert!(ledger.register(&u1, &key).await.unwrap());
    assert_eq!(seats(&store, &key).await, 9);

    let again = ledger.register(&u1, &key).await.unwrap_err();
    assert!(matches!(again, ConferenceError::AlreadyRegistered));
    assert_eq!(seats(&store, &key).await, 9);

    assert!(ledger.unregister(&u1, &key).await.unwrap());
    assert_eq!(seats(&store, &key).await, 10);
    assert!(attending(&store, "u1").await.is_empty());

    assert!(!ledger.unregister(&u1, &key).await.unwrap());
    assert_eq!(seats(&store, &key).await, 10);
}

#[tokio::test]
async fn first_registration_creates_profile() {
    let (store, ledger, key) = setup(3).await;
    let mut caller = fixtures::caller("new-user");
    caller.display_name = Some("New User".into());

    ledger.register(&caller, &key).await.unwrap();

    let profile = store
        .load::<Profile>(&EntityKey::profile("new-user"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.display_name, "New User");
    assert_eq!(profile.main_email, "new-user@example.com");
    assert_eq!(profile.conference_keys_to_attend, vec![key]);
}

#[tokio::test]
async fn sold_out_conference_rejects_without_changes() {
    let (store, ledger, key) = setup(1).await;

    ledger.register(&fixtures::caller("a"), &key).await.unwrap();
    let err = ledger.register(&fixtures::caller("b"), &key).await.unwrap_err();

    assert!(matches!(err, ConferenceError::NoSeatsAvailable));
    assert_eq!(seats(&store, &key).await, 0);
    assert!(attending(&store, "b").await.is_empty());
}

#[tokio::test]
async fn zero_capacity_means_no_seats() {
    let (_store, ledger, key) = setup(0).await;
    let err = ledger.register(&fixtures::caller("a"), &key).await.unwrap_err();
    assert!(matches!(err, ConferenceError::NoSeatsAvailable));
}

#[tokio::test]
async fn missing_conference_is_not_found() {
    let (_store, ledger, _key) = setup(5).await;
    let missing = EntityKey::profile("org").child(Kind::Conference, 999);

    for result in [
        ledger.register(&fixtures::caller("a"), &missing).await,
        ledger.unregister(&fixtures::caller("a"), &missing).await,
    ] {
        assert!(matches!(result, Err(ConferenceError::ConferenceNotFound(_))));
    }
}

#[tokio::test]
async fn non_conference_key_is_not_found() {
    let (_store, ledger, _key) = setup(5).await;
    let profile_key = EntityKey::profile("org");

    let err = ledger
        .register(&fixtures::caller("a"), &profile_key)
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::ConferenceNotFound(_)));
}

#[tokio::test]
async fn organizer_can_register_for_own_conference() {
    let (store, ledger, key) = setup(2).await;

    assert!(ledger.register(&fixtures::caller("org"), &key).await.unwrap());
    assert_eq!(seats(&store, &key).await, 1);
}

#[tokio::test]
async fn conflicts_are_retried() {
    let (store, ledger, key) = setup(5).await;
    store.inject_conflicts(2);

    assert!(ledger.register(&fixtures::caller("a"), &key).await.unwrap());
    assert_eq!(seats(&store, &key).await, 4);
}

#[tokio::test]
async fn exhausted_retries_surface_transient_conflict() {
    let (store, ledger, key) = setup(5).await;
    store.inject_conflicts(10);

    let err = ledger.register(&fixtures::caller("a"), &key).await.unwrap_err();

    assert!(matches!(err, ConferenceError::TransientConflict { attempts: 4 }));
    store.inject_conflicts(0);
    assert_eq!(seats(&store, &key).await, 5);
    assert!(attending(&store, "a").await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_for_last_seat() {
    let store = Arc::new(InMemoryEntityStore::new());
    let key = fixtures::seed_conference(&*store, &fixtures::conference("org", "C1", 1))
        .await
        .unwrap();
    let policy = RetryPolicy::builder()
        .max_retries(20)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(10))
        .build();
    let ledger = RegistrationLedger::new(TransactionRunner::new(store.clone(), policy));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = ledger.clone();
            let key = key.clone();
            tokio::spawn(async move {
                ledger
                    .register(&fixtures::caller(&format!("user-{i}")), &key)
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(true) => successes += 1,
            Ok(false) => panic!("register never returns false"),
            Err(ConferenceError::NoSeatsAvailable | ConferenceError::TransientConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(seats(&store, &key).await, 0);
    let registered = store.query(conference_core::Query::new(Kind::Profile)).await.unwrap();
    let holders = registered
        .iter()
        .filter(|p| p.to_model::<Profile>().unwrap().is_attending(&key))
        .count();
    assert_eq!(holders, 1);
}
