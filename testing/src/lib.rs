//! # Conference Testing
//!
//! In-memory collaborators and fixtures for the conference backend.
//!
//! This crate provides:
//! - [`InMemoryEntityStore`]: optimistic transactions, conflict injection
//! - Mock implementations of the cache, notification and email traits
//! - Fixtures for callers, conferences and sessions
//!
//! `InMemoryEntityStore` and `InMemoryCache` double as the `memory` backends of the
//! server, so they never panic on a poisoned lock.
//!
//! ## Example
//!
//! ```ignore
//! use conference_testing::{InMemoryEntityStore, fixtures};
//! use conference_runtime::{RegistrationLedger, TransactionRunner, retry::RetryPolicy};
//!
//! #[tokio::test]
//! async fn registers() {
//!     let store = Arc::new(InMemoryEntityStore::new());
//!     let key = fixtures::seed_conference(&*store, &fixtures::conference("org", "RustConf", 10))
//!         .await
//!         .unwrap();
//!     let ledger = RegistrationLedger::new(TransactionRunner::new(store, RetryPolicy::default()));
//!
//!     assert!(ledger.register(&fixtures::caller("alice"), &key).await.unwrap());
//! }
//! ```

pub mod fixtures;
pub mod mocks;
pub mod store;

// Re-export commonly used items
pub use mocks::{
    FixedClock, InMemoryCache, RecordingEmailSender, RecordingNotificationSink, test_clock,
};
pub use store::InMemoryEntityStore;

#[cfg(test)]
mod tests {
    use super::*;
    use conference_core::environment::Clock;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
