//! Optimistic transactions with bounded retry.
//!
//! [`TransactionRunner::run`] opens a transaction over the given entity groups, runs the
//! body against it and commits. A [`StoreError::Conflict`] from the body or the commit
//! restarts the whole attempt after a backoff; when the policy is exhausted the caller
//! gets [`ConferenceError::TransientConflict`].
//!
//! The body may run several times, so it must only touch the store through the
//! transaction it is given.

use crate::metrics::TransactionMetrics;
use crate::retry::{RetryError, RetryPolicy, retry_with_predicate};
use conference_core::{BoxFuture, ConferenceError, EntityGroup, EntityStore, StoreError, Transaction};
use std::sync::Arc;
use std::time::Instant;

/// Runs transaction bodies against a store, retrying on conflict.
#[derive(Clone)]
pub struct TransactionRunner {
    store: Arc<dyn EntityStore>,
    policy: RetryPolicy,
}

impl TransactionRunner {
    /// Runner over `store` with `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// The retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `body` in a transaction spanning `groups` and commit it.
    ///
    /// Duplicate groups are collapsed.
    ///
    /// # Errors
    ///
    /// - whatever non-conflict error `body` returns, with nothing committed
    /// - [`ConferenceError::TransientConflict`]: every attempt conflicted
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn run<T, F>(&self, mut groups: Vec<EntityGroup>, body: F) -> Result<T, ConferenceError>
    where
        T: Send,
        F: for<'t> Fn(&'t mut dyn Transaction) -> BoxFuture<'t, Result<T, ConferenceError>>
            + Send
            + Sync,
    {
        groups.sort();
        groups.dedup();

        let started = Instant::now();
        let store = &self.store;
        let groups = &groups;
        let body = &body;

        let outcome = retry_with_predicate(
            &self.policy,
            move || async move {
                let mut txn = store.begin_transaction(groups.clone()).await?;
                let value = body(&mut *txn).await?;
                txn.commit().await?;
                Ok(value)
            },
            |err: &ConferenceError| {
                let conflict = is_conflict(err);
                if conflict {
                    TransactionMetrics::record_conflict();
                }
                conflict
            },
        )
        .await;
        TransactionMetrics::record_duration(started.elapsed());

        outcome.map_err(|err| match err {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, last } => {
                tracing::error!(attempts, error = %last, "Transaction abandoned after repeated conflicts");
                ConferenceError::TransientConflict { attempts }
            }
        })
    }
}

/// Whether an error is a store-level conflict.
#[must_use]
pub const fn is_conflict(err: &ConferenceError) -> bool {
    matches!(err, ConferenceError::Store(StoreError::Conflict(_)))
}
