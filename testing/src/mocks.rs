//! Mock implementations of the collaborator traits.

use chrono::{DateTime, Utc};
use conference_core::environment::Clock;
use conference_core::{BoxFuture, Cache, CacheError, NotificationSink, Task};
use conference_runtime::{Email, EmailError, EmailSender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use conference_testing::mocks::FixedClock;
/// use conference_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
}

/// In-memory [`Cache`].
///
/// Also the `memory` cache backend of the server.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCache {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryCache {
    /// Create a new empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, read synchronously.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.data.read().ok().and_then(|data| data.get(key).cloned())
    }

    fn poisoned() -> CacheError {
        CacheError("in-memory cache lock poisoned".to_string())
    }
}

impl Cache for InMemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CacheError>> {
        let result = self
            .data
            .read()
            .map(|data| data.get(key).cloned())
            .map_err(|_| Self::poisoned());
        Box::pin(std::future::ready(result))
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), CacheError>> {
        let result = self
            .data
            .write()
            .map(|mut data| {
                data.insert(key.to_string(), value);
            })
            .map_err(|_| Self::poisoned());
        Box::pin(std::future::ready(result))
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
        let result = self
            .data
            .write()
            .map(|mut data| {
                data.remove(key);
            })
            .map_err(|_| Self::poisoned());
        Box::pin(std::future::ready(result))
    }
}

/// [`NotificationSink`] that records every task.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotificationSink {
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl RecordingNotificationSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks enqueued so far, in order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Remove and return the recorded tasks.
    #[must_use]
    pub fn take(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .map(|mut t| std::mem::take(&mut *t))
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn enqueue(&self, task: Task) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
    }
}

/// [`EmailSender`] that records every email and can be told to fail.
#[derive(Clone, Debug, Default)]
pub struct RecordingEmailSender {
    sent: Arc<Mutex<Vec<Email>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingEmailSender {
    /// Create a sender that succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Emails delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl EmailSender for RecordingEmailSender {
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), EmailError>> {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(EmailError {
                to: email.to,
                reason: "simulated provider failure".to_string(),
            })
        } else {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email);
            }
            Ok(())
        };
        Box::pin(std::future::ready(result))
    }
}
