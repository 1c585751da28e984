//! Background tasks: confirmation emails, the featured speaker and the announcement.
//!
//! [`TaskQueue`] is the [`NotificationSink`] handed to the services. It feeds a bounded
//! channel drained by a single [`TaskWorker`]. Tasks are best effort: a failed task is
//! logged and counted, and never reaches the request that triggered it.

use crate::metrics::TaskMetrics;
use conference_core::filter::{FilterCompiler, FilterSpec};
use conference_core::{
    ANNOUNCEMENTS_KEY, BoxFuture, Cache, CacheError, Conference, EntityKey, EntityStore,
    EntityStoreExt, FEATURED_SPEAKER_KEY, FilterClause, FilterError, Kind, NotificationSink,
    Operator, Query, Session, SortKey, StoreError, Task,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

/// Conferences with at most this many seats left are announced as nearly sold out.
pub const NEARLY_SOLD_OUT_SEATS: u32 = 5;

/// Subject of the conference creation email.
pub const CONFIRMATION_SUBJECT: &str = "You created a new Conference!";

/// Subject of the featured speaker email.
pub const FEATURED_SPEAKER_SUBJECT: &str = "New featured speaker!";

/// An outgoing email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    /// Recipient.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Email delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Email delivery to {to} failed: {reason}")]
pub struct EmailError {
    /// Recipient.
    pub to: String,
    /// Provider message.
    pub reason: String,
}

/// Email delivery.
pub trait EmailSender: Send + Sync {
    /// Deliver one email.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] if the provider rejects the message.
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), EmailError>>;
}

/// Email sender that logs instead of delivering.
#[derive(Clone, Debug)]
pub struct ConsoleEmailSender {
    from: String,
}

impl ConsoleEmailSender {
    /// Sender logging mail "from" `from`.
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl EmailSender for ConsoleEmailSender {
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), EmailError>> {
        Box::pin(async move {
            tracing::info!(
                from = %self.from,
                to = %email.to,
                subject = %email.subject,
                body = %email.body,
                "Email (console delivery)"
            );
            Ok(())
        })
    }
}

/// Errors of a single task.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Store query failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Cache write failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Email delivery failed.
    #[error(transparent)]
    Email(#[from] EmailError),
    /// The task payload did not form a valid query.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Sending half of the task channel.
#[derive(Clone, Debug)]
pub struct TaskQueue {
    sender: Sender<Task>,
}

impl TaskQueue {
    /// Queue holding at most `capacity` pending tasks, and the receiver for the worker.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<Task>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl NotificationSink for TaskQueue {
    fn enqueue(&self, task: Task) {
        let kind = task.name();
        match self.sender.try_send(task) {
            Ok(()) => tracing::debug!(task = kind, "Task enqueued"),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(task = kind, "Task queue full, dropping task");
                TaskMetrics::record(kind, "dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(task = kind, "Task queue closed, dropping task");
                TaskMetrics::record(kind, "dropped");
            }
        }
    }
}

/// Executes queued tasks.
#[derive(Clone)]
pub struct TaskWorker {
    store: Arc<dyn EntityStore>,
    cache: Arc<dyn Cache>,
    email: Arc<dyn EmailSender>,
}

impl TaskWorker {
    /// Worker reading from `store`, writing to `cache` and mailing through `email`.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, cache: Arc<dyn Cache>, email: Arc<dyn EmailSender>) -> Self {
        Self { store, cache, email }
    }

    /// Drain `receiver` until every [`TaskQueue`] handle is dropped.
    pub async fn run(self, mut receiver: Receiver<Task>) {
        tracing::info!("Task worker started");
        while let Some(task) = receiver.recv().await {
            self.process(task).await;
        }
        tracing::info!("Task queue closed, worker stopping");
    }

    /// Execute one task, logging and counting the outcome.
    pub async fn process(&self, task: Task) {
        let kind = task.name();
        match self.execute(task).await {
            Ok(()) => TaskMetrics::record(kind, "ok"),
            Err(err) => {
                tracing::error!(task = kind, error = %err, "Task failed");
                TaskMetrics::record(kind, "failed");
            }
        }
    }

    /// Execute one task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] if the store, cache or email provider fails.
    pub async fn execute(&self, task: Task) -> Result<(), TaskError> {
        match task {
            Task::SendConfirmationEmail {
                email,
                conference_info,
            } => {
                self.email
                    .send(Email {
                        to: email,
                        subject: CONFIRMATION_SUBJECT.to_string(),
                        body: format!(
                            "Hi, you have created the following conference:\r\n\r\n{conference_info}"
                        ),
                    })
                    .await?;
            }
            Task::SetFeaturedSpeaker {
                email,
                speaker,
                conference_key,
            } => self.feature_speaker(email, &speaker, conference_key).await?,
        }
        Ok(())
    }

    async fn feature_speaker(
        &self,
        email: String,
        speaker: &str,
        conference_key: EntityKey,
    ) -> Result<(), TaskError> {
        let query = FilterCompiler::sessions()
            .compile(&[FilterSpec::new("SPEAKER", "EQ", speaker)])?
            .into_ancestor_query(Kind::Session, conference_key);
        let sessions = self.store.query_models::<Session>(query).await?;

        if sessions.len() < 2 {
            tracing::debug!(speaker, sessions = sessions.len(), "Speaker not featured");
            return Ok(());
        }

        let names: Vec<&str> = sessions.iter().map(|s| s.model.name.as_str()).collect();
        let message = featured_speaker_message(speaker, &names);
        self.cache.set(FEATURED_SPEAKER_KEY, message.clone()).await?;
        tracing::info!(speaker, "Featured speaker updated");

        self.email
            .send(Email {
                to: email,
                subject: FEATURED_SPEAKER_SUBJECT.to_string(),
                body: format!("Additional Info:\r\n\r\n{message}"),
            })
            .await?;
        Ok(())
    }

    /// Recompute the nearly-sold-out announcement.
    ///
    /// Caches and returns the message when some conference has between 1 and
    /// [`NEARLY_SOLD_OUT_SEATS`] seats left, and clears the cache entry otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] if the store query or the cache write fails.
    pub async fn refresh_announcement(&self) -> Result<Option<String>, TaskError> {
        let query = Query::new(Kind::Conference)
            .filter(FilterClause::new(
                "seatsAvailable",
                Operator::LtEq,
                json!(NEARLY_SOLD_OUT_SEATS),
            ))
            .filter(FilterClause::new("seatsAvailable", Operator::Gt, json!(0)))
            .order_by(SortKey::ascending("seatsAvailable"))
            .order_by(SortKey::ascending("name"));
        let conferences = self.store.query_models::<Conference>(query).await?;

        if conferences.is_empty() {
            self.cache.delete(ANNOUNCEMENTS_KEY).await?;
            return Ok(None);
        }

        let names: Vec<&str> = conferences.iter().map(|c| c.model.name.as_str()).collect();
        let announcement = format!(
            "Last chance to attend! The following conferences are nearly sold out: {}",
            names.join(", ")
        );
        self.cache.set(ANNOUNCEMENTS_KEY, announcement.clone()).await?;
        tracing::debug!(conferences = names.len(), "Announcement refreshed");
        Ok(Some(announcement))
    }
}

/// Cache message featuring `speaker`.
#[must_use]
pub fn featured_speaker_message(speaker: &str, session_names: &[&str]) -> String {
    format!(
        "Featured Speaker {speaker} has more than one session. Please check out sessions: {}",
        session_names.join(", ")
    )
}
