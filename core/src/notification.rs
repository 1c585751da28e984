//! Fire-and-forget side effects dispatched after a mutation commits.

use crate::key::EntityKey;
use serde::{Deserialize, Serialize};

/// A background task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    /// Tell an organizer their conference was created.
    SendConfirmationEmail {
        /// Recipient.
        email: String,
        /// Human-readable conference summary.
        conference_info: String,
    },
    /// Feature a speaker with several sessions in one conference.
    SetFeaturedSpeaker {
        /// Organizer to notify.
        email: String,
        /// Speaker name.
        speaker: String,
        /// Conference the sessions belong to.
        conference_key: EntityKey,
    },
}

impl Task {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SendConfirmationEmail { .. } => "send_confirmation_email",
            Self::SetFeaturedSpeaker { .. } => "set_featured_speaker",
        }
    }
}

/// Asynchronous task dispatch.
///
/// Delivery is at-least-once and unordered; callers never wait for completion and
/// enqueueing never fails from their point of view.
pub trait NotificationSink: Send + Sync {
    /// Queue a task.
    fn enqueue(&self, task: Task);
}
