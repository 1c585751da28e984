//! Top-level error taxonomy of the conference backend.

use crate::filter::FilterError;
use crate::key::{EntityKey, KeyError};
use crate::store::StoreError;
use thiserror::Error;

/// Broad class of a [`ConferenceError`], used to pick a transport status and retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input. Never retry.
    Validation,
    /// Caller is not authenticated.
    Unauthenticated,
    /// Caller is not allowed to touch the resource.
    Forbidden,
    /// Referenced entity does not exist.
    NotFound,
    /// Business rule conflict (already registered, sold out).
    Conflict,
    /// Contention exhausted retries; the caller may resubmit.
    Transient,
    /// Store or serialization fault.
    Internal,
}

/// Errors returned by application operations.
#[derive(Error, Debug)]
pub enum ConferenceError {
    /// A required field is missing or empty.
    #[error("'{0}' field required")]
    MissingField(&'static str),

    /// A websafe key could not be decoded, or decodes to the wrong kind.
    #[error("Invalid {kind} key {key:?}: {reason}")]
    MalformedKey {
        /// Expected kind.
        kind: &'static str,
        /// Rejected value.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Filter compilation failed.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A date did not parse as `YYYY-MM-DD`.
    #[error("Invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// A time did not parse as `HH:MM`.
    #[error("Invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),

    /// New capacity is below the number of registered attendees.
    #[error("Cannot set maxAttendees to {requested}: {registered} attendees already registered")]
    InvalidCapacity {
        /// Requested capacity.
        requested: u32,
        /// Seats already taken.
        registered: u32,
    },

    /// No caller identity on an authenticated operation.
    #[error("Authorization required")]
    Unauthenticated,

    /// Caller does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    /// No conference with that key.
    #[error("No conference found with key: {0}")]
    ConferenceNotFound(EntityKey),

    /// No session with that key.
    #[error("No session found with key: {0}")]
    SessionNotFound(EntityKey),

    /// The user is already registered for the conference.
    #[error("You have already registered for this conference")]
    AlreadyRegistered,

    /// The conference is sold out.
    #[error("There are no seats available.")]
    NoSeatsAvailable,

    /// Transaction contention persisted through every retry.
    #[error("Transaction still conflicting after {attempts} attempts, please retry")]
    TransientConflict {
        /// Attempts made.
        attempts: u32,
    },

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConferenceError {
    /// Category of the error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingField(_)
            | Self::MalformedKey { .. }
            | Self::Filter(_)
            | Self::InvalidDate(_)
            | Self::InvalidTime(_)
            | Self::InvalidCapacity { .. } => ErrorCategory::Validation,
            Self::Unauthenticated => ErrorCategory::Unauthenticated,
            Self::Forbidden(_) => ErrorCategory::Forbidden,
            Self::ConferenceNotFound(_) | Self::SessionNotFound(_) => ErrorCategory::NotFound,
            Self::AlreadyRegistered | Self::NoSeatsAvailable => ErrorCategory::Conflict,
            Self::TransientConflict { .. } => ErrorCategory::Transient,
            Self::Store(_) => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::MalformedKey { .. } => "MALFORMED_KEY",
            Self::Filter(FilterError::InvalidFilterField(_)) => "INVALID_FILTER_FIELD",
            Self::Filter(FilterError::InvalidFilterOperator(_)) => "INVALID_FILTER_OPERATOR",
            Self::Filter(FilterError::InvalidFilterValue { .. }) => "INVALID_FILTER_VALUE",
            Self::Filter(FilterError::MultipleInequalityFields { .. }) => {
                "MULTIPLE_INEQUALITY_FIELDS"
            }
            Self::InvalidDate(_) => "INVALID_DATE",
            Self::InvalidTime(_) => "INVALID_TIME",
            Self::InvalidCapacity { .. } => "INVALID_CAPACITY",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::ConferenceNotFound(_) => "CONFERENCE_NOT_FOUND",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::AlreadyRegistered => "ALREADY_REGISTERED",
            Self::NoSeatsAvailable => "NO_SEATS_AVAILABLE",
            Self::TransientConflict { .. } => "TRANSIENT_CONFLICT",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Malformed-key error for `kind`.
    #[must_use]
    pub fn malformed_key(kind: &'static str, key: impl Into<String>, error: &KeyError) -> Self {
        Self::MalformedKey {
            kind,
            key: key.into(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Kind;

    #[test]
    fn categories_follow_taxonomy() {
        let key = EntityKey::profile("a").child(Kind::Conference, 1);

        assert_eq!(
            ConferenceError::MissingField("name").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            ConferenceError::Filter(FilterError::InvalidFilterField("X".into())).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            ConferenceError::ConferenceNotFound(key).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            ConferenceError::NoSeatsAvailable.category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            ConferenceError::TransientConflict { attempts: 3 }.category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            ConferenceError::from(StoreError::Database("down".into())).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn filter_errors_keep_their_message() {
        let err = ConferenceError::from(FilterError::InvalidFilterOperator("LIKE".into()));
        assert_eq!(err.to_string(), "Filter contains invalid operator: LIKE");
        assert_eq!(err.code(), "INVALID_FILTER_OPERATOR");
    }
}
