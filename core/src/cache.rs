//! Advisory string cache for announcements.
//!
//! Values are best-effort and may be stale. Nothing reads them for correctness.

use crate::store::BoxFuture;
use thiserror::Error;

/// Cache key of the "nearly sold out" announcement.
pub const ANNOUNCEMENTS_KEY: &str = "RECENT_ANNOUNCEMENTS";

/// Cache key of the featured speaker message.
pub const FEATURED_SPEAKER_KEY: &str = "FEATURED_SPEAKER";

/// Cache backend failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cache error: {0}")]
pub struct CacheError(pub String);

/// Key-value string cache.
pub trait Cache: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CacheError>>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), CacheError>>;

    /// Remove a value. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), CacheError>>;
}
