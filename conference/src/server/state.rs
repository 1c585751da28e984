//! Application state for the conference HTTP server.

use crate::services::Services;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply via `Arc`) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Every application service
    pub services: Arc<Services>,
}

impl AppState {
    /// State serving `services`.
    #[must_use]
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}
