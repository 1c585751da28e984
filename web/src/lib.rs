//! Axum integration for the conference backend.
//!
//! The application crate owns the routes and the services; this crate provides the
//! pieces every handler needs:
//!
//! - [`AppError`]: maps [`ConferenceError`](conference_core::ConferenceError) categories to
//!   HTTP statuses and renders `{ "code", "message" }`
//! - [`CurrentUser`]: caller identity from the fronting proxy's headers
//! - [`CorrelationId`] and [`correlation_id_layer`]: per-request tracing context
//! - health and readiness handlers
//!
//! # Request Flow
//!
//! 1. **HTTP Request** passes the correlation-id layer
//! 2. **Extract** caller, path and JSON body
//! 3. **Call** the application service
//! 4. **Map** the result (or `ConferenceError`) to an HTTP response
//!
//! # Example
//!
//! ```ignore
//! use conference_web::{AppError, CurrentUser};
//! use axum::{Router, routing::post, extract::{Path, State}, Json};
//!
//! async fn register(
//!     State(app): State<AppState>,
//!     CurrentUser(caller): CurrentUser,
//!     Path(key): Path<String>,
//! ) -> Result<Json<BooleanMessage>, AppError> {
//!     let registered = app.conferences.register(&caller, &key).await?;
//!     Ok(Json(BooleanMessage { data: registered }))
//! }
//!
//! let app = Router::new()
//!     .route("/api/conferences/:key/registration", post(register))
//!     .with_state(app_state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{CorrelationId, CurrentUser, QueryParams};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
