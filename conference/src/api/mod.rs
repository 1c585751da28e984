//! HTTP API handlers.
//!
//! Handlers extract the caller and the body, delegate to a service, and map
//! [`ConferenceError`](conference_core::ConferenceError) to a response through
//! [`AppError`](conference_web::AppError).

pub mod conferences;
pub mod profile;
pub mod sessions;
pub mod wishlist;
