//! Conference organisation backend.
//!
//! Users maintain a profile, create and query conferences, register for them
//! under a capacity limit, attach sessions, and keep a wishlist of sessions.
//! A background worker sends confirmation emails and maintains two advisory
//! cache entries: the nearly-sold-out announcement and the featured speaker.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌────────────────────────────┐
//! │  HTTP (axum) │ ─► │   Services   │ ─► │ EntityStore                │
//! │  api::*      │    │  services::* │    │  memory | PostgreSQL       │
//! └──────────────┘    └──────────────┘    └────────────────────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐    ┌────────────────────────────┐
//!                     │  TaskQueue   │ ─► │ TaskWorker                 │
//!                     └──────────────┘    │  email | cache (memory/redis)│
//!                                         └────────────────────────────┘
//! ```
//!
//! Registration runs in a cross-group transaction over the attendee's profile and
//! the conference, retried on conflict, so seats are never oversold.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod forms;
pub mod server;
pub mod services;

pub use app::{AppError, ConferenceApp};
pub use config::Config;
pub use services::{Dependencies, Services};
