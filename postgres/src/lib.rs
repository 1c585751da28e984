//! `PostgreSQL` entity store for the conference backend.
//!
//! [`PostgresEntityStore`] implements the `EntityStore` trait from `conference-core` on a
//! single JSONB table:
//!
//! - Ancestor queries through an indexed array of ancestor keys
//! - Property filters and ordering evaluated in SQL, list properties included
//! - Optimistic multi-group transactions committed under `SERIALIZABLE`
//! - Connection pooling
//!
//! # Example
//!
//! ```ignore
//! use conference_postgres::PostgresEntityStore;
//! use std::time::Duration;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store =
//!         PostgresEntityStore::connect("postgres://localhost/conference", 10, Duration::from_secs(30))
//!             .await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod sql;
mod store;

pub use store::{MAX_TRANSACTION_GROUPS, PostgresEntityStore};
