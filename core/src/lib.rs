//! # Conference Core
//!
//! Core traits and types of the conference backend.
//!
//! This crate holds everything that is independent of a concrete runtime, store or
//! transport: the entity model, the store contract, the filter compiler and the error
//! taxonomy.
//!
//! ## Core Concepts
//!
//! - **Entity / Model**: stored property maps and the typed domain records over them
//! - **`EntityKey`**: ancestor path addressing every entity; the root is its *entity group*
//! - **`EntityStore` / Transaction**: ancestor queries and optimistic multi-group transactions
//! - **`FilterCompiler`**: client filter triples to validated query plans
//! - **`NotificationSink` / Cache**: best-effort side effects, never authoritative
//!
//! ## Example
//!
//! ```ignore
//! use conference_core::filter::{FilterCompiler, FilterSpec};
//! use conference_core::key::Kind;
//!
//! let plan = FilterCompiler::conferences().compile(&[
//!     FilterSpec::new("MAX_ATTENDEES", "GT", "5"),
//!     FilterSpec::new("CITY", "EQ", "Seattle"),
//! ])?;
//! let conferences = store.query(plan.into_query(Kind::Conference)).await?;
//! ```

pub mod cache;
pub mod entity;
pub mod error;
pub mod filter;
pub mod key;
pub mod notification;
pub mod store;
pub mod types;

pub use cache::{ANNOUNCEMENTS_KEY, Cache, CacheError, FEATURED_SPEAKER_KEY};
pub use entity::{Entity, Model, Properties, Record};
pub use error::{ConferenceError, ErrorCategory};
pub use filter::{FilterCompiler, FilterError, FilterSpec, QueryPlan};
pub use key::{EntityGroup, EntityKey, KeyError, KeyId, Kind};
pub use notification::{NotificationSink, Task};
pub use store::{
    BoxFuture, Direction, EntityStore, EntityStoreExt, FilterClause, Operator, Query, SortKey,
    StoreError, Transaction, TransactionExt,
};
pub use types::{Caller, Conference, Profile, Session, TeeShirtSize, WishListEntry};

/// Environment traits.
///
/// External dependencies that are not stores are abstracted behind traits and injected
/// into the services that need them.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
