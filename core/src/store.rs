//! Entity store trait and the query model it executes.
//!
//! The store is a key-value/document store with:
//!
//! - ancestor-scoped queries with property filters and ordering
//! - optimistic, multi-group transactions
//!
//! # Implementations
//!
//! - `InMemoryEntityStore` (in `conference-testing`): fast, deterministic, also the
//!   default backend of the server binary
//! - `PostgresEntityStore` (in `conference-postgres`): JSONB rows, serializable transactions
//!
//! # Dyn Compatibility
//!
//! Like the rest of the collaborator traits, methods return boxed futures so that the
//! application can hold an `Arc<dyn EntityStore>`.

use crate::entity::{Entity, Model, Record};
use crate::key::{EntityGroup, EntityKey, Kind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed, sendable future returned by the store traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: data read by the transaction changed before commit.
    ///
    /// Retryable: run the whole transaction again.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// A transaction touched a key outside the groups it enlisted.
    #[error("Key {0} is outside the transaction's entity groups")]
    GroupNotEnlisted(EntityKey),

    /// A transaction asked for more entity groups than the store supports.
    #[error("Transaction spans {requested} entity groups, at most {max} are supported")]
    TooManyGroups {
        /// Groups requested.
        requested: usize,
        /// Store limit.
        max: usize,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend failure (connection, query, poisoned lock...).
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether retrying the transaction may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Comparison operator of a filter clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `!=`
    Ne,
}

impl Operator {
    /// Every operator, in allow-list order.
    pub const ALL: [Self; 6] = [Self::Eq, Self::Gt, Self::GtEq, Self::Lt, Self::LtEq, Self::Ne];

    /// Parse the symbolic name clients submit (`EQ`, `GT`, `GTEQ`, `LT`, `LTEQ`, `NE`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Symbolic name of the operator.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Gt => "GT",
            Self::GtEq => "GTEQ",
            Self::Lt => "LT",
            Self::LtEq => "LTEQ",
            Self::Ne => "NE",
        }
    }

    /// Comparison symbol, as used in SQL.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Ne => "<>",
        }
    }

    /// Everything except equality is an inequality.
    #[must_use]
    pub const fn is_inequality(self) -> bool {
        !matches!(self, Self::Eq)
    }

    /// Whether `stored.cmp(operand) == ordering` satisfies the operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::GtEq => !matches!(ordering, Ordering::Less),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::LtEq => !matches!(ordering, Ordering::Greater),
            Self::Ne => !matches!(ordering, Ordering::Equal),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One validated `property op value` condition.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterClause {
    /// Internal property name.
    pub property: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Operand, already coerced to the property's stored type.
    pub value: Value,
}

impl FilterClause {
    /// Create a clause.
    #[must_use]
    pub fn new(property: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            property: property.into(),
            operator,
            value,
        }
    }

    /// Evaluate against an entity.
    ///
    /// List properties match when any element matches; missing properties never match.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        let accepts = |stored: &Value| {
            compare_values(stored, &self.value).is_some_and(|o| self.operator.accepts(o))
        };
        match entity.property(&self.property) {
            Some(Value::Array(items)) => items.iter().any(accepts),
            Some(stored) => accepts(stored),
            None => false,
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One ordering key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    /// Internal property name.
    pub property: String,
    /// Direction.
    pub direction: Direction,
}

impl SortKey {
    /// Ascending order on `property`.
    #[must_use]
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    /// Descending order on `property`.
    #[must_use]
    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Descending,
        }
    }

    fn sort_value<'e>(&self, entity: &'e Entity) -> Option<&'e Value> {
        let pick = match self.direction {
            Direction::Ascending => Ordering::Less,
            Direction::Descending => Ordering::Greater,
        };
        match entity.property(&self.property)? {
            Value::Array(items) => items.iter().reduce(|best, item| {
                if compare_values(item, best) == Some(pick) {
                    item
                } else {
                    best
                }
            }),
            value => Some(value),
        }
    }
}

/// A query against one entity kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Entity kind to return.
    pub kind: Kind,
    /// Restrict to the subtree of this key.
    pub ancestor: Option<EntityKey>,
    /// Clauses, ANDed together.
    pub filters: Vec<FilterClause>,
    /// Ordering, applied key by key.
    pub order: Vec<SortKey>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Unfiltered, unordered query over `kind`.
    #[must_use]
    pub const fn new(kind: Kind) -> Self {
        Self {
            kind,
            ancestor: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Restrict to the subtree of `ancestor`.
    #[must_use]
    pub fn with_ancestor(mut self, ancestor: EntityKey) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Add a clause.
    #[must_use]
    pub fn filter(mut self, clause: FilterClause) -> Self {
        self.filters.push(clause);
        self
    }

    /// Add an ordering key.
    #[must_use]
    pub fn order_by(mut self, key: SortKey) -> Self {
        self.order.push(key);
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether the entity passes kind, ancestor and filter checks and has every sort property.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.key.kind() == self.kind
            && self
                .ancestor
                .as_ref()
                .is_none_or(|ancestor| entity.key.has_ancestor(ancestor))
            && self.filters.iter().all(|clause| clause.matches(entity))
            && self
                .order
                .iter()
                .all(|key| entity.property(&key.property).is_some())
    }

    /// Compare two matching entities according to the ordering keys.
    ///
    /// Entities equal on every key fall back to key order so results are deterministic.
    #[must_use]
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        for key in &self.order {
            let ordering = match (key.sort_value(a), key.sort_value(b)) {
                (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            let ordering = match key.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.key.cmp(&b.key)
    }

    /// Run the query over an in-memory collection.
    #[must_use]
    pub fn apply(&self, entities: impl IntoIterator<Item = Entity>) -> Vec<Entity> {
        let mut results: Vec<Entity> = entities.into_iter().filter(|e| self.matches(e)).collect();
        results.sort_by(|a, b| self.compare(a, b));
        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}

/// Compare two scalar property values of the same type.
///
/// Numbers compare numerically, strings lexicographically (ISO dates and times therefore
/// compare chronologically), booleans false-before-true. Mixed types are incomparable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Entity store abstraction.
///
/// Non-transactional writes are last-writer-wins but still invalidate concurrent
/// transactions that read the same key.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared across request handlers.
pub trait EntityStore: Send + Sync {
    /// Allocate a fresh numeric key of `kind` under `parent`.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn allocate_id(
        &self,
        kind: Kind,
        parent: Option<EntityKey>,
    ) -> BoxFuture<'_, Result<EntityKey, StoreError>>;

    /// Load one entity. A missing entity is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn get(&self, key: EntityKey) -> BoxFuture<'_, Result<Option<Entity>, StoreError>>;

    /// Load several entities; the result is positionally aligned with `keys`.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn get_multi(
        &self,
        keys: Vec<EntityKey>,
    ) -> BoxFuture<'_, Result<Vec<Option<Entity>>, StoreError>>;

    /// Insert or replace an entity.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn put(&self, entity: Entity) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Delete an entity. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn delete(&self, key: EntityKey) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Execute a query.
    ///
    /// # Errors
    ///
    /// - `Database`: backend failure
    fn query(&self, query: Query) -> BoxFuture<'_, Result<Vec<Entity>, StoreError>>;

    /// Start a transaction spanning `groups`.
    ///
    /// Every key read or written through the transaction must belong to one of the groups.
    ///
    /// # Errors
    ///
    /// - `TooManyGroups`: the store cannot span that many groups atomically
    /// - `Database`: backend failure
    fn begin_transaction(
        &self,
        groups: Vec<EntityGroup>,
    ) -> BoxFuture<'_, Result<Box<dyn Transaction>, StoreError>>;
}

/// An open optimistic transaction.
///
/// Reads are tracked; writes are buffered until [`Transaction::commit`], which applies all
/// of them atomically or fails with [`StoreError::Conflict`] if anything read has changed.
/// Dropping a transaction without committing discards it.
pub trait Transaction: Send {
    /// Read an entity, seeing this transaction's own buffered writes.
    ///
    /// # Errors
    ///
    /// - `GroupNotEnlisted`: key outside the transaction's groups
    /// - `Database`: backend failure
    fn get(&mut self, key: EntityKey) -> BoxFuture<'_, Result<Option<Entity>, StoreError>>;

    /// Buffer a write.
    ///
    /// # Errors
    ///
    /// - `GroupNotEnlisted`: key outside the transaction's groups
    fn put(&mut self, entity: Entity) -> Result<(), StoreError>;

    /// Buffer a delete.
    ///
    /// # Errors
    ///
    /// - `GroupNotEnlisted`: key outside the transaction's groups
    fn delete(&mut self, key: EntityKey) -> Result<(), StoreError>;

    /// Apply every buffered write atomically.
    ///
    /// # Errors
    ///
    /// - `Conflict`: concurrent modification detected, nothing was applied
    /// - `Database`: backend failure
    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>>;
}

/// Typed helpers over [`EntityStore`].
pub trait EntityStoreExt: EntityStore {
    /// Load and decode a model.
    fn load<M: Model>(
        &self,
        key: &EntityKey,
    ) -> impl Future<Output = Result<Option<M>, StoreError>> + Send {
        async move {
            match self.get(key.clone()).await? {
                Some(entity) => entity.to_model().map(Some),
                None => Ok(None),
            }
        }
    }

    /// Encode and store a model.
    fn save<M: Model>(
        &self,
        key: &EntityKey,
        model: &M,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        let entity = Entity::from_model(key.clone(), model);
        async move { self.put(entity?).await }
    }

    /// Run a query and decode every result.
    fn query_models<M: Model>(
        &self,
        query: Query,
    ) -> impl Future<Output = Result<Vec<Record<M>>, StoreError>> + Send {
        async move {
            self.query(query)
                .await?
                .iter()
                .map(Record::from_entity)
                .collect()
        }
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

/// Typed helpers over [`Transaction`].
pub trait TransactionExt: Transaction {
    /// Load and decode a model inside the transaction.
    fn load<M: Model>(
        &mut self,
        key: &EntityKey,
    ) -> impl Future<Output = Result<Option<M>, StoreError>> + Send {
        let key = key.clone();
        async move {
            match self.get(key).await? {
                Some(entity) => entity.to_model().map(Some),
                None => Ok(None),
            }
        }
    }

    /// Encode and buffer a model write.
    ///
    /// # Errors
    ///
    /// See [`Entity::from_model`] and [`Transaction::put`].
    fn save<M: Model>(&mut self, key: &EntityKey, model: &M) -> Result<(), StoreError> {
        self.put(Entity::from_model(key.clone(), model)?)
    }
}

impl<T: Transaction + ?Sized> TransactionExt for T {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conference(id: u64, name: &str, city: &str, max: u64, topics: &[&str]) -> Entity {
        let key = EntityKey::profile("org").child(Kind::Conference, id);
        let properties = json!({
            "name": name,
            "city": city,
            "maxAttendees": max,
            "topics": topics,
        });
        Entity::new(key, properties.as_object().unwrap().clone())
    }

    #[test]
    fn operator_names_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_name(op.name()), Some(op));
        }
        assert_eq!(Operator::from_name("LIKE"), None);
        assert_eq!(Operator::from_name("eq"), None);
    }

    #[test]
    fn list_property_matches_any_element() {
        let entity = conference(1, "RustConf", "Portland", 100, &["Rust", "Systems"]);

        assert!(FilterClause::new("topics", Operator::Eq, json!("Systems")).matches(&entity));
        assert!(!FilterClause::new("topics", Operator::Eq, json!("Go")).matches(&entity));
    }

    #[test]
    fn missing_and_mistyped_properties_never_match() {
        let entity = conference(1, "RustConf", "Portland", 100, &[]);

        assert!(!FilterClause::new("month", Operator::Ne, json!(3)).matches(&entity));
        assert!(!FilterClause::new("maxAttendees", Operator::Gt, json!("5")).matches(&entity));
    }

    #[test]
    fn apply_filters_orders_and_limits() {
        let query = Query::new(Kind::Conference)
            .filter(FilterClause::new("maxAttendees", Operator::Gt, json!(5)))
            .order_by(SortKey::ascending("maxAttendees"))
            .order_by(SortKey::ascending("name"))
            .limit(2);

        let results = query.apply(vec![
            conference(1, "Zeta", "Berlin", 50, &[]),
            conference(2, "Alpha", "Berlin", 50, &[]),
            conference(3, "Small", "Berlin", 5, &[]),
            conference(4, "Huge", "Berlin", 500, &[]),
        ]);

        let names: Vec<_> = results
            .iter()
            .map(|e| e.property("name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn ancestor_scope_excludes_other_groups() {
        let mine = conference(1, "Mine", "Berlin", 10, &[]);
        let mut theirs = conference(2, "Theirs", "Berlin", 10, &[]);
        theirs.key = EntityKey::profile("other").child(Kind::Conference, 2);

        let results = Query::new(Kind::Conference)
            .with_ancestor(EntityKey::profile("org"))
            .apply(vec![mine.clone(), theirs]);

        assert_eq!(results, vec![mine]);
    }

    #[test]
    fn descending_order_on_list_uses_largest_element() {
        let a = conference(1, "A", "X", 1, &["b", "c"]);
        let b = conference(2, "B", "X", 1, &["a", "z"]);

        let results = Query::new(Kind::Conference)
            .order_by(SortKey::descending("topics"))
            .apply(vec![a, b.clone()]);

        assert_eq!(results[0], b);
    }

    #[test]
    fn conflict_is_the_only_retryable_error() {
        assert!(StoreError::Conflict("x".into()).is_conflict());
        assert!(!StoreError::Database("x".into()).is_conflict());
    }
}
