//! [`EntityStore`] over a single `entities` table.

use crate::sql;
use conference_core::{
    BoxFuture, Entity, EntityGroup, EntityKey, EntityStore, Kind, Query, StoreError, Transaction,
};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgExecutor, Row};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Maximum number of entity groups one transaction may enlist.
pub const MAX_TRANSACTION_GROUPS: usize = 25;

/// SQLSTATEs PostgreSQL raises when a serializable transaction must be retried.
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

const SCHEMA: [&str; 5] = [
    r"
    CREATE TABLE IF NOT EXISTS entities (
        key TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        ancestors TEXT[] NOT NULL,
        version BIGINT NOT NULL,
        properties JSONB NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind)",
    "CREATE INDEX IF NOT EXISTS idx_entities_ancestors ON entities USING GIN (ancestors)",
    "CREATE SEQUENCE IF NOT EXISTS entity_ids",
    "CREATE SEQUENCE IF NOT EXISTS entity_versions",
];

/// Map a sqlx error, turning serialization failures and deadlocks into conflicts.
fn database(error: sqlx::Error) -> StoreError {
    if let Some(db) = error.as_database_error() {
        if db
            .code()
            .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref()))
        {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Database(error.to_string())
}

fn decode(row: &PgRow) -> Result<Entity, StoreError> {
    let encoded: String = row.try_get("key").map_err(database)?;
    let properties: Value = row.try_get("properties").map_err(database)?;
    let key = EntityKey::from_urlsafe(&encoded)
        .map_err(|e| StoreError::Serialization(format!("stored key {encoded}: {e}")))?;
    match properties {
        Value::Object(properties) => Ok(Entity::new(key, properties)),
        other => Err(StoreError::Serialization(format!(
            "properties of {key} are not an object: {other}"
        ))),
    }
}

async fn upsert<'c>(executor: impl PgExecutor<'c>, entity: Entity) -> Result<(), StoreError> {
    let ancestors: Vec<String> = entity
        .key
        .ancestry()
        .iter()
        .map(EntityKey::to_urlsafe)
        .collect();
    sqlx::query(
        r"
        INSERT INTO entities (key, kind, ancestors, version, properties)
        VALUES ($1, $2, $3, nextval('entity_versions'), $4)
        ON CONFLICT (key) DO UPDATE
        SET properties = EXCLUDED.properties, version = EXCLUDED.version
        ",
    )
    .bind(entity.key.to_urlsafe())
    .bind(entity.key.kind().as_str())
    .bind(ancestors)
    .bind(Value::Object(entity.properties))
    .execute(executor)
    .await
    .map_err(database)?;
    Ok(())
}

async fn remove<'c>(executor: impl PgExecutor<'c>, key: &EntityKey) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM entities WHERE key = $1")
        .bind(key.to_urlsafe())
        .execute(executor)
        .await
        .map_err(database)?;
    Ok(())
}

/// `PostgreSQL` [`EntityStore`].
///
/// Every entity is one row: its websafe key, its kind, the websafe keys of all its
/// ancestors (for ancestor queries), a version stamped from a sequence on every write,
/// and its properties as JSONB.
///
/// Transactions are optimistic: reads go straight to the pool and record the row
/// version, writes are buffered, and commit re-checks the versions under `FOR UPDATE`
/// inside a `SERIALIZABLE` transaction before applying the writes.
#[derive(Clone, Debug)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    /// Connect a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL entity store");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the table, indexes and sequences if they are missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(database)?;
        }
        Ok(())
    }

    /// Round-trip a trivial query, for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(database)?;
        Ok(())
    }
}

impl EntityStore for PostgresEntityStore {
    fn allocate_id(
        &self,
        kind: Kind,
        parent: Option<EntityKey>,
    ) -> BoxFuture<'_, Result<EntityKey, StoreError>> {
        Box::pin(async move {
            let id: i64 = sqlx::query_scalar("SELECT nextval('entity_ids')")
                .fetch_one(&self.pool)
                .await
                .map_err(database)?;
            let id = u64::try_from(id)
                .map_err(|_| StoreError::Database(format!("sequence returned {id}")))?;
            Ok(match parent {
                Some(parent) => parent.child(kind, id),
                None => EntityKey::root(kind, id),
            })
        })
    }

    fn get(&self, key: EntityKey) -> BoxFuture<'_, Result<Option<Entity>, StoreError>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT key, properties FROM entities WHERE key = $1")
                .bind(key.to_urlsafe())
                .fetch_optional(&self.pool)
                .await
                .map_err(database)?;
            row.as_ref().map(decode).transpose()
        })
    }

    fn get_multi(
        &self,
        keys: Vec<EntityKey>,
    ) -> BoxFuture<'_, Result<Vec<Option<Entity>>, StoreError>> {
        Box::pin(async move {
            let encoded: Vec<String> = keys.iter().map(EntityKey::to_urlsafe).collect();
            let rows = sqlx::query("SELECT key, properties FROM entities WHERE key = ANY($1)")
                .bind(encoded)
                .fetch_all(&self.pool)
                .await
                .map_err(database)?;

            let mut found = HashMap::with_capacity(rows.len());
            for row in &rows {
                let entity = decode(row)?;
                found.insert(entity.key.clone(), entity);
            }
            Ok(keys.iter().map(|key| found.get(key).cloned()).collect())
        })
    }

    fn put(&self, entity: Entity) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { upsert(&self.pool, entity).await })
    }

    fn delete(&self, key: EntityKey) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { remove(&self.pool, &key).await })
    }

    fn query(&self, query: Query) -> BoxFuture<'_, Result<Vec<Entity>, StoreError>> {
        Box::pin(async move {
            let mut qb = sql::select(&query);
            let rows = qb.build().fetch_all(&self.pool).await.map_err(database)?;
            rows.iter().map(decode).collect()
        })
    }

    fn begin_transaction(
        &self,
        groups: Vec<EntityGroup>,
    ) -> BoxFuture<'_, Result<Box<dyn Transaction>, StoreError>> {
        let result = if groups.len() > MAX_TRANSACTION_GROUPS {
            Err(StoreError::TooManyGroups {
                requested: groups.len(),
                max: MAX_TRANSACTION_GROUPS,
            })
        } else {
            Ok(Box::new(PostgresTransaction {
                pool: self.pool.clone(),
                groups,
                reads: BTreeMap::new(),
                writes: BTreeMap::new(),
            }) as Box<dyn Transaction>)
        };
        Box::pin(std::future::ready(result))
    }
}

/// Open transaction on a [`PostgresEntityStore`].
struct PostgresTransaction {
    pool: PgPool,
    groups: Vec<EntityGroup>,
    // Ordered so commit locks rows in a stable order across transactions.
    reads: BTreeMap<EntityKey, i64>,
    writes: BTreeMap<EntityKey, Option<Entity>>,
}

impl PostgresTransaction {
    fn check(&self, key: &EntityKey) -> Result<(), StoreError> {
        if self.groups.iter().any(|group| group.contains(key)) {
            Ok(())
        } else {
            Err(StoreError::GroupNotEnlisted(key.clone()))
        }
    }
}

impl Transaction for PostgresTransaction {
    fn get(&mut self, key: EntityKey) -> BoxFuture<'_, Result<Option<Entity>, StoreError>> {
        if let Err(e) = self.check(&key) {
            return Box::pin(std::future::ready(Err(e)));
        }
        if let Some(buffered) = self.writes.get(&key) {
            return Box::pin(std::future::ready(Ok(buffered.clone())));
        }
        Box::pin(async move {
            let row =
                sqlx::query("SELECT key, version, properties FROM entities WHERE key = $1")
                    .bind(key.to_urlsafe())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(database)?;
            let version = match &row {
                Some(row) => row.try_get::<i64, _>("version").map_err(database)?,
                None => 0,
            };
            self.reads.entry(key).or_insert(version);
            row.as_ref().map(decode).transpose()
        })
    }

    fn put(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.check(&entity.key)?;
        self.writes.insert(entity.key.clone(), Some(entity));
        Ok(())
    }

    fn delete(&mut self, key: EntityKey) -> Result<(), StoreError> {
        self.check(&key)?;
        self.writes.insert(key, None);
        Ok(())
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>> {
        let Self {
            pool,
            reads,
            writes,
            ..
        } = *self;

        Box::pin(async move {
            let mut tx = pool.begin().await.map_err(database)?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *tx)
                .await
                .map_err(database)?;

            for (key, expected) in &reads {
                let current: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM entities WHERE key = $1 FOR UPDATE")
                        .bind(key.to_urlsafe())
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(database)?;
                if current.unwrap_or(0) != *expected {
                    tracing::debug!(key = %key, "Version moved since read");
                    metrics::counter!("conference_store_version_mismatches_total").increment(1);
                    // Dropping `tx` rolls back.
                    return Err(StoreError::Conflict(format!("{key} changed since it was read")));
                }
            }

            for (key, entity) in writes {
                match entity {
                    Some(entity) => upsert(&mut *tx, entity).await?,
                    None => remove(&mut *tx, &key).await?,
                }
            }

            tx.commit().await.map_err(database)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_table_before_indexes() {
        assert!(SCHEMA[0].contains("CREATE TABLE IF NOT EXISTS entities"));
        assert!(SCHEMA[1..].iter().all(|s| !s.contains("CREATE TABLE")));
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        let error = database(sqlx::Error::RowNotFound);
        assert!(matches!(error, StoreError::Database(_)));
        assert!(!error.is_conflict());
    }
}
