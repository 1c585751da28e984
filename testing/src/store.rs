//! In-memory entity store with optimistic transactions.
//!
//! Every key carries a version stamped from a store-wide counter. Transactions record the
//! version of each key they read (a missing key reads as version 0) and buffer their
//! writes; commit takes the write lock, re-checks every recorded version and applies the
//! writes only if none moved. Deleted keys keep their version so a delete also
//! invalidates readers.
//!
//! Used by tests and as the `memory` backend of the server.

use conference_core::{
    BoxFuture, Entity, EntityGroup, EntityKey, EntityStore, Kind, Query, StoreError, Transaction,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Maximum number of entity groups one transaction may enlist.
pub const MAX_TRANSACTION_GROUPS: usize = 25;

#[derive(Debug, Default)]
struct Slot {
    version: u64,
    entity: Option<Entity>,
}

#[derive(Debug, Default)]
struct State {
    slots: HashMap<EntityKey, Slot>,
    clock: u64,
}

impl State {
    fn version(&self, key: &EntityKey) -> u64 {
        self.slots.get(key).map_or(0, |slot| slot.version)
    }

    fn entity(&self, key: &EntityKey) -> Option<Entity> {
        self.slots.get(key).and_then(|slot| slot.entity.clone())
    }

    fn write(&mut self, key: EntityKey, entity: Option<Entity>) {
        self.clock += 1;
        let slot = self.slots.entry(key).or_default();
        slot.version = self.clock;
        slot.entity = entity;
    }

    fn live(&self) -> impl Iterator<Item = &Entity> {
        self.slots.values().filter_map(|slot| slot.entity.as_ref())
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: RwLock<State>,
    next_id: AtomicU64,
    injected_conflicts: AtomicU32,
}

impl Inner {
    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".to_string()))
    }
}

/// In-memory [`EntityStore`].
///
/// # Example
///
/// ```
/// use conference_testing::InMemoryEntityStore;
/// use conference_core::{EntityStore, Kind};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryEntityStore::new();
/// let key = store.allocate_id(Kind::Profile, None).await?;
/// assert!(store.get(key).await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEntityStore {
    inner: Arc<Inner>,
}

impl InMemoryEntityStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with [`StoreError::Conflict`].
    ///
    /// Useful for exercising retry paths deterministically.
    pub fn inject_conflicts(&self, count: u32) {
        self.inner.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of live entities of `kind`.
    #[must_use]
    pub fn count(&self, kind: Kind) -> usize {
        self.inner
            .read()
            .map(|state| state.live().filter(|e| e.key.kind() == kind).count())
            .unwrap_or(0)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map(|state| state.live().count()).unwrap_or(0)
    }

    /// Whether the store holds no live entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityStore for InMemoryEntityStore {
    fn allocate_id(
        &self,
        kind: Kind,
        parent: Option<EntityKey>,
    ) -> BoxFuture<'_, Result<EntityKey, StoreError>> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let key = match parent {
            Some(parent) => parent.child(kind, id),
            None => EntityKey::root(kind, id),
        };
        Box::pin(std::future::ready(Ok(key)))
    }

    fn get(&self, key: EntityKey) -> BoxFuture<'_, Result<Option<Entity>, StoreError>> {
        let result = self.inner.read().map(|state| state.entity(&key));
        Box::pin(std::future::ready(result))
    }

    fn get_multi(
        &self,
        keys: Vec<EntityKey>,
    ) -> BoxFuture<'_, Result<Vec<Option<Entity>>, StoreError>> {
        let result = self
            .inner
            .read()
            .map(|state| keys.iter().map(|key| state.entity(key)).collect());
        Box::pin(std::future::ready(result))
    }

    fn put(&self, entity: Entity) -> BoxFuture<'_, Result<(), StoreError>> {
        let result = self
            .inner
            .write()
            .map(|mut state| state.write(entity.key.clone(), Some(entity)));
        Box::pin(std::future::ready(result))
    }

    fn delete(&self, key: EntityKey) -> BoxFuture<'_, Result<(), StoreError>> {
        let result = self.inner.write().map(|mut state| {
            if state.slots.get(&key).is_some_and(|slot| slot.entity.is_some()) {
                state.write(key, None);
            }
        });
        Box::pin(std::future::ready(result))
    }

    fn query(&self, query: Query) -> BoxFuture<'_, Result<Vec<Entity>, StoreError>> {
        let result = self
            .inner
            .read()
            .map(|state| query.apply(state.live().cloned()));
        Box::pin(std::future::ready(result))
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
            Ok(Box::new(InMemoryTransaction {
                inner: Arc::clone(&self.inner),
                groups,
                reads: HashMap::new(),
                writes: BTreeMap::new(),
            }) as Box<dyn Transaction>)
        };
        Box::pin(std::future::ready(result))
    }
}

struct InMemoryTransaction {
    inner: Arc<Inner>,
    groups: Vec<EntityGroup>,
    reads: HashMap<EntityKey, u64>,
    writes: BTreeMap<EntityKey, Option<Entity>>,
}

impl InMemoryTransaction {
    fn check_enlisted(&self, key: &EntityKey) -> Result<(), StoreError> {
        if self.groups.iter().any(|group| group.contains(key)) {
            Ok(())
        } else {
            Err(StoreError::GroupNotEnlisted(key.clone()))
        }
    }

    fn read(&mut self, key: EntityKey) -> Result<Option<Entity>, StoreError> {
        self.check_enlisted(&key)?;
        if let Some(buffered) = self.writes.get(&key) {
            return Ok(buffered.clone());
        }
        let state = self.inner.read()?;
        let (version, entity) = (state.version(&key), state.entity(&key));
        drop(state);
        self.reads.entry(key).or_insert(version);
        Ok(entity)
    }
}

impl Transaction for InMemoryTransaction {
    fn get(&mut self, key: EntityKey) -> BoxFuture<'_, Result<Option<Entity>, StoreError>> {
        let result = self.read(key);
        Box::pin(std::future::ready(result))
    }

    fn put(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.check_enlisted(&entity.key)?;
        self.writes.insert(entity.key.clone(), Some(entity));
        Ok(())
    }

    fn delete(&mut self, key: EntityKey) -> Result<(), StoreError> {
        self.check_enlisted(&key)?;
        self.writes.insert(key, None);
        Ok(())
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>> {
        let result = commit(*self);
        Box::pin(std::future::ready(result))
    }
}

fn commit(txn: InMemoryTransaction) -> Result<(), StoreError> {
    let injected = txn
        .inner
        .injected_conflicts
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    if injected.is_ok() {
        return Err(StoreError::Conflict("injected conflict".to_string()));
    }

    let mut state = txn.inner.write()?;
    if let Some((key, _)) = txn
        .reads
        .iter()
        .find(|(key, version)| state.version(key) != **version)
    {
        return Err(StoreError::Conflict(format!("{key} changed since it was read")));
    }
    for (key, entity) in txn.writes {
        state.write(key, entity);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn entity(key: EntityKey, seats: u32) -> Entity {
        let mut properties = Map::new();
        properties.insert("seatsAvailable".into(), json!(seats));
        Entity::new(key, properties)
    }

    fn conference_key() -> EntityKey {
        EntityKey::profile("org").child(Kind::Conference, 1)
    }

    #[tokio::test]
    async fn transaction_sees_its_own_writes() {
        let store = InMemoryEntityStore::new();
        let key = conference_key();
        let mut txn = store.begin_transaction(vec![key.group()]).await.unwrap();

        txn.put(entity(key.clone(), 3)).unwrap();

        assert_eq!(txn.get(key.clone()).await.unwrap(), Some(entity(key.clone(), 3)));
        assert!(store.get(key.clone()).await.unwrap().is_none());

        txn.commit().await.unwrap();
        assert_eq!(store.get(key.clone()).await.unwrap(), Some(entity(key, 3)));
    }

    #[tokio::test]
    async fn concurrent_write_to_read_key_conflicts() {
        let store = InMemoryEntityStore::new();
        let key = conference_key();
        store.put(entity(key.clone(), 3)).await.unwrap();

        let mut txn = store.begin_transaction(vec![key.group()]).await.unwrap();
        txn.get(key.clone()).await.unwrap();
        store.put(entity(key.clone(), 2)).await.unwrap();
        txn.put(entity(key.clone(), 2)).unwrap();

        assert!(txn.commit().await.unwrap_err().is_conflict());
        assert_eq!(store.get(key.clone()).await.unwrap(), Some(entity(key, 2)));
    }

    #[tokio::test]
    async fn reading_a_missing_key_conflicts_with_its_creation() {
        let store = InMemoryEntityStore::new();
        let key = EntityKey::profile("alice");

        let mut txn = store.begin_transaction(vec![key.group()]).await.unwrap();
        assert!(txn.get(key.clone()).await.unwrap().is_none());
        store.put(entity(key.clone(), 0)).await.unwrap();

        assert!(txn.commit().await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn keys_outside_enlisted_groups_are_rejected() {
        let store = InMemoryEntityStore::new();
        let mut txn = store
            .begin_transaction(vec![EntityKey::profile("alice").group()])
            .await
            .unwrap();
        let outside = conference_key();

        assert_eq!(
            txn.get(outside.clone()).await.unwrap_err(),
            StoreError::GroupNotEnlisted(outside.clone())
        );
        assert!(txn.put(entity(outside.clone(), 1)).is_err());
        assert!(txn.delete(outside).is_err());
    }

    #[tokio::test]
    async fn injected_conflicts_fail_the_next_commits() {
        let store = InMemoryEntityStore::new();
        store.inject_conflicts(1);
        let key = EntityKey::profile("alice");

        let txn = store.begin_transaction(vec![key.group()]).await.unwrap();
        assert!(txn.commit().await.unwrap_err().is_conflict());

        let txn = store.begin_transaction(vec![key.group()]).await.unwrap();
        assert!(txn.commit().await.is_ok());
    }

    #[tokio::test]
    async fn too_many_groups_are_rejected() {
        let store = InMemoryEntityStore::new();
        let groups = (0..=MAX_TRANSACTION_GROUPS)
            .map(|i| EntityKey::profile(&format!("user-{i}")).group())
            .collect();

        assert!(matches!(
            store.begin_transaction(groups).await,
            Err(StoreError::TooManyGroups { .. })
        ));
    }

    #[tokio::test]
    async fn deleted_entities_leave_queries_and_get_multi() {
        let store = InMemoryEntityStore::new();
        let key = conference_key();
        store.put(entity(key.clone(), 1)).await.unwrap();
        store.delete(key.clone()).await.unwrap();

        assert!(store.query(Query::new(Kind::Conference)).await.unwrap().is_empty());
        assert_eq!(store.get_multi(vec![key]).await.unwrap(), vec![None]);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn allocated_ids_are_unique_children() {
        let store = InMemoryEntityStore::new();
        let parent = EntityKey::profile("org");

        let a = store.allocate_id(Kind::Conference, Some(parent.clone())).await.unwrap();
        let b = store.allocate_id(Kind::Conference, Some(parent.clone())).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(parent));
    }
}
