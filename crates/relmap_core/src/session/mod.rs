//! Sessions: the unit of work over a backing store.
//!
//! A session tracks loaded row snapshots in an identity map, buffers
//! inserts, updates, and deletes, and writes them back in one store
//! transaction at flush time. Entity instances handed out by `find` and
//! queries are plain values; the session compares and writes snapshots,
//! not object graphs, so modifications are reported explicitly through
//! [`Session::update`] or adopted wholesale through [`Session::merge`].

mod state;

use crate::entity::Entity;
use crate::entity::Ref;
use crate::error::{CoreError, CoreResult};
use crate::factory::SessionFactory;
use crate::query::Query;
use crate::types::EntityKey;
use relmap_schema::{
    Association, AssociationKind, Cascade, EntityDescriptor, FetchPolicy, KeyStrategy, Value,
};
use relmap_store::{JoinSide, Row, StoreTransaction};
use state::{ManagedEntity, Status};
use std::collections::{HashMap, HashSet};

/// A unit of work bound to one [`SessionFactory`].
///
/// Mutating operations require an active transaction (`begin`); reads do
/// not. `commit` flushes pending changes, applies the store transaction,
/// and publishes second-level cache updates; `rollback` discards staged
/// writes and detaches everything. Dropping a session with an open
/// transaction rolls it back.
pub struct Session<'f> {
    factory: &'f SessionFactory,
    txn: Option<StoreTransaction<'f>>,
    cache: HashMap<(String, i64), ManagedEntity>,
    insert_log: Vec<(String, i64)>,
    removal_log: Vec<(String, i64)>,
    /// Entities written by flushed or bulk statements in this transaction.
    touched: HashSet<String>,
    /// Entities hit by bulk statements; their cache regions are evicted
    /// wholesale at commit.
    bulk_entities: HashSet<String>,
    /// Second-level cache updates to publish after a successful commit.
    pending_l2: Vec<(String, i64, Option<Row>)>,
    closed: bool,
}

impl<'f> Session<'f> {
    pub(crate) fn new(factory: &'f SessionFactory) -> Self {
        Self {
            factory,
            txn: None,
            cache: HashMap::new(),
            insert_log: Vec::new(),
            removal_log: Vec::new(),
            touched: HashSet::new(),
            bulk_entities: HashSet::new(),
            pending_l2: Vec::new(),
            closed: false,
        }
    }

    /// Returns the factory this session belongs to.
    #[must_use]
    pub fn factory(&self) -> &'f SessionFactory {
        self.factory
    }

    /// Returns true if a transaction is active.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Begins a transaction, blocking until the store's writer lock is
    /// free.
    pub fn begin(&mut self) -> CoreResult<()> {
        self.check_open()?;
        if self.txn.is_some() {
            return Err(CoreError::TransactionActive);
        }
        self.txn = Some(self.backend().begin());
        Ok(())
    }

    /// Flushes pending changes and commits the transaction.
    ///
    /// On success, second-level cache entries for committed cacheable
    /// rows are published and query results over written entities are
    /// invalidated.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.flush()?;
        let txn = self.txn.take().ok_or(CoreError::TransactionRequired)?;
        let factory = self.factory;
        factory.backend().commit(txn)?;
        tracing::debug!(
            snapshots = self.pending_l2.len(),
            invalidated = self.touched.len(),
            "committed"
        );

        if factory.config().second_level_cache {
            for (name, key, snapshot) in self.pending_l2.drain(..) {
                match snapshot {
                    Some(row) => factory.cache().put(&name, key, row),
                    None => factory.cache().evict(&name, key),
                }
            }
        } else {
            self.pending_l2.clear();
        }
        for name in self.bulk_entities.drain() {
            factory.cache().evict_entity(&name);
        }
        for name in self.touched.drain() {
            factory.invalidate_query_results(&name);
        }
        self.cache.retain(|_, e| e.status != Status::Removed);
        Ok(())
    }

    /// Rolls the transaction back, discarding staged writes and
    /// detaching every managed entity.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.check_open()?;
        self.txn.take().ok_or(CoreError::TransactionRequired)?;
        self.clear();
        Ok(())
    }

    /// Detaches every managed entity and drops pending changes that were
    /// not yet flushed. Writes already staged in the store transaction
    /// remain staged.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.insert_log.clear();
        self.removal_log.clear();
        self.touched.clear();
        self.bulk_entities.clear();
        self.pending_l2.clear();
    }

    /// Closes the session. An open transaction is rolled back. Every
    /// later operation fails with [`CoreError::SessionClosed`].
    pub fn close(&mut self) {
        self.txn = None;
        self.clear();
        self.closed = true;
    }

    /// Loads an entity by key.
    ///
    /// Consults the identity map first, then the second-level cache for
    /// cacheable entities, then the store. Eagerly fetched associations
    /// are loaded into the session alongside. Returns `None` for a
    /// missing row or one scheduled for removal.
    pub fn find<T: Entity>(&mut self, key: EntityKey) -> CoreResult<Option<T>> {
        self.check_open()?;
        match self.load_row(T::NAME, key.as_i64())? {
            Some(row) => Ok(Some(T::from_row(key, &row)?)),
            None => Ok(None),
        }
    }

    /// Returns a typed reference to a key without touching the store.
    ///
    /// The reference may dangle; that surfaces when it is resolved.
    #[must_use]
    pub fn get_reference<T: Entity>(&self, key: EntityKey) -> Ref<T> {
        Ref::to(key)
    }

    /// Resolves a reference through this session.
    pub fn resolve<T: Entity>(&mut self, reference: &Ref<T>) -> CoreResult<Option<T>> {
        self.check_open()?;
        match reference {
            Ref::None => Ok(None),
            Ref::Key(key) => self.find(*key),
            Ref::Pending(entity) => Ok(Some((**entity).clone())),
        }
    }

    /// Returns true if the entity is managed by this session.
    #[must_use]
    pub fn contains<T: Entity>(&self, entity: &T) -> bool {
        entity.key().is_some_and(|k| {
            matches!(
                self.cache
                    .get(&(T::NAME.to_string(), k.as_i64()))
                    .map(|e| e.status),
                Some(Status::New | Status::Managed)
            )
        })
    }

    /// Detaches one entity; pending changes to it are forgotten.
    pub fn detach<T: Entity>(&mut self, entity: &T) {
        let Some(key) = entity.key() else { return };
        let cache_key = (T::NAME.to_string(), key.as_i64());
        if let Some(entry) = self.cache.remove(&cache_key) {
            if entry.status == Status::New {
                self.insert_log
                    .retain(|(n, k)| !(n == T::NAME && *k == key.as_i64()));
            }
        }
    }

    /// Makes a transient entity persistent, assigning its key.
    ///
    /// Under the `Auto` key strategy the entity must not have a key yet
    /// (a detached copy goes through `merge` instead); under `Assigned`
    /// it must. Pending references cascade when their association allows
    /// persist to propagate, and fail otherwise. The insert itself is
    /// staged at flush time.
    pub fn persist<T: Entity>(&mut self, entity: &mut T) -> CoreResult<EntityKey> {
        self.check_open()?;
        if self.txn.is_none() {
            return Err(CoreError::TransactionRequired);
        }
        let factory = self.factory;
        let descriptor = factory.registry().entity(T::NAME)?;

        entity.visit_refs(&mut |field, reference| {
            if !reference.has_pending() {
                return Ok(());
            }
            let assoc = descriptor.association_named(field).ok_or_else(|| {
                CoreError::UnknownField {
                    entity: descriptor.name.clone(),
                    field: field.to_string(),
                }
            })?;
            if assoc.cascades(Cascade::Persist) {
                reference.cascade_persist(self)
            } else {
                Err(CoreError::illegal_state(format!(
                    "{}.{} references a transient {} and does not cascade persist",
                    descriptor.name, field, assoc.target
                )))
            }
        })?;

        let key = match descriptor.key_strategy {
            KeyStrategy::Auto => {
                if entity.key().is_some() {
                    return Err(CoreError::illegal_state(format!(
                        "{} already has a key; merge detached entities instead",
                        T::NAME
                    )));
                }
                let key = EntityKey::new(factory.backend().next_key(&descriptor.table)?);
                entity.set_key(key);
                key
            }
            KeyStrategy::Assigned => entity.key().ok_or_else(|| {
                CoreError::illegal_state(format!(
                    "{} uses assigned keys; set one before persist",
                    T::NAME
                ))
            })?,
        };

        let row = entity.to_row()?;
        let cache_key = (T::NAME.to_string(), key.as_i64());
        match self.cache.get_mut(&cache_key) {
            Some(entry) if entry.status == Status::Removed => {
                // Removed then re-persisted in the same unit of work:
                // the row still exists, so this becomes an update.
                entry.status = Status::Managed;
                entry.row = row;
                entry.dirty = true;
                self.removal_log
                    .retain(|(n, k)| !(n == T::NAME && *k == key.as_i64()));
            }
            Some(_) => {
                return Err(CoreError::illegal_state(format!(
                    "{} {key} is already managed",
                    T::NAME
                )));
            }
            None => {
                self.cache.insert(cache_key, ManagedEntity::new_entry(row));
                self.insert_log.push((T::NAME.to_string(), key.as_i64()));
            }
        }
        tracing::trace!(entity = T::NAME, %key, "persisted");
        Ok(key)
    }

    /// Merges the state of a detached (or transient) entity into the
    /// session and returns the managed copy.
    ///
    /// A transient entity is persisted. A detached entity overwrites the
    /// managed snapshot if one exists, otherwise it is loaded and
    /// overwritten. A detached entity whose row no longer exists is
    /// re-inserted, with a fresh key under the `Auto` strategy.
    pub fn merge<T: Entity>(&mut self, entity: &T) -> CoreResult<T> {
        self.check_open()?;
        if self.txn.is_none() {
            return Err(CoreError::TransactionRequired);
        }
        let factory = self.factory;
        let descriptor = factory.registry().entity(T::NAME)?;

        let Some(key) = entity.key() else {
            let mut copy = entity.clone();
            self.persist(&mut copy)?;
            return Ok(copy);
        };

        let cache_key = (T::NAME.to_string(), key.as_i64());
        if !self.cache.contains_key(&cache_key) && self.load_row(T::NAME, key.as_i64())?.is_none() {
            // The row vanished; the detached copy becomes a new entity.
            let mut copy = entity.clone();
            let new_key = match descriptor.key_strategy {
                KeyStrategy::Auto => {
                    EntityKey::new(factory.backend().next_key(&descriptor.table)?)
                }
                KeyStrategy::Assigned => key,
            };
            copy.set_key(new_key);
            let row = copy.to_row()?;
            self.cache.insert(
                (T::NAME.to_string(), new_key.as_i64()),
                ManagedEntity::new_entry(row),
            );
            self.insert_log.push((T::NAME.to_string(), new_key.as_i64()));
            return Ok(copy);
        }

        let row = entity.to_row()?;
        let entry = self
            .cache
            .get_mut(&cache_key)
            .ok_or_else(|| CoreError::not_found(T::NAME))?;
        if entry.status == Status::Removed {
            return Err(CoreError::illegal_state(format!(
                "cannot merge removed {} {key}",
                T::NAME
            )));
        }
        entry.row = row;
        if entry.status == Status::Managed {
            entry.dirty = true;
        }
        Ok(entity.clone())
    }

    /// Schedules a managed entity for deletion.
    ///
    /// The entity must be managed; removing a detached instance is an
    /// error. Remove cascades depth first across associations that allow
    /// it: dependent rows carrying the foreign key are deleted before
    /// this row, owned to-one targets after it. The deletes are staged
    /// at flush time.
    pub fn remove<T: Entity>(&mut self, entity: &T) -> CoreResult<()> {
        self.check_open()?;
        if self.txn.is_none() {
            return Err(CoreError::TransactionRequired);
        }
        let key = entity.key().ok_or_else(|| {
            CoreError::illegal_state(format!("cannot remove transient {}", T::NAME))
        })?;
        let cache_key = (T::NAME.to_string(), key.as_i64());
        match self.cache.get(&cache_key).map(|e| e.status) {
            None => Err(CoreError::illegal_state(format!(
                "cannot remove detached {} {key}; load or merge it first",
                T::NAME
            ))),
            Some(Status::Removed) => Ok(()),
            Some(Status::New) => {
                // Persisted and removed in the same unit of work: nothing
                // ever reaches the store.
                self.cache.remove(&cache_key);
                self.insert_log
                    .retain(|(n, k)| !(n == T::NAME && *k == key.as_i64()));
                Ok(())
            }
            Some(Status::Managed) => self.remove_by_key(T::NAME, key.as_i64()),
        }
    }

    /// Reloads an entity's state from the store, discarding pending
    /// changes to it. Fails with [`CoreError::NotFound`] if the row is
    /// gone. Refresh cascades into already-loaded targets of
    /// associations that allow it.
    pub fn refresh<T: Entity>(&mut self, entity: &mut T) -> CoreResult<()> {
        self.check_open()?;
        let key = entity.key().ok_or_else(|| {
            CoreError::illegal_state(format!("cannot refresh transient {}", T::NAME))
        })?;
        let mut visited = HashSet::new();
        self.refresh_row(T::NAME, key.as_i64(), &mut visited)?;
        let entry = self
            .cache
            .get(&(T::NAME.to_string(), key.as_i64()))
            .ok_or_else(|| CoreError::not_found(T::NAME))?;
        *entity = T::from_row(key, &entry.row)?;
        Ok(())
    }

    /// Records the entity's current state as a pending update.
    ///
    /// Snapshots are not diffed automatically; this is how a modified
    /// entity reaches the store. The entity must be managed.
    pub fn update<T: Entity>(&mut self, entity: &T) -> CoreResult<()> {
        self.check_open()?;
        if self.txn.is_none() {
            return Err(CoreError::TransactionRequired);
        }
        let key = entity.key().ok_or_else(|| {
            CoreError::illegal_state(format!("cannot update transient {}", T::NAME))
        })?;
        let row = entity.to_row()?;
        match self
            .cache
            .get_mut(&(T::NAME.to_string(), key.as_i64()))
        {
            Some(entry) if entry.status == Status::Removed => Err(CoreError::illegal_state(
                format!("cannot update removed {} {key}", T::NAME),
            )),
            Some(entry) => {
                entry.row = row;
                entry.dirty = true;
                Ok(())
            }
            None => Err(CoreError::illegal_state(format!(
                "{} {key} is not managed; merge it first",
                T::NAME
            ))),
        }
    }

    /// Stages every pending change into the store transaction, in
    /// operation order: inserts, then dirty updates, then deletes.
    ///
    /// Constraint violations surface here (or at the bulk statement that
    /// staged a write), not at `persist`/`update`/`remove`. Versioned
    /// entities get their stale check here: if the stored version no
    /// longer matches the loaded one, the flush fails with
    /// [`CoreError::StaleState`].
    pub fn flush(&mut self) -> CoreResult<()> {
        self.check_open()?;
        if self.txn.is_none() {
            return Err(CoreError::TransactionRequired);
        }
        let factory = self.factory;
        let backend = factory.backend();
        let mut inserted = 0usize;
        let mut updated = 0usize;
        let mut deleted = 0usize;

        // Inserts, in persist order, so foreign keys staged by cascades
        // land before the rows that reference them.
        let inserts = std::mem::take(&mut self.insert_log);
        for (name, key) in inserts {
            let descriptor = factory.registry().entity(&name)?;
            let Some(entry) = self.cache.get_mut(&(name.clone(), key)) else {
                continue;
            };
            if entry.status != Status::New {
                continue;
            }
            if let Some(vc) = &descriptor.version_column {
                entry.row.set(vc.clone(), Value::Integer(1));
                entry.loaded_version = Some(1);
            }
            let row = entry.row.clone();
            entry.status = Status::Managed;
            entry.dirty = false;
            let snapshot = descriptor.cacheable.then(|| entry.row.clone());
            let txn = self.txn.as_mut().ok_or(CoreError::TransactionRequired)?;
            backend.insert(txn, &descriptor.table, key, row)?;
            inserted += 1;
            self.touched.insert(name.clone());
            if let Some(snap) = snapshot {
                self.pending_l2.push((name, key, Some(snap)));
            }
        }

        // Dirty updates, in key order for determinism.
        let mut dirty: Vec<(String, i64)> = self
            .cache
            .iter()
            .filter(|(_, e)| e.status == Status::Managed && e.dirty)
            .map(|(k, _)| k.clone())
            .collect();
        dirty.sort();
        for (name, key) in dirty {
            let descriptor = factory.registry().entity(&name)?;
            let txn = self.txn.as_ref().ok_or(CoreError::TransactionRequired)?;
            let current = backend
                .get_in_txn(txn, &descriptor.table, key)?
                .ok_or_else(|| CoreError::StaleState {
                    entity: name.clone(),
                    key,
                })?;
            let Some(entry) = self.cache.get_mut(&(name.clone(), key)) else {
                continue;
            };
            if let Some(vc) = &descriptor.version_column {
                let stored = current.get_or_null(vc).as_integer().unwrap_or(0);
                let loaded = entry.loaded_version.unwrap_or(stored);
                if stored != loaded {
                    return Err(CoreError::StaleState {
                        entity: name.clone(),
                        key,
                    });
                }
                entry.row.set(vc.clone(), Value::Integer(stored + 1));
                entry.loaded_version = Some(stored + 1);
            }
            let row = entry.row.clone();
            entry.dirty = false;
            let snapshot = descriptor.cacheable.then(|| entry.row.clone());
            let txn = self.txn.as_mut().ok_or(CoreError::TransactionRequired)?;
            backend.update(txn, &descriptor.table, key, row)?;
            updated += 1;
            self.touched.insert(name.clone());
            if let Some(snap) = snapshot {
                self.pending_l2.push((name, key, Some(snap)));
            }
        }

        // Deletes, in removal order: cascade-dependent rows first.
        let removals = std::mem::take(&mut self.removal_log);
        for (name, key) in removals {
            let descriptor = factory.registry().entity(&name)?;
            self.stage_unlink_everywhere(&name, key)?;
            let txn = self.txn.as_mut().ok_or(CoreError::TransactionRequired)?;
            backend.delete(txn, &descriptor.table, key)?;
            deleted += 1;
            self.touched.insert(name.clone());
            if descriptor.cacheable {
                self.pending_l2.push((name, key, None));
            }
        }

        if inserted + updated + deleted > 0 {
            tracing::debug!(inserted, updated, deleted, "flushed");
        }
        Ok(())
    }

    /// Creates a query over this session.
    #[must_use]
    pub fn query(&mut self, text: impl Into<String>) -> Query<'_, 'f> {
        Query::new(self, text.into(), false)
    }

    /// Creates a query whose entity and field names are table and column
    /// names.
    #[must_use]
    pub fn native_query(&mut self, text: impl Into<String>) -> Query<'_, 'f> {
        Query::new(self, text.into(), true)
    }

    /// Creates a query from a name registered in the schema.
    pub fn named_query(&mut self, name: &str) -> CoreResult<Query<'_, 'f>> {
        let text = self
            .factory
            .registry()
            .named_query(name)
            .ok_or_else(|| CoreError::UnknownQuery {
                name: name.to_string(),
            })?
            .to_string();
        Ok(Query::new(self, text, false))
    }

    /// Navigates an association of `O` from `owner`, loading the targets
    /// through this session.
    ///
    /// Works for every association kind; to-one kinds yield zero or one
    /// element. The target type must match the mapping.
    pub fn related<O: Entity, T: Entity>(
        &mut self,
        owner: EntityKey,
        association: &str,
    ) -> CoreResult<Vec<T>> {
        self.check_open()?;
        let descriptor = self.descriptor(O::NAME)?;
        let assoc = descriptor.association_named(association).ok_or_else(|| {
            CoreError::UnknownField {
                entity: O::NAME.to_string(),
                field: association.to_string(),
            }
        })?;
        if assoc.target != T::NAME {
            return Err(CoreError::illegal_state(format!(
                "association {}.{} targets {}, not {}",
                O::NAME,
                association,
                assoc.target,
                T::NAME
            )));
        }
        let keys: Vec<i64> = match assoc.kind {
            AssociationKind::OneToMany => self.child_keys(descriptor, assoc, owner.as_i64())?,
            AssociationKind::ManyToMany => self.linked_keys(descriptor, assoc, owner.as_i64())?,
            AssociationKind::OneToOne if !assoc.is_owning() => self
                .mapped_one_key(assoc, owner.as_i64())?
                .into_iter()
                .collect(),
            AssociationKind::OneToOne | AssociationKind::ManyToOne => {
                let row = self
                    .load_row(O::NAME, owner.as_i64())?
                    .ok_or_else(|| CoreError::not_found(O::NAME))?;
                assoc
                    .join_column
                    .as_deref()
                    .and_then(|c| row.get_or_null(c).as_integer())
                    .into_iter()
                    .collect()
            }
        };
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(target) = self.find::<T>(EntityKey::new(key))? {
                out.push(target);
            }
        }
        Ok(out)
    }

    /// Stages a many-to-many link between `owner` and `target`.
    ///
    /// Accepts either side of the association; linking an existing pair
    /// is a no-op.
    pub fn link<O: Entity>(
        &mut self,
        owner: EntityKey,
        association: &str,
        target: EntityKey,
    ) -> CoreResult<()> {
        self.check_open()?;
        let (table, owner_key, target_key) =
            self.join_orientation::<O>(association, owner, target)?;
        let backend = self.backend();
        let txn = self.txn.as_mut().ok_or(CoreError::TransactionRequired)?;
        backend.link(txn, &table, owner_key, target_key)?;
        Ok(())
    }

    /// Stages removal of a many-to-many link. Returns whether it
    /// existed.
    pub fn unlink<O: Entity>(
        &mut self,
        owner: EntityKey,
        association: &str,
        target: EntityKey,
    ) -> CoreResult<bool> {
        self.check_open()?;
        let (table, owner_key, target_key) =
            self.join_orientation::<O>(association, owner, target)?;
        let backend = self.backend();
        let txn = self.txn.as_mut().ok_or(CoreError::TransactionRequired)?;
        backend.unlink(txn, &table, owner_key, target_key)
            .map_err(CoreError::from)
    }

    // ---- internals ----------------------------------------------------

    fn check_open(&self) -> CoreResult<()> {
        if self.closed {
            Err(CoreError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn backend(&self) -> &'f dyn relmap_store::StoreBackend {
        self.factory.backend()
    }

    fn descriptor(&self, name: &str) -> CoreResult<&'f EntityDescriptor> {
        let factory = self.factory;
        Ok(factory.registry().entity(name)?)
    }

    /// Loads one row through the identity map, the second-level cache,
    /// and the store, in that order, registering it as managed.
    fn load_row(&mut self, name: &str, key: i64) -> CoreResult<Option<Row>> {
        if let Some(entry) = self.cache.get(&(name.to_string(), key)) {
            return Ok(match entry.status {
                Status::Removed => None,
                Status::New | Status::Managed => Some(entry.row.clone()),
            });
        }
        let factory = self.factory;
        let descriptor = self.descriptor(name)?;
        let backend = self.backend();

        // Only committed state may pass through the second-level cache.
        let staged = self
            .txn
            .as_ref()
            .and_then(|t| t.staged_row(&descriptor.table, key))
            .is_some();
        let l2_usable =
            descriptor.cacheable && factory.config().second_level_cache && !staged;
        let mut from_l2 = false;
        let row = if l2_usable {
            let hit = factory.cache().get(name, key);
            from_l2 = hit.is_some();
            hit
        } else {
            None
        };
        let row = match row {
            Some(row) => Some(row),
            None => match &self.txn {
                Some(txn) => backend.get_in_txn(txn, &descriptor.table, key)?,
                None => backend.get(&descriptor.table, key)?,
            },
        };
        let Some(row) = row else {
            return Ok(None);
        };
        if l2_usable && !from_l2 {
            factory.cache().put(name, key, row.clone());
        }

        let loaded_version = descriptor
            .version_column
            .as_deref()
            .and_then(|vc| row.get_or_null(vc).as_integer());
        self.cache.insert(
            (name.to_string(), key),
            ManagedEntity::loaded(row.clone(), loaded_version),
        );

        // Registered before eager targets are pulled in, so reference
        // cycles terminate.
        self.load_eager(descriptor, key, &row)?;
        Ok(Some(row))
    }

    fn load_eager(
        &mut self,
        descriptor: &'f EntityDescriptor,
        key: i64,
        row: &Row,
    ) -> CoreResult<()> {
        for assoc in &descriptor.associations {
            if assoc.fetch != FetchPolicy::Eager {
                continue;
            }
            match assoc.kind {
                AssociationKind::ManyToOne | AssociationKind::OneToOne
                    if assoc.is_owning() =>
                {
                    if let Some(fk) = assoc
                        .join_column
                        .as_deref()
                        .and_then(|c| row.get_or_null(c).as_integer())
                    {
                        self.load_row(&assoc.target, fk)?;
                    }
                }
                AssociationKind::OneToOne => {
                    if let Some(target) = self.mapped_one_key(assoc, key)? {
                        self.load_row(&assoc.target, target)?;
                    }
                }
                AssociationKind::OneToMany => {
                    for child in self.child_keys(descriptor, assoc, key)? {
                        self.load_row(&assoc.target, child)?;
                    }
                }
                AssociationKind::ManyToMany => {
                    for target in self.linked_keys(descriptor, assoc, key)? {
                        self.load_row(&assoc.target, target)?;
                    }
                }
                AssociationKind::ManyToOne => {}
            }
        }
        Ok(())
    }

    fn refresh_row(
        &mut self,
        name: &str,
        key: i64,
        visited: &mut HashSet<(String, i64)>,
    ) -> CoreResult<()> {
        if !visited.insert((name.to_string(), key)) {
            return Ok(());
        }
        let descriptor = self.descriptor(name)?;
        let backend = self.backend();
        let row = match &self.txn {
            Some(txn) => backend.get_in_txn(txn, &descriptor.table, key)?,
            None => backend.get(&descriptor.table, key)?,
        }
        .ok_or_else(|| CoreError::not_found(name))?;
        let loaded_version = descriptor
            .version_column
            .as_deref()
            .and_then(|vc| row.get_or_null(vc).as_integer());
        self.cache.insert(
            (name.to_string(), key),
            ManagedEntity::loaded(row.clone(), loaded_version),
        );

        for assoc in &descriptor.associations {
            if !assoc.cascades(Cascade::Refresh) {
                continue;
            }
            let targets: Vec<i64> = match assoc.kind {
                AssociationKind::ManyToOne | AssociationKind::OneToOne
                    if assoc.is_owning() =>
                {
                    assoc
                        .join_column
                        .as_deref()
                        .and_then(|c| row.get_or_null(c).as_integer())
                        .into_iter()
                        .collect()
                }
                AssociationKind::OneToOne => {
                    self.mapped_one_key(assoc, key)?.into_iter().collect()
                }
                AssociationKind::OneToMany => self.child_keys(descriptor, assoc, key)?,
                AssociationKind::ManyToMany => self.linked_keys(descriptor, assoc, key)?,
                AssociationKind::ManyToOne => Vec::new(),
            };
            for target in targets {
                // Refresh reaches only what the session already holds.
                if self.cache.contains_key(&(assoc.target.clone(), target)) {
                    self.refresh_row(&assoc.target, target, visited)?;
                }
            }
        }
        Ok(())
    }

    /// Recursive untyped removal; dependents referencing the row are
    /// scheduled before it, owned to-one targets after it.
    fn remove_by_key(&mut self, name: &str, key: i64) -> CoreResult<()> {
        if matches!(
            self.cache.get(&(name.to_string(), key)).map(|e| e.status),
            Some(Status::Removed)
        ) {
            return Ok(());
        }
        let descriptor = self.descriptor(name)?;
        let Some(row) = self.load_row(name, key)? else {
            return Ok(());
        };

        // Mark first so cascade cycles terminate.
        if let Some(entry) = self.cache.get_mut(&(name.to_string(), key)) {
            entry.status = Status::Removed;
            entry.dirty = false;
        }

        for assoc in &descriptor.associations {
            if !assoc.cascades(Cascade::Remove) {
                continue;
            }
            match assoc.kind {
                AssociationKind::OneToMany => {
                    for child in self.child_keys(descriptor, assoc, key)? {
                        self.remove_by_key(&assoc.target, child)?;
                    }
                }
                AssociationKind::OneToOne if !assoc.is_owning() => {
                    if let Some(target) = self.mapped_one_key(assoc, key)? {
                        self.remove_by_key(&assoc.target, target)?;
                    }
                }
                _ => {}
            }
        }

        self.removal_log.push((name.to_string(), key));

        for assoc in &descriptor.associations {
            if !assoc.cascades(Cascade::Remove) || !assoc.is_to_one() || !assoc.is_owning() {
                continue;
            }
            if let Some(target) = assoc
                .join_column
                .as_deref()
                .and_then(|c| row.get_or_null(c).as_integer())
            {
                self.remove_by_key(&assoc.target, target)?;
            }
        }
        Ok(())
    }

    /// Keys of the rows on the many side of a one-to-many association.
    fn child_keys(
        &self,
        owner: &EntityDescriptor,
        assoc: &Association,
        key: i64,
    ) -> CoreResult<Vec<i64>> {
        let target = self.descriptor(&assoc.target)?;
        let mapped_by = assoc.mapped_by.as_deref().ok_or_else(|| {
            CoreError::illegal_state(format!(
                "one-to-many {}.{} has no owning side",
                owner.name, assoc.name
            ))
        })?;
        let fk_column = target
            .association_named(mapped_by)
            .and_then(|a| a.join_column.as_deref())
            .ok_or_else(|| {
                CoreError::illegal_state(format!(
                    "{}.{mapped_by} does not own a join column",
                    target.name
                ))
            })?;
        let rows = self.scan_rows(&target.table)?;
        Ok(rows
            .into_iter()
            .filter(|(_, r)| r.get_or_null(fk_column) == Value::Integer(key))
            .map(|(k, _)| k)
            .collect())
    }

    /// Key of the owning row of a non-owning one-to-one association.
    fn mapped_one_key(&self, assoc: &Association, key: i64) -> CoreResult<Option<i64>> {
        let target = self.descriptor(&assoc.target)?;
        let mapped_by = assoc.mapped_by.as_deref().ok_or_else(|| {
            CoreError::illegal_state(format!("{} is not a mapped association", assoc.name))
        })?;
        let fk_column = target
            .association_named(mapped_by)
            .and_then(|a| a.join_column.as_deref())
            .ok_or_else(|| {
                CoreError::illegal_state(format!(
                    "{}.{mapped_by} does not own a join column",
                    target.name
                ))
            })?;
        let rows = self.scan_rows(&target.table)?;
        Ok(rows
            .into_iter()
            .find(|(_, r)| r.get_or_null(fk_column) == Value::Integer(key))
            .map(|(k, _)| k))
    }

    /// Keys linked to `key` through a many-to-many association, viewed
    /// from either side.
    fn linked_keys(
        &self,
        owner: &EntityDescriptor,
        assoc: &Association,
        key: i64,
    ) -> CoreResult<Vec<i64>> {
        let backend = self.backend();
        let (table, side) = self.join_side(owner, assoc)?;
        match &self.txn {
            Some(txn) => Ok(backend.links_in_txn(txn, &table, side, key)?),
            None => Ok(backend.links(&table, side, key)?),
        }
    }

    /// Resolves the join table and the side `owner` occupies in it.
    fn join_side(
        &self,
        owner: &EntityDescriptor,
        assoc: &Association,
    ) -> CoreResult<(String, JoinSide)> {
        if let Some(jt) = &assoc.join_table {
            return Ok((jt.table.clone(), JoinSide::Owner));
        }
        let mapped_by = assoc.mapped_by.as_deref().ok_or_else(|| {
            CoreError::illegal_state(format!(
                "many-to-many {}.{} has neither join table nor mapped_by",
                owner.name, assoc.name
            ))
        })?;
        let target = self.descriptor(&assoc.target)?;
        let jt = target
            .association_named(mapped_by)
            .and_then(|a| a.join_table.as_ref())
            .ok_or_else(|| {
                CoreError::illegal_state(format!(
                    "{}.{mapped_by} does not own a join table",
                    target.name
                ))
            })?;
        Ok((jt.table.clone(), JoinSide::Target))
    }

    /// Orients a (owner, target) pair of keys into the physical join
    /// table's column order.
    fn join_orientation<O: Entity>(
        &self,
        association: &str,
        owner: EntityKey,
        target: EntityKey,
    ) -> CoreResult<(String, i64, i64)> {
        let descriptor = self.descriptor(O::NAME)?;
        let assoc = descriptor.association_named(association).ok_or_else(|| {
            CoreError::UnknownField {
                entity: O::NAME.to_string(),
                field: association.to_string(),
            }
        })?;
        if assoc.kind != AssociationKind::ManyToMany {
            return Err(CoreError::illegal_state(format!(
                "{}.{association} is {}, not many-to-many",
                O::NAME,
                assoc.kind
            )));
        }
        let (table, side) = self.join_side(descriptor, assoc)?;
        Ok(match side {
            JoinSide::Owner => (table, owner.as_i64(), target.as_i64()),
            JoinSide::Target => (table, target.as_i64(), owner.as_i64()),
        })
    }

    /// Removes every join-table pair involving `key`, on both sides of
    /// every mapping. Precedes a row delete.
    fn stage_unlink_everywhere(&mut self, name: &str, key: i64) -> CoreResult<()> {
        let factory = self.factory;
        let backend = factory.backend();
        for other in factory.registry().entities() {
            for assoc in &other.associations {
                if assoc.kind != AssociationKind::ManyToMany {
                    continue;
                }
                let Some(jt) = &assoc.join_table else { continue };
                let txn = self.txn.as_mut().ok_or(CoreError::TransactionRequired)?;
                if other.name == name {
                    backend.unlink_all(txn, &jt.table, JoinSide::Owner, key)?;
                }
                if assoc.target == name {
                    backend.unlink_all(txn, &jt.table, JoinSide::Target, key)?;
                }
            }
        }
        Ok(())
    }

    // ---- hooks for the query layer ------------------------------------

    pub(crate) fn scan_rows(&self, table: &str) -> CoreResult<Vec<(i64, Row)>> {
        let backend = self.backend();
        match &self.txn {
            Some(txn) => Ok(backend.scan_in_txn(txn, table)?),
            None => Ok(backend.scan(table)?),
        }
    }

    /// Registers a query-produced row in the identity map. The managed
    /// snapshot wins over the scanned row; a removed entity yields
    /// nothing.
    pub(crate) fn absorb_row(
        &mut self,
        name: &str,
        key: i64,
        row: Row,
    ) -> CoreResult<Option<Row>> {
        if let Some(entry) = self.cache.get(&(name.to_string(), key)) {
            return Ok(match entry.status {
                Status::Removed => None,
                Status::New | Status::Managed => Some(entry.row.clone()),
            });
        }
        let descriptor = self.descriptor(name)?;
        let loaded_version = descriptor
            .version_column
            .as_deref()
            .and_then(|vc| row.get_or_null(vc).as_integer());
        self.cache.insert(
            (name.to_string(), key),
            ManagedEntity::loaded(row.clone(), loaded_version),
        );
        Ok(Some(row))
    }

    pub(crate) fn entity_touched(&self, name: &str) -> bool {
        self.touched.contains(name)
    }

    /// Detaches all snapshots of one entity and records the bulk write
    /// for commit-time cache invalidation.
    pub(crate) fn note_bulk_write(&mut self, name: &str) {
        self.cache.retain(|(n, _), _| n != name);
        self.insert_log.retain(|(n, _)| n != name);
        self.removal_log.retain(|(n, _)| n != name);
        self.touched.insert(name.to_string());
        self.bulk_entities.insert(name.to_string());
    }

    pub(crate) fn stage_bulk_update(
        &mut self,
        table: &str,
        key: i64,
        row: Row,
    ) -> CoreResult<()> {
        let backend = self.backend();
        let txn = self.txn.as_mut().ok_or(CoreError::TransactionRequired)?;
        backend.update(txn, table, key, row)?;
        Ok(())
    }

    pub(crate) fn stage_bulk_delete(&mut self, name: &str, key: i64) -> CoreResult<()> {
        let descriptor = self.descriptor(name)?;
        self.stage_unlink_everywhere(name, key)?;
        let backend = self.backend();
        let txn = self.txn.as_mut().ok_or(CoreError::TransactionRequired)?;
        backend.delete(txn, &descriptor.table, key)?;
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.txn.is_some() {
            tracing::debug!("session dropped with an open transaction; rolling back");
            self.txn = None;
        }
    }
}
