//! Session factory: registry, backend, and shared caches.

use crate::cache::{CacheStats, QueryCacheKey, QueryResultCache, SecondLevelCache};
use crate::config::{Config, SchemaPolicy};
use crate::error::{CoreError, CoreResult};
use crate::query::ast::Statement;
use crate::query::parser;
use crate::session::Session;
use parking_lot::RwLock;
use relmap_schema::{AssociationKind, SchemaRegistry};
use relmap_store::{
    ColumnSpec, ForeignKeySpec, JoinTableSpec, Row, StoreBackend, StoreError, TableSpec,
};
use std::collections::HashMap;
use std::sync::Arc;

/// The shared, thread-safe root of a mapping: one schema registry, one
/// backing store, and the caches sessions coordinate through.
///
/// Build one factory at startup and open short-lived [`Session`]s from
/// it. Construction applies the configured schema policy against the
/// store.
pub struct SessionFactory {
    registry: SchemaRegistry,
    backend: Arc<dyn StoreBackend>,
    config: Config,
    second_level: SecondLevelCache,
    plan_cache: RwLock<HashMap<(String, bool), Arc<Statement>>>,
    query_cache: QueryResultCache,
}

impl SessionFactory {
    /// Creates a factory over a registry and a backing store.
    ///
    /// Under [`SchemaPolicy::CreateIfMissing`] every mapped table and
    /// join table that the store lacks is created; under
    /// [`SchemaPolicy::Validate`] a missing table is an error; under
    /// [`SchemaPolicy::None`] the store is taken as is.
    pub fn new(
        registry: SchemaRegistry,
        backend: Arc<dyn StoreBackend>,
        config: Config,
    ) -> CoreResult<Self> {
        let query_cache = QueryResultCache::new(config.query_cache_capacity);
        let factory = Self {
            registry,
            backend,
            config,
            second_level: SecondLevelCache::new(),
            plan_cache: RwLock::new(HashMap::new()),
            query_cache,
        };
        factory.apply_schema_policy()?;
        Ok(factory)
    }

    /// Creates a factory with the default configuration.
    pub fn with_defaults(
        registry: SchemaRegistry,
        backend: Arc<dyn StoreBackend>,
    ) -> CoreResult<Self> {
        Self::new(registry, backend, Config::default())
    }

    /// Opens a session. Sessions are cheap; open one per unit of work.
    #[must_use]
    pub fn open_session(&self) -> Session<'_> {
        Session::new(self)
    }

    /// Returns the schema registry.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Returns the backing store.
    #[must_use]
    pub fn backend(&self) -> &dyn StoreBackend {
        self.backend.as_ref()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the second-level cache.
    #[must_use]
    pub fn cache(&self) -> &SecondLevelCache {
        &self.second_level
    }

    /// Drops one entity snapshot from the second-level cache.
    pub fn evict(&self, entity: &str, key: i64) {
        self.second_level.evict(entity, key);
    }

    /// Drops a whole entity region from the second-level cache and every
    /// cached query result over it.
    pub fn evict_entity(&self, entity: &str) {
        self.second_level.evict_entity(entity);
        self.query_cache.invalidate_entity(entity);
    }

    /// Drops both caches entirely.
    pub fn evict_all(&self) {
        self.second_level.clear();
        self.query_cache.clear();
    }

    /// Returns the query result cache's activity counters.
    #[must_use]
    pub fn query_cache_stats(&self) -> CacheStats {
        self.query_cache.stats()
    }

    /// Number of distinct query texts parsed so far.
    #[must_use]
    pub fn plan_cache_len(&self) -> usize {
        self.plan_cache.read().len()
    }

    pub(crate) fn plan(&self, text: &str, native: bool) -> CoreResult<Arc<Statement>> {
        let cache_key = (text.to_string(), native);
        if let Some(plan) = self.plan_cache.read().get(&cache_key) {
            return Ok(plan.clone());
        }
        let statement = Arc::new(parser::parse(text)?);
        Ok(self
            .plan_cache
            .write()
            .entry(cache_key)
            .or_insert(statement)
            .clone())
    }

    pub(crate) fn cached_query(&self, key: &QueryCacheKey) -> Option<Vec<(i64, Row)>> {
        if self.config.query_cache_capacity == 0 {
            return None;
        }
        self.query_cache.get(key)
    }

    pub(crate) fn store_query(&self, key: QueryCacheKey, entity: &str, rows: Vec<(i64, Row)>) {
        self.query_cache.put(key, entity, rows);
    }

    pub(crate) fn invalidate_query_results(&self, entity: &str) {
        self.query_cache.invalidate_entity(entity);
    }

    fn apply_schema_policy(&self) -> CoreResult<()> {
        match self.config.schema_policy {
            SchemaPolicy::None => Ok(()),
            SchemaPolicy::Validate => {
                for descriptor in self.registry.entities() {
                    if !self.backend.has_table(&descriptor.table) {
                        return Err(CoreError::Store(StoreError::unknown_table(
                            descriptor.table.as_str(),
                        )));
                    }
                    for assoc in &descriptor.associations {
                        if let Some(jt) = &assoc.join_table {
                            if !self.backend.has_table(&jt.table) {
                                return Err(CoreError::Store(StoreError::unknown_table(
                                    jt.table.as_str(),
                                )));
                            }
                        }
                    }
                }
                Ok(())
            }
            SchemaPolicy::CreateIfMissing => self.create_missing_tables(),
        }
    }

    fn create_missing_tables(&self) -> CoreResult<()> {
        // Entity tables first; join tables reference them.
        for descriptor in self.registry.entities() {
            if self.backend.has_table(&descriptor.table) {
                continue;
            }
            let mut spec =
                TableSpec::new(descriptor.table.as_str(), descriptor.key_column.as_str());
            for column in &descriptor.columns {
                let mut col = ColumnSpec::new(column.column.as_str(), column.ty);
                if !column.nullable {
                    col = col.not_null();
                }
                if column.unique {
                    col = col.unique();
                }
                spec = spec.column(col);
            }
            if let Some(vc) = &descriptor.version_column {
                spec = spec
                    .column(ColumnSpec::new(vc.as_str(), relmap_schema::ColumnType::Integer));
            }
            for assoc in &descriptor.associations {
                let Some(join_column) = &assoc.join_column else {
                    continue;
                };
                let mut col =
                    ColumnSpec::new(join_column.as_str(), relmap_schema::ColumnType::Integer);
                if assoc.kind == AssociationKind::OneToOne {
                    col = col.unique();
                }
                spec = spec.column(col);
                let target = self.registry.entity(&assoc.target)?;
                spec = spec.foreign_key(ForeignKeySpec::new(
                    join_column.as_str(),
                    target.table.as_str(),
                ));
            }
            tracing::debug!(table = %descriptor.table, "creating table");
            self.backend.create_table(&spec)?;
        }

        for descriptor in self.registry.entities() {
            for assoc in &descriptor.associations {
                let Some(jt) = &assoc.join_table else { continue };
                if self.backend.has_table(&jt.table) {
                    continue;
                }
                let target = self.registry.entity(&assoc.target)?;
                tracing::debug!(table = %jt.table, "creating join table");
                self.backend.create_join_table(&JoinTableSpec {
                    name: jt.table.clone(),
                    owner_column: jt.owner_column.clone(),
                    owner_references: descriptor.table.clone(),
                    target_column: jt.target_column.clone(),
                    target_references: target.table.clone(),
                })?;
            }
        }
        Ok(())
    }
}
