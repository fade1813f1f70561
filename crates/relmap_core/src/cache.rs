//! Second-level and query result caches.
//!
//! The second-level cache holds row snapshots of cacheable entities across
//! sessions; the query result cache holds the key/row sets of queries that
//! opted in via [`crate::QueryHint::Cacheable`]. Both live on the
//! [`crate::SessionFactory`] and are invalidated on commit by the tables a
//! transaction wrote.

use parking_lot::RwLock;
use relmap_schema::Value;
use relmap_store::Row;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of a cache's activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries stored.
    pub puts: u64,
}

/// Cross-session cache of row snapshots, keyed by (entity, key).
///
/// Only entities marked cacheable in the registry are ever stored here.
/// Sessions consult it before the store on `find`, and publish fresh
/// snapshots after a successful commit, never before.
#[derive(Debug, Default)]
pub struct SecondLevelCache {
    entries: RwLock<HashMap<(String, i64), Row>>,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
}

impl SecondLevelCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a row snapshot.
    #[must_use]
    pub fn get(&self, entity: &str, key: i64) -> Option<Row> {
        let found = self
            .entries
            .read()
            .get(&(entity.to_string(), key))
            .cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Stores a row snapshot.
    pub fn put(&self, entity: &str, key: i64, row: Row) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert((entity.to_string(), key), row);
    }

    /// Drops one entry.
    pub fn evict(&self, entity: &str, key: i64) {
        self.entries.write().remove(&(entity.to_string(), key));
    }

    /// Drops every entry of one entity.
    pub fn evict_entity(&self, entity: &str) {
        self.entries.write().retain(|(name, _), _| name != entity);
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns true if an entry is present, without touching the counters.
    #[must_use]
    pub fn contains(&self, entity: &str, key: i64) -> bool {
        self.entries.read().contains_key(&(entity.to_string(), key))
    }

    /// Number of cached snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a snapshot of the activity counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
        }
    }
}

/// Identity of one cached query execution.
///
/// Two executions share an entry only if the text, the native flag, and
/// every bound parameter match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct QueryCacheKey {
    pub(crate) text: String,
    pub(crate) native: bool,
    pub(crate) params: Vec<(String, Value)>,
}

/// Cached rows of hint-cacheable queries, grouped by entity for
/// invalidation.
#[derive(Debug)]
pub(crate) struct QueryResultCache {
    entries: RwLock<HashMap<QueryCacheKey, (String, Vec<(i64, Row)>)>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
}

impl QueryResultCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self, key: &QueryCacheKey) -> Option<Vec<(i64, Row)>> {
        let found = self.entries.read().get(key).map(|(_, rows)| rows.clone());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub(crate) fn put(&self, key: QueryCacheKey, entity: &str, rows: Vec<(i64, Row)>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write();
        // Coarse bound. Table writes invalidate entries far more often
        // than capacity is reached.
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.clear();
        }
        self.puts.fetch_add(1, Ordering::Relaxed);
        entries.insert(key, (entity.to_string(), rows));
    }

    /// Drops every cached result over one entity.
    pub(crate) fn invalidate_entity(&self, entity: &str) {
        self.entries.write().retain(|_, (name, _)| name != entity);
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
        }
    }
}
