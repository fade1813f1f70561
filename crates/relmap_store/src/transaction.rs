//! Write transactions.

use crate::row::Row;
use parking_lot::MutexGuard;
use std::collections::{BTreeSet, HashMap};

/// Staged state of one join table inside a transaction.
#[derive(Debug, Default, Clone)]
pub(crate) struct LinkOverlay {
    pub(crate) added: BTreeSet<(i64, i64)>,
    pub(crate) removed: BTreeSet<(i64, i64)>,
}

impl LinkOverlay {
    pub(crate) fn stage_link(&mut self, pair: (i64, i64)) {
        if !self.removed.remove(&pair) {
            self.added.insert(pair);
        }
    }

    /// Returns true if the pair was staged as added (and is now unstaged).
    pub(crate) fn stage_unlink(&mut self, pair: (i64, i64)) -> bool {
        if self.added.remove(&pair) {
            true
        } else {
            self.removed.insert(pair);
            false
        }
    }

    pub(crate) fn visible(&self, pair: (i64, i64), committed: bool) -> bool {
        if self.removed.contains(&pair) {
            return false;
        }
        committed || self.added.contains(&pair)
    }
}

/// A write transaction over a [`crate::StoreBackend`].
///
/// Holds the backend's exclusive writer lock for its whole lifetime, so
/// only one write transaction can exist at a time. Writes are staged here
/// and applied by `StoreBackend::commit`; dropping the transaction
/// releases the lock and discards everything staged.
#[derive(Debug)]
pub struct StoreTransaction<'a> {
    _guard: MutexGuard<'a, ()>,
    /// Staged row state: `Some(row)` for insert/update, `None` for delete.
    pub(crate) rows: HashMap<(String, i64), Option<Row>>,
    /// Staged join-table changes.
    pub(crate) links: HashMap<String, LinkOverlay>,
}

impl<'a> StoreTransaction<'a> {
    /// Creates a transaction wrapping the backend's writer guard.
    ///
    /// Called by backend implementations from `begin`; not useful on its
    /// own.
    #[must_use]
    pub fn new(guard: MutexGuard<'a, ()>) -> Self {
        Self {
            _guard: guard,
            rows: HashMap::new(),
            links: HashMap::new(),
        }
    }

    /// Returns the staged state of a row: `None` if untouched,
    /// `Some(None)` if staged for deletion, `Some(Some(row))` if staged
    /// for write.
    #[must_use]
    pub fn staged_row(&self, table: &str, key: i64) -> Option<Option<&Row>> {
        self.rows.get(&(table.to_string(), key)).map(Option::as_ref)
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.links.values().all(|o| o.added.is_empty() && o.removed.is_empty())
    }

    /// Number of staged row writes (inserts, updates, and deletes).
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn stage_row(&mut self, table: &str, key: i64, state: Option<Row>) {
        self.rows.insert((table.to_string(), key), state);
    }

    pub(crate) fn link_overlay(&mut self, table: &str) -> &mut LinkOverlay {
        self.links.entry(table.to_string()).or_default()
    }
}
