//! First-level cache entries.

use relmap_store::Row;

/// Lifecycle status of a managed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// Persisted in this session, not yet flushed as an insert.
    New,
    /// Loaded from (or flushed to) the store.
    Managed,
    /// Scheduled for deletion; `find` no longer sees it.
    Removed,
}

/// One entry of the session's identity map: the row snapshot plus its
/// lifecycle bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct ManagedEntity {
    pub(crate) row: Row,
    pub(crate) status: Status,
    /// Set by `update` and `merge`; cleared when the change is flushed.
    pub(crate) dirty: bool,
    /// Version column value observed at load, for the stale check.
    pub(crate) loaded_version: Option<i64>,
}

impl ManagedEntity {
    pub(crate) fn new_entry(row: Row) -> Self {
        Self {
            row,
            status: Status::New,
            dirty: false,
            loaded_version: None,
        }
    }

    pub(crate) fn loaded(row: Row, loaded_version: Option<i64>) -> Self {
        Self {
            row,
            status: Status::Managed,
            dirty: false,
            loaded_version,
        }
    }
}
