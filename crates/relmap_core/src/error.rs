//! Error types for relmap core operations.

use relmap_schema::SchemaError;
use relmap_store::StoreError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in sessions and queries.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Schema metadata error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Backing store error. The constraint-violation variants surface at
    /// flush or commit time, not at the call that caused them.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A single-result query matched no rows, or a refresh target is gone.
    #[error("no result for {entity}")]
    NotFound {
        /// The queried entity.
        entity: String,
    },

    /// A single-result query matched more than one row.
    #[error("non-unique result for {entity}: {count} rows")]
    NonUnique {
        /// The queried entity.
        entity: String,
        /// Number of rows matched.
        count: usize,
    },

    /// An optimistic-lock check failed: the row changed under the session.
    #[error("stale state: {entity} key {key} was modified concurrently")]
    StaleState {
        /// The entity name.
        entity: String,
        /// The conflicting key.
        key: i64,
    },

    /// A lifecycle operation was called in the wrong entity state.
    /// Programmer error; fails fast.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of the misuse.
        message: String,
    },

    /// A mutating operation requires an active transaction.
    #[error("no active transaction")]
    TransactionRequired,

    /// `begin` was called while a transaction was already active.
    #[error("a transaction is already active")]
    TransactionActive,

    /// The session was closed.
    #[error("session is closed")]
    SessionClosed,

    /// A named query was never registered.
    #[error("unknown named query: {name}")]
    UnknownQuery {
        /// The requested query name.
        name: String,
    },

    /// A query referenced a field the entity does not map.
    #[error("unknown field {field} on {entity}")]
    UnknownField {
        /// The entity name.
        entity: String,
        /// The unmapped field.
        field: String,
    },

    /// The query text could not be parsed.
    #[error("parse error at position {position}: {message}")]
    Parse {
        /// Description of the problem.
        message: String,
        /// Byte offset into the query text.
        position: usize,
    },

    /// A query parameter was never bound.
    #[error("unbound parameter {name}")]
    UnboundParameter {
        /// The parameter marker, e.g. `?2` or `:name`.
        name: String,
    },
}

impl CoreError {
    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }

    /// Creates an unbound parameter error.
    pub fn unbound_parameter(name: impl Into<String>) -> Self {
        Self::UnboundParameter { name: name.into() }
    }

    /// Returns true if this error wraps a store constraint violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_constraint_violation())
    }
}
