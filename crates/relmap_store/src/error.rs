//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the backing store.
///
/// The constraint variants (`DuplicateKey`, `UniqueViolation`, `NotNull`,
/// `ForeignKey`) surface when a write is staged into a transaction, which
/// is session flush/commit time, never at the original mutating call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A table was created twice.
    #[error("table already exists: {table}")]
    TableExists {
        /// The table name.
        table: String,
    },

    /// An operation referenced a table that was never created.
    #[error("unknown table: {table}")]
    UnknownTable {
        /// The table name.
        table: String,
    },

    /// An insert reused an existing primary key.
    #[error("duplicate key {key} in table {table}")]
    DuplicateKey {
        /// The table name.
        table: String,
        /// The offending key.
        key: i64,
    },

    /// A write violated a uniqueness constraint.
    #[error("unique constraint violated on {table}.{column}")]
    UniqueViolation {
        /// The table name.
        table: String,
        /// The constrained column.
        column: String,
    },

    /// A write stored NULL in a NOT NULL column.
    #[error("not-null constraint violated on {table}.{column}")]
    NotNull {
        /// The table name.
        table: String,
        /// The constrained column.
        column: String,
    },

    /// A write stored a value of the wrong type.
    #[error("type mismatch on {table}.{column}: expected {expected}")]
    TypeMismatch {
        /// The table name.
        table: String,
        /// The column name.
        column: String,
        /// The declared column type.
        expected: String,
    },

    /// A foreign-key constraint failed: either the referenced row does not
    /// exist, or a delete left dangling references behind.
    #[error("foreign-key constraint violated on {table}.{column} (key {key})")]
    ForeignKey {
        /// The table holding the foreign key.
        table: String,
        /// The foreign-key column.
        column: String,
        /// The referenced key.
        key: i64,
    },

    /// An update or delete targeted a row that does not exist.
    #[error("row {key} not found in table {table}")]
    RowNotFound {
        /// The table name.
        table: String,
        /// The missing key.
        key: i64,
    },

    /// A write used a column the table does not declare.
    #[error("unknown column {column} in table {table}")]
    UnknownColumn {
        /// The table name.
        table: String,
        /// The undeclared column.
        column: String,
    },
}

impl StoreError {
    /// Creates an unknown table error.
    pub fn unknown_table(table: impl Into<String>) -> Self {
        Self::UnknownTable {
            table: table.into(),
        }
    }

    /// Returns true for the constraint-violation variants.
    #[must_use]
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateKey { .. }
                | Self::UniqueViolation { .. }
                | Self::NotNull { .. }
                | Self::ForeignKey { .. }
        )
    }
}
