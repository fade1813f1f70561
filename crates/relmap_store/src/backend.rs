//! Store backend trait definition.

use crate::error::StoreResult;
use crate::row::Row;
use crate::transaction::StoreTransaction;
use relmap_schema::ColumnType;

/// Declares one column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub ty: ColumnType,
    /// Whether NULL is legal.
    pub nullable: bool,
    /// Whether a uniqueness constraint applies.
    pub unique: bool,
}

impl ColumnSpec {
    /// Creates a nullable, non-unique column.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            unique: false,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Adds a uniqueness constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Declares a foreign-key constraint on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySpec {
    /// The constrained column.
    pub column: String,
    /// The referenced table (its primary key).
    pub references: String,
}

impl ForeignKeySpec {
    /// Creates a foreign-key spec.
    pub fn new(column: impl Into<String>, references: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            references: references.into(),
        }
    }
}

/// Declares an entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Primary-key column (always integer).
    pub key_column: String,
    /// Non-key columns.
    pub columns: Vec<ColumnSpec>,
    /// Foreign-key constraints.
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl TableSpec {
    /// Creates a table spec with no columns.
    pub fn new(name: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_column: key_column.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a foreign-key constraint.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeySpec) -> Self {
        self.foreign_keys.push(fk);
        self
    }
}

/// Declares a many-to-many join table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTableSpec {
    /// Join table name.
    pub name: String,
    /// Column holding the owning side's key.
    pub owner_column: String,
    /// Table the owner column references.
    pub owner_references: String,
    /// Column holding the target side's key.
    pub target_column: String,
    /// Table the target column references.
    pub target_references: String,
}

/// Which column of a join table a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    /// The owning side's column.
    Owner,
    /// The target side's column.
    Target,
}

impl JoinSide {
    /// Returns the opposite side.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Owner => Self::Target,
            Self::Target => Self::Owner,
        }
    }
}

/// A row-level relational backing store.
///
/// Backends store typed rows keyed by integer primary keys, plus
/// (owner, target) pairs in join tables. All mutation goes through a
/// [`StoreTransaction`]: `begin` acquires an exclusive writer lock held
/// for the transaction's lifetime (only one write transaction at a time),
/// writes are staged and validated as they are staged, and `commit`
/// applies them atomically. Dropping a transaction discards its staged
/// writes.
///
/// # Invariants
///
/// - Constraint checks (key/unique/not-null/type/foreign-key) run when a
///   write is staged, against committed state overlaid with the
///   transaction's earlier staged writes.
/// - `get`/`scan` see the latest committed state; the `_in_txn` variants
///   additionally see the transaction's own staged writes.
/// - `next_key` values are never reused, and are not rolled back with the
///   transaction that consumed them.
pub trait StoreBackend: Send + Sync {
    /// Creates an entity table.
    fn create_table(&self, spec: &TableSpec) -> StoreResult<()>;

    /// Creates a join table.
    fn create_join_table(&self, spec: &JoinTableSpec) -> StoreResult<()>;

    /// Returns true if a table (entity or join) exists.
    fn has_table(&self, name: &str) -> bool;

    /// Begins a write transaction, blocking until the writer lock is free.
    fn begin(&self) -> StoreTransaction<'_>;

    /// Commits a transaction, applying its staged writes atomically.
    fn commit(&self, txn: StoreTransaction<'_>) -> StoreResult<()>;

    /// Stages an insert. Fails if the key already exists.
    fn insert(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        key: i64,
        row: Row,
    ) -> StoreResult<()>;

    /// Stages an update of an existing row.
    fn update(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        key: i64,
        row: Row,
    ) -> StoreResult<()>;

    /// Stages a delete. Fails if dangling references would remain.
    fn delete(&self, txn: &mut StoreTransaction<'_>, table: &str, key: i64) -> StoreResult<()>;

    /// Reads a committed row.
    fn get(&self, table: &str, key: i64) -> StoreResult<Option<Row>>;

    /// Reads a row as seen by the transaction (staged writes included).
    fn get_in_txn(
        &self,
        txn: &StoreTransaction<'_>,
        table: &str,
        key: i64,
    ) -> StoreResult<Option<Row>>;

    /// Scans all committed rows of a table, in key order.
    fn scan(&self, table: &str) -> StoreResult<Vec<(i64, Row)>>;

    /// Scans a table as seen by the transaction.
    fn scan_in_txn(
        &self,
        txn: &StoreTransaction<'_>,
        table: &str,
    ) -> StoreResult<Vec<(i64, Row)>>;

    /// Returns the next value of the table's key sequence.
    fn next_key(&self, table: &str) -> StoreResult<i64>;

    /// Stages a join-table link. Linking an existing pair is a no-op.
    fn link(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        owner: i64,
        target: i64,
    ) -> StoreResult<()>;

    /// Stages removal of a join-table link. Returns whether it existed.
    fn unlink(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        owner: i64,
        target: i64,
    ) -> StoreResult<bool>;

    /// Stages removal of every link involving `key` on `side`.
    /// Returns the number of links removed.
    fn unlink_all(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        side: JoinSide,
        key: i64,
    ) -> StoreResult<usize>;

    /// Returns the keys on the opposite side linked to `key`, committed
    /// state only, in ascending order.
    fn links(&self, table: &str, side: JoinSide, key: i64) -> StoreResult<Vec<i64>>;

    /// Returns linked keys as seen by the transaction.
    fn links_in_txn(
        &self,
        txn: &StoreTransaction<'_>,
        table: &str,
        side: JoinSide,
        key: i64,
    ) -> StoreResult<Vec<i64>>;
}
