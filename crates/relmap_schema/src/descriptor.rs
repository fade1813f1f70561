//! Entity descriptors.

use crate::association::Association;
use crate::column::ColumnDef;
use crate::value::ColumnType;

/// How primary keys are produced for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyStrategy {
    /// The application sets the key before persist.
    Assigned,
    /// The backend assigns the next value of a per-table sequence.
    #[default]
    Auto,
}

/// Static mapping from one entity type to one table.
///
/// Descriptors are immutable once the registry is built. They carry
/// everything the session and query executor need: the key mapping,
/// scalar columns, associations, the optional version column used for
/// optimistic locking, and whether the entity participates in the
/// second-level cache.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Entity name used in queries and the registry.
    pub name: String,
    /// Backing table name.
    pub table: String,
    /// Field holding the primary key.
    pub key_field: String,
    /// Column holding the primary key.
    pub key_column: String,
    /// Key generation strategy.
    pub key_strategy: KeyStrategy,
    /// Scalar column mappings, in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Association mappings, in declaration order.
    pub associations: Vec<Association>,
    /// Version column for optimistic locking, if enabled.
    pub version_column: Option<String>,
    /// Whether rows of this entity may live in the second-level cache.
    pub cacheable: bool,
}

impl EntityDescriptor {
    /// Creates a descriptor with an integer key field `id` mapped to `ID`
    /// under the `Auto` strategy. Use `key` to override.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            key_field: "id".to_string(),
            key_column: "ID".to_string(),
            key_strategy: KeyStrategy::Auto,
            columns: Vec::new(),
            associations: Vec::new(),
            version_column: None,
            cacheable: false,
        }
    }

    /// Overrides the key mapping.
    #[must_use]
    pub fn key(
        mut self,
        field: impl Into<String>,
        column: impl Into<String>,
        strategy: KeyStrategy,
    ) -> Self {
        self.key_field = field.into();
        self.key_column = column.into();
        self.key_strategy = strategy;
        self
    }

    /// Adds a scalar column mapping.
    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an association mapping.
    #[must_use]
    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    /// Enables optimistic locking through `column`.
    #[must_use]
    pub fn versioned(mut self, column: impl Into<String>) -> Self {
        self.version_column = Some(column.into());
        self
    }

    /// Opts the entity into the second-level cache.
    #[must_use]
    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    /// Looks up a scalar column by field name.
    #[must_use]
    pub fn column_for_field(&self, field: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Looks up an association by field name.
    #[must_use]
    pub fn association_named(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Resolves an entity field name to its column name.
    ///
    /// Covers the key field, scalar columns, and owning to-one
    /// associations (whose field resolves to the join column).
    #[must_use]
    pub fn column_name_of(&self, field: &str) -> Option<&str> {
        if field == self.key_field {
            return Some(&self.key_column);
        }
        if let Some(col) = self.column_for_field(field) {
            return Some(&col.column);
        }
        self.associations
            .iter()
            .find(|a| a.name == field)
            .and_then(|a| a.join_column.as_deref())
    }

    /// Returns the declared type of a column, by column name.
    ///
    /// The key, version, and join columns are integers.
    #[must_use]
    pub fn column_type_of(&self, column: &str) -> Option<ColumnType> {
        if column == self.key_column {
            return Some(ColumnType::Integer);
        }
        if self.version_column.as_deref() == Some(column) {
            return Some(ColumnType::Integer);
        }
        if let Some(col) = self.columns.iter().find(|c| c.column == column) {
            return Some(col.ty);
        }
        if self
            .associations
            .iter()
            .any(|a| a.join_column.as_deref() == Some(column))
        {
            return Some(ColumnType::Integer);
        }
        None
    }

    /// Iterates over the foreign-key columns this table carries, together
    /// with the target entity name.
    pub fn join_columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.associations
            .iter()
            .filter_map(|a| a.join_column.as_deref().map(|c| (c, a.target.as_str())))
    }
}
