//! Column mapping definitions.

use crate::value::ColumnType;

/// Maps one entity field onto one table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Field name on the entity.
    pub field: String,
    /// Column name on the table.
    pub column: String,
    /// Declared column type.
    pub ty: ColumnType,
    /// Whether NULL is a legal stored value. Defaults to true.
    pub nullable: bool,
    /// Whether a uniqueness constraint applies. Defaults to false.
    pub unique: bool,
}

impl ColumnDef {
    /// Creates a column mapping with the default constraints
    /// (nullable, not unique).
    pub fn new(field: impl Into<String>, column: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            field: field.into(),
            column: column.into(),
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
