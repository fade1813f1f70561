//! Error types for schema construction and lookup.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while building or querying a schema registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Two entities were registered under the same name.
    #[error("duplicate entity: {name}")]
    DuplicateEntity {
        /// Name of the entity.
        name: String,
    },

    /// Two entities map to the same table.
    #[error("duplicate table: {table} (entities {first} and {second})")]
    DuplicateTable {
        /// Table name claimed twice.
        table: String,
        /// First entity mapping the table.
        first: String,
        /// Second entity mapping the table.
        second: String,
    },

    /// An entity declares the same field or column twice.
    #[error("duplicate column on {entity}: {field}")]
    DuplicateColumn {
        /// The entity declaring the column.
        entity: String,
        /// The duplicated field name.
        field: String,
    },

    /// An entity declares two associations with the same name.
    #[error("duplicate association on {entity}: {name}")]
    DuplicateAssociation {
        /// The entity declaring the association.
        entity: String,
        /// The duplicated association name.
        name: String,
    },

    /// An association references an entity that is not registered.
    #[error("association {entity}.{association} targets unknown entity {target}")]
    UnknownTarget {
        /// The entity declaring the association.
        entity: String,
        /// The association name.
        association: String,
        /// The missing target entity.
        target: String,
    },

    /// An association is structurally invalid.
    #[error("invalid association {entity}.{association}: {message}")]
    InvalidAssociation {
        /// The entity declaring the association.
        entity: String,
        /// The association name.
        association: String,
        /// Description of the problem.
        message: String,
    },

    /// Two named queries were registered under the same name.
    #[error("duplicate named query: {name}")]
    DuplicateQuery {
        /// Name of the query.
        name: String,
    },

    /// Lookup of an entity that is not registered.
    #[error("unknown entity: {name}")]
    UnknownEntity {
        /// The requested entity name.
        name: String,
    },
}

impl SchemaError {
    /// Creates an invalid association error.
    pub fn invalid_association(
        entity: impl Into<String>,
        association: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAssociation {
            entity: entity.into(),
            association: association.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown entity error.
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::UnknownEntity { name: name.into() }
    }
}
