//! The schema registry.

use crate::association::AssociationKind;
use crate::descriptor::EntityDescriptor;
use crate::error::{SchemaError, SchemaResult};
use std::collections::HashMap;

/// Immutable registry of entity descriptors and named queries.
///
/// Built once at startup through [`SchemaRegistry::builder`]. The build
/// step validates referential consistency, so every lookup after that can
/// trust the metadata: association targets exist, `mapped_by` fields
/// resolve to owning mappings, join tables are declared exactly once.
#[derive(Debug)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntityDescriptor>,
    tables: HashMap<String, String>,
    named_queries: HashMap<String, String>,
}

impl SchemaRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder {
            entities: Vec::new(),
            named_queries: Vec::new(),
        }
    }

    /// Looks up an entity descriptor, failing if it is not registered.
    pub fn entity(&self, name: &str) -> SchemaResult<&EntityDescriptor> {
        self.entities
            .get(name)
            .ok_or_else(|| SchemaError::unknown_entity(name))
    }

    /// Looks up an entity descriptor without failing.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }

    /// Resolves a table name back to its entity.
    #[must_use]
    pub fn entity_by_table(&self, table: &str) -> Option<&EntityDescriptor> {
        self.tables.get(table).and_then(|name| self.entities.get(name))
    }

    /// Returns the text of a named query.
    #[must_use]
    pub fn named_query(&self, name: &str) -> Option<&str> {
        self.named_queries.get(name).map(String::as_str)
    }

    /// Iterates over all descriptors.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values()
    }

    /// Returns the number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Builder for [`SchemaRegistry`].
#[derive(Debug)]
pub struct SchemaRegistryBuilder {
    entities: Vec<EntityDescriptor>,
    named_queries: Vec<(String, String)>,
}

impl SchemaRegistryBuilder {
    /// Registers an entity descriptor.
    #[must_use]
    pub fn entity(mut self, descriptor: EntityDescriptor) -> Self {
        self.entities.push(descriptor);
        self
    }

    /// Registers a named query.
    #[must_use]
    pub fn named_query(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.named_queries.push((name.into(), text.into()));
        self
    }

    /// Validates and builds the registry.
    pub fn build(self) -> SchemaResult<SchemaRegistry> {
        let mut entities: HashMap<String, EntityDescriptor> = HashMap::new();
        let mut tables: HashMap<String, String> = HashMap::new();

        for descriptor in self.entities {
            if entities.contains_key(&descriptor.name) {
                return Err(SchemaError::DuplicateEntity {
                    name: descriptor.name,
                });
            }
            if let Some(first) = tables.get(&descriptor.table) {
                return Err(SchemaError::DuplicateTable {
                    table: descriptor.table.clone(),
                    first: first.clone(),
                    second: descriptor.name,
                });
            }
            Self::check_columns(&descriptor)?;
            tables.insert(descriptor.table.clone(), descriptor.name.clone());
            entities.insert(descriptor.name.clone(), descriptor);
        }

        for descriptor in entities.values() {
            Self::check_associations(descriptor, &entities)?;
        }

        let mut named_queries = HashMap::new();
        for (name, text) in self.named_queries {
            if named_queries.contains_key(&name) {
                return Err(SchemaError::DuplicateQuery { name });
            }
            named_queries.insert(name, text);
        }

        Ok(SchemaRegistry {
            entities,
            tables,
            named_queries,
        })
    }

    fn check_columns(descriptor: &EntityDescriptor) -> SchemaResult<()> {
        let mut seen_fields = std::collections::HashSet::new();
        let mut seen_columns = std::collections::HashSet::new();
        seen_fields.insert(descriptor.key_field.as_str());
        seen_columns.insert(descriptor.key_column.as_str());
        if let Some(version) = descriptor.version_column.as_deref() {
            seen_columns.insert(version);
        }

        for col in &descriptor.columns {
            if !seen_fields.insert(col.field.as_str()) || !seen_columns.insert(col.column.as_str())
            {
                return Err(SchemaError::DuplicateColumn {
                    entity: descriptor.name.clone(),
                    field: col.field.clone(),
                });
            }
        }

        let mut seen_assocs = std::collections::HashSet::new();
        for assoc in &descriptor.associations {
            if !seen_assocs.insert(assoc.name.as_str()) {
                return Err(SchemaError::DuplicateAssociation {
                    entity: descriptor.name.clone(),
                    name: assoc.name.clone(),
                });
            }
            if let Some(join_column) = assoc.join_column.as_deref() {
                if !seen_columns.insert(join_column) {
                    return Err(SchemaError::DuplicateColumn {
                        entity: descriptor.name.clone(),
                        field: assoc.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_associations(
        descriptor: &EntityDescriptor,
        entities: &HashMap<String, EntityDescriptor>,
    ) -> SchemaResult<()> {
        for assoc in &descriptor.associations {
            let target = entities.get(&assoc.target).ok_or_else(|| {
                SchemaError::UnknownTarget {
                    entity: descriptor.name.clone(),
                    association: assoc.name.clone(),
                    target: assoc.target.clone(),
                }
            })?;

            match assoc.kind {
                AssociationKind::ManyToOne => {
                    if assoc.join_column.is_none() {
                        return Err(SchemaError::invalid_association(
                            &descriptor.name,
                            &assoc.name,
                            "many-to-one requires a join column",
                        ));
                    }
                }
                AssociationKind::OneToOne => {
                    if assoc.join_column.is_none() && assoc.mapped_by.is_none() {
                        return Err(SchemaError::invalid_association(
                            &descriptor.name,
                            &assoc.name,
                            "one-to-one requires a join column or mapped_by",
                        ));
                    }
                }
                AssociationKind::OneToMany => {
                    if assoc.mapped_by.is_none() {
                        return Err(SchemaError::invalid_association(
                            &descriptor.name,
                            &assoc.name,
                            "one-to-many must be mapped by the owning side",
                        ));
                    }
                }
                AssociationKind::ManyToMany => {
                    if assoc.join_table.is_none() && assoc.mapped_by.is_none() {
                        return Err(SchemaError::invalid_association(
                            &descriptor.name,
                            &assoc.name,
                            "many-to-many requires a join table or mapped_by",
                        ));
                    }
                }
            }

            // A mapped_by back-reference must point at an owning mapping on
            // the target whose own target is this entity.
            if let Some(mapped_by) = assoc.mapped_by.as_deref() {
                let owner = target.association_named(mapped_by).ok_or_else(|| {
                    SchemaError::invalid_association(
                        &descriptor.name,
                        &assoc.name,
                        format!("mapped_by field {mapped_by} does not exist on {}", target.name),
                    )
                })?;
                if !owner.is_owning() {
                    return Err(SchemaError::invalid_association(
                        &descriptor.name,
                        &assoc.name,
                        format!("mapped_by field {mapped_by} is not an owning mapping"),
                    ));
                }
                if owner.target != descriptor.name {
                    return Err(SchemaError::invalid_association(
                        &descriptor.name,
                        &assoc.name,
                        format!(
                            "owning side {}.{mapped_by} targets {}, not {}",
                            target.name, owner.target, descriptor.name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}
