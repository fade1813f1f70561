//! Typed references between entities.

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::session::Session;
use crate::types::EntityKey;
use relmap_schema::Value;

/// A to-one reference field.
///
/// References stand in for the foreign-key column of a to-one
/// association. Loading an entity produces [`Ref::None`] or
/// [`Ref::Key`]; the session's `resolve` turns a key into the target
/// entity on demand. [`Ref::Pending`] carries a not-yet-persisted target
/// so that persisting the owner can cascade into it.
#[derive(Debug, Clone, PartialEq)]
pub enum Ref<T: Entity> {
    /// No target (NULL foreign key).
    None,
    /// A persistent target identified by key.
    Key(EntityKey),
    /// A transient target awaiting cascaded persistence.
    Pending(Box<T>),
}

impl<T: Entity> Ref<T> {
    /// Creates an empty reference.
    #[must_use]
    pub const fn none() -> Self {
        Self::None
    }

    /// Creates a reference to a persistent target.
    #[must_use]
    pub const fn to(key: EntityKey) -> Self {
        Self::Key(key)
    }

    /// Wraps a transient target for cascaded persistence.
    #[must_use]
    pub fn pending(entity: T) -> Self {
        Self::Pending(Box::new(entity))
    }

    /// Returns the target key, if the reference has one.
    #[must_use]
    pub fn key(&self) -> Option<EntityKey> {
        match self {
            Self::None => None,
            Self::Key(key) => Some(*key),
            Self::Pending(entity) => entity.key(),
        }
    }

    /// Returns true if the reference points at nothing.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Converts the reference into its foreign-key column value.
    ///
    /// Fails on [`Ref::Pending`]: the target must be persisted (normally
    /// by cascade) before the owning row can be written.
    pub fn fk_value(&self) -> CoreResult<Value> {
        match self {
            Self::None => Ok(Value::Null),
            Self::Key(key) => Ok(Value::Integer(key.as_i64())),
            Self::Pending(_) => Err(CoreError::illegal_state(format!(
                "reference to transient {} has no key; persist it first or cascade",
                T::NAME
            ))),
        }
    }

    /// Builds a reference from a foreign-key column value.
    pub fn from_fk_value(value: &Value) -> CoreResult<Self> {
        match value {
            Value::Null => Ok(Self::None),
            Value::Integer(key) => Ok(Self::Key(EntityKey::new(*key))),
            other => Err(CoreError::illegal_state(format!(
                "foreign key to {} must be an integer, got {other:?}",
                T::NAME
            ))),
        }
    }
}

impl<T: Entity> Default for Ref<T> {
    fn default() -> Self {
        Self::None
    }
}

impl<T: Entity> From<EntityKey> for Ref<T> {
    fn from(key: EntityKey) -> Self {
        Self::Key(key)
    }
}

/// Object-safe view of a [`Ref`] used by the session's cascade machinery.
pub trait PendingRef {
    /// Returns true if the reference wraps a transient target.
    fn has_pending(&self) -> bool;

    /// Persists a pending target and collapses the reference to its key.
    fn cascade_persist(&mut self, session: &mut Session<'_>) -> CoreResult<()>;
}

impl<T: Entity> PendingRef for Ref<T> {
    fn has_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    fn cascade_persist(&mut self, session: &mut Session<'_>) -> CoreResult<()> {
        if let Self::Pending(entity) = self {
            let key = session.persist(entity.as_mut())?;
            *self = Self::Key(key);
        }
        Ok(())
    }
}
