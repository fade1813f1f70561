//! Core type definitions.

use relmap_schema::Value;
use std::fmt;

/// Primary key of a persistent entity.
///
/// Keys are 64-bit integers, either assigned by the application or drawn
/// from the backing table's sequence. A key is never reused within a
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey(pub i64);

impl EntityKey {
    /// Creates an entity key.
    #[must_use]
    pub const fn new(key: i64) -> Self {
        Self(key)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", self.0)
    }
}

impl From<i64> for EntityKey {
    fn from(key: i64) -> Self {
        Self(key)
    }
}

impl From<EntityKey> for i64 {
    fn from(key: EntityKey) -> Self {
        key.0
    }
}

impl From<EntityKey> for Value {
    fn from(key: EntityKey) -> Self {
        Self::Integer(key.0)
    }
}
