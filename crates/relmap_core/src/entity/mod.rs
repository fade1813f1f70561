//! Entity trait and typed references.

mod reference;

pub use reference::{PendingRef, Ref};

use crate::error::CoreResult;
use crate::types::EntityKey;
use relmap_store::Row;

/// A persistable type mapped by an [`relmap_schema::EntityDescriptor`].
///
/// Implementations convert between the typed struct and the store's
/// column/value rows. The descriptor registered under [`Entity::NAME`]
/// decides which columns exist; `to_row` must produce exactly the mapped
/// non-key columns (the key travels separately), and `from_row` must
/// accept any row the descriptor's table can hold.
pub trait Entity: Clone {
    /// The registry name of this entity.
    const NAME: &'static str;

    /// Returns the primary key, if assigned.
    fn key(&self) -> Option<EntityKey>;

    /// Stores a key assigned by the session.
    fn set_key(&mut self, key: EntityKey);

    /// Converts the entity into its row of non-key columns.
    ///
    /// To-one associations contribute their foreign-key column via
    /// [`Ref::fk_value`]; an unresolved [`Ref::Pending`] here is an
    /// error, which `persist` prevents by cascading first.
    fn to_row(&self) -> CoreResult<Row>;

    /// Builds the entity from a stored row.
    ///
    /// Association fields come back as [`Ref::Key`] or [`Ref::None`];
    /// to-many collections are not materialized here, the session loads
    /// them per its fetch policy.
    fn from_row(key: EntityKey, row: &Row) -> CoreResult<Self>;

    /// Visits the entity's to-one reference fields.
    ///
    /// The session uses this to cascade persistence into [`Ref::Pending`]
    /// targets before the owning row is staged. Entities without
    /// reference fields keep the default no-op.
    fn visit_refs(
        &mut self,
        _f: &mut dyn FnMut(&str, &mut dyn PendingRef) -> CoreResult<()>,
    ) -> CoreResult<()> {
        Ok(())
    }
}
