//! Association mapping definitions.
//!
//! Only the owning side of an association holds a physical mapping: a join
//! column for to-one kinds, a join table for many-to-many. The non-owning
//! side names the owning field via `mapped_by` and is resolved at
//! navigation time by scanning the owner's foreign key. This keeps one
//! authoritative mapping per relation instead of two independently mutable
//! references.

use std::fmt;

/// The four association kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// 1-1: a join column on the owning side, unique.
    OneToOne,
    /// 1-n: non-owning; the n side holds the foreign key.
    OneToMany,
    /// n-1: a join column on this (owning) side.
    ManyToOne,
    /// n-n: a join table between the two sides.
    ManyToMany,
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OneToOne => "one-to-one",
            Self::OneToMany => "one-to-many",
            Self::ManyToOne => "many-to-one",
            Self::ManyToMany => "many-to-many",
        };
        write!(f, "{name}")
    }
}

/// When an association target is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchPolicy {
    /// Resolved at load time.
    Eager,
    /// Resolved on first navigation through an active session.
    Lazy,
}

/// Lifecycle operations that propagate across an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cascade {
    /// Persist propagates to pending targets.
    Persist,
    /// Remove propagates to dependent rows.
    Remove,
    /// Refresh propagates to loaded targets.
    Refresh,
}

/// Join-table mapping for a many-to-many association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    /// Name of the join table.
    pub table: String,
    /// Column holding the owning side's key.
    pub owner_column: String,
    /// Column holding the target side's key.
    pub target_column: String,
}

impl JoinTable {
    /// Creates a join-table mapping.
    pub fn new(
        table: impl Into<String>,
        owner_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            owner_column: owner_column.into(),
            target_column: target_column.into(),
        }
    }
}

/// A directed association from one entity type to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Field name on the declaring entity.
    pub name: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// Target entity name.
    pub target: String,
    /// Fetch policy. To-one kinds default to eager, to-many to lazy.
    pub fetch: FetchPolicy,
    /// Cascade rules.
    pub cascade: Vec<Cascade>,
    /// Foreign-key column on the declaring table (owning to-one only).
    pub join_column: Option<String>,
    /// Owning field on the target (non-owning side only).
    pub mapped_by: Option<String>,
    /// Join table (many-to-many only).
    pub join_table: Option<JoinTable>,
}

impl Association {
    fn base(name: impl Into<String>, kind: AssociationKind, target: impl Into<String>) -> Self {
        let fetch = match kind {
            AssociationKind::OneToOne | AssociationKind::ManyToOne => FetchPolicy::Eager,
            AssociationKind::OneToMany | AssociationKind::ManyToMany => FetchPolicy::Lazy,
        };
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            fetch,
            cascade: Vec::new(),
            join_column: None,
            mapped_by: None,
            join_table: None,
        }
    }

    /// Owning many-to-one: `join_column` is the foreign key on this table.
    pub fn many_to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        join_column: impl Into<String>,
    ) -> Self {
        let mut a = Self::base(name, AssociationKind::ManyToOne, target);
        a.join_column = Some(join_column.into());
        a
    }

    /// Non-owning one-to-many: `mapped_by` names the many-to-one field on
    /// the target that holds the foreign key.
    pub fn one_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        mapped_by: impl Into<String>,
    ) -> Self {
        let mut a = Self::base(name, AssociationKind::OneToMany, target);
        a.mapped_by = Some(mapped_by.into());
        a
    }

    /// Owning one-to-one with a unique foreign key on this table.
    pub fn one_to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        join_column: impl Into<String>,
    ) -> Self {
        let mut a = Self::base(name, AssociationKind::OneToOne, target);
        a.join_column = Some(join_column.into());
        a
    }

    /// Non-owning one-to-one back-reference.
    pub fn one_to_one_mapped(
        name: impl Into<String>,
        target: impl Into<String>,
        mapped_by: impl Into<String>,
    ) -> Self {
        let mut a = Self::base(name, AssociationKind::OneToOne, target);
        a.mapped_by = Some(mapped_by.into());
        a
    }

    /// Owning many-to-many through a join table.
    pub fn many_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        join_table: JoinTable,
    ) -> Self {
        let mut a = Self::base(name, AssociationKind::ManyToMany, target);
        a.join_table = Some(join_table);
        a
    }

    /// Non-owning many-to-many back-reference.
    pub fn many_to_many_mapped(
        name: impl Into<String>,
        target: impl Into<String>,
        mapped_by: impl Into<String>,
    ) -> Self {
        let mut a = Self::base(name, AssociationKind::ManyToMany, target);
        a.mapped_by = Some(mapped_by.into());
        a
    }

    /// Overrides the fetch policy.
    #[must_use]
    pub fn fetch(mut self, policy: FetchPolicy) -> Self {
        self.fetch = policy;
        self
    }

    /// Adds a cascade rule.
    #[must_use]
    pub fn cascade(mut self, rule: Cascade) -> Self {
        if !self.cascade.contains(&rule) {
            self.cascade.push(rule);
        }
        self
    }

    /// Returns true if this side holds the physical mapping.
    #[must_use]
    pub fn is_owning(&self) -> bool {
        self.mapped_by.is_none()
    }

    /// Returns true if `rule` cascades across this association.
    #[must_use]
    pub fn cascades(&self, rule: Cascade) -> bool {
        self.cascade.contains(&rule)
    }

    /// Returns true for the to-one kinds.
    #[must_use]
    pub const fn is_to_one(&self) -> bool {
        matches!(
            self.kind,
            AssociationKind::OneToOne | AssociationKind::ManyToOne
        )
    }
}
