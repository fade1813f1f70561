//! Parsed query statements.

use relmap_schema::Value;

/// A parsed statement, cached per query text in the factory's plan
/// cache.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

/// `SELECT ... FROM entity [alias] [WHERE ...] [ORDER BY ...]`.
///
/// The alias is resolved away during parsing; every field here is an
/// unqualified entity field (or column, for native queries).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectStatement {
    pub entity: String,
    pub projection: Projection,
    pub predicate: Option<Expr>,
    pub order_by: Vec<OrderBy>,
}

/// What a select produces per matching row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    /// The whole entity. Also what a bare `FROM entity` query selects.
    Entity,
    /// One value per listed field.
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// `UPDATE entity [alias] SET field = operand, ... [WHERE ...]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UpdateStatement {
    pub entity: String,
    pub assignments: Vec<(String, Operand)>,
    pub predicate: Option<Expr>,
}

/// `DELETE [FROM] entity [alias] [WHERE ...]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeleteStatement {
    pub entity: String,
    pub predicate: Option<Expr>,
}

/// A boolean predicate over one row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Compare {
        field: String,
        op: CompareOp,
        operand: Operand,
    },
    IsNull {
        field: String,
        negated: bool,
    },
    Like {
        field: String,
        pattern: Operand,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A value position: a literal, or a parameter bound at execution time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Literal(Value),
    Positional(usize),
    Named(String),
}
