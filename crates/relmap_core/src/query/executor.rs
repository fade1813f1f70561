//! Predicate evaluation and row ordering.
//!
//! Comparison semantics follow SQL's three-valued logic collapsed to
//! two: any comparison against NULL is false, and only `IS [NOT] NULL`
//! sees NULLs. `LIKE` applies to text, with `%` and `_` wildcards.

use crate::error::{CoreError, CoreResult};
use crate::query::ast::{CompareOp, Expr, Operand, OrderBy};
use relmap_schema::{EntityDescriptor, Value};
use relmap_store::Row;
use std::collections::BTreeMap;

/// Field resolution context: the queried entity, and whether names in
/// the statement are entity fields or raw column names.
pub(crate) struct ExecContext<'a> {
    pub(crate) descriptor: &'a EntityDescriptor,
    pub(crate) native: bool,
}

impl ExecContext<'_> {
    /// Maps a statement field to its column. `None` means the key,
    /// which is stored outside the row.
    pub(crate) fn resolve_field(&self, field: &str) -> CoreResult<Option<String>> {
        if self.native {
            if field == self.descriptor.key_column {
                return Ok(None);
            }
            if self.descriptor.column_type_of(field).is_some() {
                return Ok(Some(field.to_string()));
            }
        } else {
            if field == self.descriptor.key_field {
                return Ok(None);
            }
            if let Some(column) = self.descriptor.column_name_of(field) {
                return Ok(Some(column.to_string()));
            }
        }
        Err(CoreError::UnknownField {
            entity: self.descriptor.name.clone(),
            field: field.to_string(),
        })
    }

    /// Reads a field's value off a row.
    pub(crate) fn field_value(&self, key: i64, row: &Row, field: &str) -> CoreResult<Value> {
        Ok(match self.resolve_field(field)? {
            None => Value::Integer(key),
            Some(column) => row.get_or_null(&column),
        })
    }
}

/// Resolves an operand to a concrete value using the bound parameters.
pub(crate) fn resolve_operand(
    operand: &Operand,
    params: &BTreeMap<String, Value>,
) -> CoreResult<Value> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Positional(n) => params
            .get(&n.to_string())
            .cloned()
            .ok_or_else(|| CoreError::unbound_parameter(format!("?{n}"))),
        Operand::Named(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::unbound_parameter(format!(":{name}"))),
    }
}

/// Evaluates a predicate against one row.
pub(crate) fn matches(
    ctx: &ExecContext<'_>,
    expr: &Expr,
    params: &BTreeMap<String, Value>,
    key: i64,
    row: &Row,
) -> CoreResult<bool> {
    match expr {
        Expr::Compare { field, op, operand } => {
            let lhs = ctx.field_value(key, row, field)?;
            let rhs = resolve_operand(operand, params)?;
            Ok(compare(*op, &lhs, &rhs))
        }
        Expr::IsNull { field, negated } => {
            let value = ctx.field_value(key, row, field)?;
            Ok(value.is_null() != *negated)
        }
        Expr::Like {
            field,
            pattern,
            negated,
        } => {
            let value = ctx.field_value(key, row, field)?;
            let pattern = resolve_operand(pattern, params)?;
            let matched = match (value.as_text(), pattern.as_text()) {
                (Some(text), Some(pattern)) => like_match(pattern, text),
                _ => false,
            };
            Ok(matched != *negated && !value.is_null())
        }
        Expr::And(lhs, rhs) => {
            Ok(matches(ctx, lhs, params, key, row)? && matches(ctx, rhs, params, key, row)?)
        }
        Expr::Or(lhs, rhs) => {
            Ok(matches(ctx, lhs, params, key, row)? || matches(ctx, rhs, params, key, row)?)
        }
        Expr::Not(inner) => Ok(!matches(ctx, inner, params, key, row)?),
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    if lhs.is_null() || rhs.is_null() {
        return false;
    }
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
    }
}

/// Sorts rows by the `ORDER BY` keys. Stable, so equal keys keep scan
/// (key) order.
pub(crate) fn sort_rows(
    ctx: &ExecContext<'_>,
    order_by: &[OrderBy],
    rows: &mut Vec<(i64, Row)>,
) -> CoreResult<()> {
    if order_by.is_empty() {
        return Ok(());
    }
    let mut keyed: Vec<(Vec<Value>, (i64, Row))> = Vec::with_capacity(rows.len());
    for (key, row) in rows.drain(..) {
        let sort_key = order_by
            .iter()
            .map(|o| ctx.field_value(key, &row, &o.field))
            .collect::<CoreResult<Vec<Value>>>()?;
        keyed.push((sort_key, (key, row)));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for (i, order) in order_by.iter().enumerate() {
            let ordering = a[i].cmp(&b[i]);
            let ordering = if order.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
    rows.extend(keyed.into_iter().map(|(_, pair)| pair));
    Ok(())
}

/// `%` matches any run of characters, `_` exactly one.
pub(crate) fn like_match(pattern: &str, text: &str) -> bool {
    fn rec(p: &[char], s: &[char]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some('%') => (0..=s.len()).any(|i| rec(&p[1..], &s[i..])),
            Some('_') => !s.is_empty() && rec(&p[1..], &s[1..]),
            Some(c) => s.first() == Some(c) && rec(&p[1..], &s[1..]),
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    rec(&pattern, &text)
}
