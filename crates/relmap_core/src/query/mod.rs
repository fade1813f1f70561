//! Query building and execution.

pub(crate) mod ast;
pub(crate) mod executor;
pub(crate) mod parser;

use crate::cache::QueryCacheKey;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::query::ast::{
    DeleteStatement, Projection, SelectStatement, Statement, UpdateStatement,
};
use crate::query::executor::ExecContext;
use crate::session::Session;
use crate::types::EntityKey;
use relmap_schema::{EntityDescriptor, SchemaError, Value};
use relmap_store::Row;
use std::collections::BTreeMap;

/// Execution hints a query can opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryHint {
    /// Cache the result set in the factory's query cache. Results are
    /// invalidated when a commit writes the queried entity.
    Cacheable,
}

/// A bound query over one session.
///
/// Parameters are bound with the builder-style [`Query::bind`] and
/// [`Query::bind_named`]; execution consumes the query. Parsed plans are
/// cached per query text on the factory, so repeated text pays for
/// parsing once.
pub struct Query<'s, 'f> {
    session: &'s mut Session<'f>,
    text: String,
    native: bool,
    params: BTreeMap<String, Value>,
    cacheable: bool,
}

struct SelectRun<'f> {
    descriptor: &'f EntityDescriptor,
    projection: Projection,
    rows: Vec<(i64, Row)>,
}

impl<'s, 'f> Query<'s, 'f> {
    pub(crate) fn new(session: &'s mut Session<'f>, text: String, native: bool) -> Self {
        Self {
            session,
            text,
            native,
            params: BTreeMap::new(),
            cacheable: false,
        }
    }

    /// Binds a positional parameter (1-based, as written in the query).
    #[must_use]
    pub fn bind(mut self, position: usize, value: impl Into<Value>) -> Self {
        self.params.insert(position.to_string(), value.into());
        self
    }

    /// Binds a named parameter.
    #[must_use]
    pub fn bind_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Applies an execution hint.
    #[must_use]
    pub fn hint(mut self, hint: QueryHint) -> Self {
        match hint {
            QueryHint::Cacheable => self.cacheable = true,
        }
        self
    }

    /// Runs an entity-projection select and returns the matches, managed
    /// by the session.
    pub fn result_list<T: Entity>(mut self) -> CoreResult<Vec<T>> {
        let run = self.run_select()?;
        if run.projection != Projection::Entity {
            return Err(CoreError::illegal_state(
                "field projection query; use projection_list or scalar_list",
            ));
        }
        if run.descriptor.name != T::NAME {
            return Err(CoreError::illegal_state(format!(
                "query selects {}, not {}",
                run.descriptor.name,
                T::NAME
            )));
        }
        let mut out = Vec::with_capacity(run.rows.len());
        for (key, row) in run.rows {
            if let Some(row) = self.session.absorb_row(T::NAME, key, row)? {
                out.push(T::from_row(EntityKey::new(key), &row)?);
            }
        }
        Ok(out)
    }

    /// Runs an entity-projection select expected to match exactly one
    /// row. Zero matches is [`CoreError::NotFound`], several are
    /// [`CoreError::NonUnique`].
    pub fn single_result<T: Entity>(self) -> CoreResult<T> {
        let entity = T::NAME.to_string();
        let mut results = self.result_list::<T>()?;
        match results.len() {
            0 => Err(CoreError::NotFound { entity }),
            1 => Ok(results.remove(0)),
            count => Err(CoreError::NonUnique { entity, count }),
        }
    }

    /// Runs a field-projection select, returning one row of values per
    /// match.
    pub fn projection_list(mut self) -> CoreResult<Vec<Vec<Value>>> {
        let run = self.run_select()?;
        let Projection::Fields(fields) = &run.projection else {
            return Err(CoreError::illegal_state(
                "entity projection query; use result_list",
            ));
        };
        let ctx = ExecContext {
            descriptor: run.descriptor,
            native: self.native,
        };
        let mut out = Vec::with_capacity(run.rows.len());
        for (key, row) in &run.rows {
            let values = fields
                .iter()
                .map(|f| ctx.field_value(*key, row, f))
                .collect::<CoreResult<Vec<Value>>>()?;
            out.push(values);
        }
        Ok(out)
    }

    /// Runs a single-field projection, returning one value per match.
    pub fn scalar_list(mut self) -> CoreResult<Vec<Value>> {
        let run = self.run_select()?;
        let Projection::Fields(fields) = &run.projection else {
            return Err(CoreError::illegal_state(
                "entity projection query; use result_list",
            ));
        };
        if fields.len() != 1 {
            return Err(CoreError::illegal_state(format!(
                "scalar query must project one field, got {}",
                fields.len()
            )));
        }
        let ctx = ExecContext {
            descriptor: run.descriptor,
            native: self.native,
        };
        run.rows
            .iter()
            .map(|(key, row)| ctx.field_value(*key, row, &fields[0]))
            .collect()
    }

    /// Runs a bulk `UPDATE` or `DELETE` statement, returning the number
    /// of affected rows.
    ///
    /// Bulk statements write the store directly: affected entities are
    /// detached from the session and their cache regions invalidated at
    /// commit, and versioned entities do not get a version bump.
    pub fn execute_update(mut self) -> CoreResult<usize> {
        if !self.session.in_transaction() {
            return Err(CoreError::TransactionRequired);
        }
        let statement = self.session.factory().plan(&self.text, self.native)?;
        match statement.as_ref() {
            Statement::Select(_) => Err(CoreError::illegal_state(
                "select query; use result_list or projection_list",
            )),
            Statement::Update(update) => self.run_bulk_update(update),
            Statement::Delete(delete) => self.run_bulk_delete(delete),
        }
    }

    // ---- internals ----------------------------------------------------

    fn resolve_entity(&self, name: &str) -> CoreResult<&'f EntityDescriptor> {
        let registry = self.session.factory().registry();
        if self.native {
            registry
                .entity_by_table(name)
                .ok_or_else(|| CoreError::Schema(SchemaError::unknown_entity(name)))
        } else {
            Ok(registry.entity(name)?)
        }
    }

    fn run_select(&mut self) -> CoreResult<SelectRun<'f>> {
        let factory = self.session.factory();
        let statement = factory.plan(&self.text, self.native)?;
        let Statement::Select(select) = statement.as_ref() else {
            return Err(CoreError::illegal_state(
                "mutating statement; use execute_update",
            ));
        };
        let descriptor = self.resolve_entity(&select.entity)?;

        // Pending session changes must be visible to the scan.
        if self.session.in_transaction() {
            self.session.flush()?;
        }

        let cache_eligible = self.cacheable
            && select.projection == Projection::Entity
            && !self.session.entity_touched(&descriptor.name);
        let cache_key = QueryCacheKey {
            text: self.text.clone(),
            native: self.native,
            params: self
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        if cache_eligible {
            if let Some(rows) = factory.cached_query(&cache_key) {
                return Ok(SelectRun {
                    descriptor,
                    projection: select.projection.clone(),
                    rows,
                });
            }
        }

        let ctx = ExecContext {
            descriptor,
            native: self.native,
        };
        let mut rows = Vec::new();
        for (key, row) in self.session.scan_rows(&descriptor.table)? {
            let keep = match &select.predicate {
                Some(expr) => executor::matches(&ctx, expr, &self.params, key, &row)?,
                None => true,
            };
            if keep {
                rows.push((key, row));
            }
        }
        executor::sort_rows(&ctx, &select.order_by, &mut rows)?;

        if cache_eligible {
            factory.store_query(cache_key, &descriptor.name, rows.clone());
        }
        Ok(SelectRun {
            descriptor,
            projection: select.projection.clone(),
            rows,
        })
    }

    fn matching_rows(
        &mut self,
        descriptor: &EntityDescriptor,
        predicate: Option<&ast::Expr>,
    ) -> CoreResult<Vec<(i64, Row)>> {
        // Flush first so earlier session changes are part of the result.
        self.session.flush()?;
        let ctx = ExecContext {
            descriptor,
            native: self.native,
        };
        let mut rows = Vec::new();
        for (key, row) in self.session.scan_rows(&descriptor.table)? {
            let keep = match predicate {
                Some(expr) => executor::matches(&ctx, expr, &self.params, key, &row)?,
                None => true,
            };
            if keep {
                rows.push((key, row));
            }
        }
        Ok(rows)
    }

    fn run_bulk_update(&mut self, update: &UpdateStatement) -> CoreResult<usize> {
        let descriptor = self.resolve_entity(&update.entity)?;
        let ctx = ExecContext {
            descriptor,
            native: self.native,
        };
        // Resolve assignment targets and values once, up front.
        let mut assignments = Vec::with_capacity(update.assignments.len());
        for (field, operand) in &update.assignments {
            let column = ctx.resolve_field(field)?.ok_or_else(|| {
                CoreError::illegal_state(format!(
                    "cannot assign to the key of {}",
                    descriptor.name
                ))
            })?;
            let value = executor::resolve_operand(operand, &self.params)?;
            assignments.push((column, value));
        }

        let rows = self.matching_rows(descriptor, update.predicate.as_ref())?;
        let count = rows.len();
        for (key, row) in rows {
            let mut row = row;
            for (column, value) in &assignments {
                row.set(column.clone(), value.clone());
            }
            self.session
                .stage_bulk_update(&descriptor.table, key, row)?;
        }
        self.session.note_bulk_write(&descriptor.name);
        tracing::debug!(entity = %descriptor.name, count, "bulk update");
        Ok(count)
    }

    fn run_bulk_delete(&mut self, delete: &DeleteStatement) -> CoreResult<usize> {
        let descriptor = self.resolve_entity(&delete.entity)?;
        let rows = self.matching_rows(descriptor, delete.predicate.as_ref())?;
        let count = rows.len();
        for (key, _) in rows {
            self.session.stage_bulk_delete(&descriptor.name, key)?;
        }
        self.session.note_bulk_write(&descriptor.name);
        tracing::debug!(entity = %descriptor.name, count, "bulk delete");
        Ok(count)
    }
}
