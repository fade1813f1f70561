//! In-memory reference backend.

use crate::backend::{JoinSide, JoinTableSpec, StoreBackend, TableSpec};
use crate::error::{StoreError, StoreResult};
use crate::row::Row;
use crate::transaction::StoreTransaction;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug)]
struct Table {
    spec: TableSpec,
    rows: BTreeMap<i64, Row>,
    next_key: i64,
}

#[derive(Debug)]
struct JoinTable {
    spec: JoinTableSpec,
    pairs: BTreeSet<(i64, i64)>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Table>,
    join_tables: HashMap<String, JoinTable>,
}

/// An in-memory relational store.
///
/// The reference [`StoreBackend`] implementation: `BTreeMap` tables behind
/// a `parking_lot::RwLock`, with a separate writer mutex providing the
/// single-writer transaction guarantee. All constraints (primary key,
/// unique, not-null, type, foreign key) are enforced when writes are
/// staged.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    writer: Mutex<()>,
}

impl InMemoryStore {
    /// Creates an empty store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of committed rows across all entity tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.inner
            .read()
            .tables
            .values()
            .map(|t| t.rows.len())
            .sum()
    }
}

/// Resolves the row visible to `txn` (staged overlay over committed).
fn visible_row(inner: &Inner, txn: &StoreTransaction<'_>, table: &str, key: i64) -> Option<Row> {
    if let Some(staged) = txn.staged_row(table, key) {
        return staged.cloned();
    }
    inner
        .tables
        .get(table)
        .and_then(|t| t.rows.get(&key).cloned())
}

/// All rows of `table` visible to `txn`, in key order.
fn visible_rows(inner: &Inner, txn: &StoreTransaction<'_>, table: &str) -> Vec<(i64, Row)> {
    let mut out: BTreeMap<i64, Row> = inner
        .tables
        .get(table)
        .map(|t| t.rows.clone())
        .unwrap_or_default();
    for ((staged_table, key), state) in &txn.rows {
        if staged_table == table {
            match state {
                Some(row) => {
                    out.insert(*key, row.clone());
                }
                None => {
                    out.remove(key);
                }
            }
        }
    }
    out.into_iter().collect()
}

fn visible_pairs(inner: &Inner, txn: &StoreTransaction<'_>, table: &str) -> BTreeSet<(i64, i64)> {
    let mut pairs = inner
        .join_tables
        .get(table)
        .map(|j| j.pairs.clone())
        .unwrap_or_default();
    if let Some(overlay) = txn.links.get(table) {
        for pair in &overlay.removed {
            pairs.remove(pair);
        }
        for pair in &overlay.added {
            pairs.insert(*pair);
        }
    }
    pairs
}

fn pair_keys(pairs: &BTreeSet<(i64, i64)>, side: JoinSide, key: i64) -> Vec<i64> {
    let mut out: Vec<i64> = pairs
        .iter()
        .filter_map(|&(owner, target)| match side {
            JoinSide::Owner if owner == key => Some(target),
            JoinSide::Target if target == key => Some(owner),
            _ => None,
        })
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

impl InMemoryStore {
    /// Validates `row` against the table spec and the state visible to
    /// `txn`, excluding `key` itself from uniqueness checks.
    fn validate_row(
        &self,
        inner: &Inner,
        txn: &StoreTransaction<'_>,
        table: &Table,
        key: i64,
        row: &Row,
    ) -> StoreResult<()> {
        let spec = &table.spec;

        for (column, value) in row.iter() {
            let col = spec
                .columns
                .iter()
                .find(|c| c.name == column)
                .ok_or_else(|| StoreError::UnknownColumn {
                    table: spec.name.clone(),
                    column: column.to_string(),
                })?;
            if !value.compatible_with(col.ty) {
                return Err(StoreError::TypeMismatch {
                    table: spec.name.clone(),
                    column: column.to_string(),
                    expected: col.ty.to_string(),
                });
            }
        }

        for col in &spec.columns {
            let value = row.get_or_null(&col.name);
            if !col.nullable && value.is_null() {
                return Err(StoreError::NotNull {
                    table: spec.name.clone(),
                    column: col.name.clone(),
                });
            }
            if col.unique && !value.is_null() {
                let clash = visible_rows(inner, txn, &spec.name)
                    .into_iter()
                    .any(|(other, existing)| {
                        other != key && existing.get_or_null(&col.name) == value
                    });
                if clash {
                    return Err(StoreError::UniqueViolation {
                        table: spec.name.clone(),
                        column: col.name.clone(),
                    });
                }
            }
        }

        for fk in &spec.foreign_keys {
            match row.get_or_null(&fk.column) {
                relmap_schema::Value::Null => {}
                relmap_schema::Value::Integer(referenced) => {
                    if visible_row(inner, txn, &fk.references, referenced).is_none() {
                        return Err(StoreError::ForeignKey {
                            table: spec.name.clone(),
                            column: fk.column.clone(),
                            key: referenced,
                        });
                    }
                }
                _ => {
                    return Err(StoreError::TypeMismatch {
                        table: spec.name.clone(),
                        column: fk.column.clone(),
                        expected: "integer".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Checks that no visible row or join pair still references
    /// (`table`, `key`).
    fn check_no_references(
        &self,
        inner: &Inner,
        txn: &StoreTransaction<'_>,
        table: &str,
        key: i64,
    ) -> StoreResult<()> {
        for other in inner.tables.values() {
            for fk in &other.spec.foreign_keys {
                if fk.references != table {
                    continue;
                }
                let dangling = visible_rows(inner, txn, &other.spec.name)
                    .into_iter()
                    .any(|(_, row)| {
                        row.get_or_null(&fk.column) == relmap_schema::Value::Integer(key)
                    });
                if dangling {
                    return Err(StoreError::ForeignKey {
                        table: other.spec.name.clone(),
                        column: fk.column.clone(),
                        key,
                    });
                }
            }
        }

        for join in inner.join_tables.values() {
            let pairs = visible_pairs(inner, txn, &join.spec.name);
            if join.spec.owner_references == table && !pair_keys(&pairs, JoinSide::Owner, key).is_empty()
            {
                return Err(StoreError::ForeignKey {
                    table: join.spec.name.clone(),
                    column: join.spec.owner_column.clone(),
                    key,
                });
            }
            if join.spec.target_references == table
                && !pair_keys(&pairs, JoinSide::Target, key).is_empty()
            {
                return Err(StoreError::ForeignKey {
                    table: join.spec.name.clone(),
                    column: join.spec.target_column.clone(),
                    key,
                });
            }
        }

        Ok(())
    }
}

impl StoreBackend for InMemoryStore {
    fn create_table(&self, spec: &TableSpec) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.tables.contains_key(&spec.name) || inner.join_tables.contains_key(&spec.name) {
            return Err(StoreError::TableExists {
                table: spec.name.clone(),
            });
        }
        inner.tables.insert(
            spec.name.clone(),
            Table {
                spec: spec.clone(),
                rows: BTreeMap::new(),
                next_key: 1,
            },
        );
        Ok(())
    }

    fn create_join_table(&self, spec: &JoinTableSpec) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.tables.contains_key(&spec.name) || inner.join_tables.contains_key(&spec.name) {
            return Err(StoreError::TableExists {
                table: spec.name.clone(),
            });
        }
        inner.join_tables.insert(
            spec.name.clone(),
            JoinTable {
                spec: spec.clone(),
                pairs: BTreeSet::new(),
            },
        );
        Ok(())
    }

    fn has_table(&self, name: &str) -> bool {
        let inner = self.inner.read();
        inner.tables.contains_key(name) || inner.join_tables.contains_key(name)
    }

    fn begin(&self) -> StoreTransaction<'_> {
        StoreTransaction::new(self.writer.lock())
    }

    fn commit(&self, txn: StoreTransaction<'_>) -> StoreResult<()> {
        let mut inner = self.inner.write();
        for ((table, key), state) in &txn.rows {
            let table = inner
                .tables
                .get_mut(table)
                .ok_or_else(|| StoreError::unknown_table(table))?;
            match state {
                Some(row) => {
                    table.rows.insert(*key, row.clone());
                    // The sequence must stay ahead of the largest committed key.
                    if *key >= table.next_key {
                        table.next_key = key + 1;
                    }
                }
                None => {
                    table.rows.remove(key);
                }
            }
        }
        for (table, overlay) in &txn.links {
            let join = inner
                .join_tables
                .get_mut(table)
                .ok_or_else(|| StoreError::unknown_table(table))?;
            for pair in &overlay.removed {
                join.pairs.remove(pair);
            }
            for pair in &overlay.added {
                join.pairs.insert(*pair);
            }
        }
        Ok(())
    }

    fn insert(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        key: i64,
        row: Row,
    ) -> StoreResult<()> {
        let inner = self.inner.read();
        let t = inner
            .tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        if visible_row(&inner, txn, table, key).is_some() {
            return Err(StoreError::DuplicateKey {
                table: table.to_string(),
                key,
            });
        }
        self.validate_row(&inner, txn, t, key, &row)?;
        drop(inner);
        txn.stage_row(table, key, Some(row));
        Ok(())
    }

    fn update(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        key: i64,
        row: Row,
    ) -> StoreResult<()> {
        let inner = self.inner.read();
        let t = inner
            .tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        if visible_row(&inner, txn, table, key).is_none() {
            return Err(StoreError::RowNotFound {
                table: table.to_string(),
                key,
            });
        }
        self.validate_row(&inner, txn, t, key, &row)?;
        drop(inner);
        txn.stage_row(table, key, Some(row));
        Ok(())
    }

    fn delete(&self, txn: &mut StoreTransaction<'_>, table: &str, key: i64) -> StoreResult<()> {
        let inner = self.inner.read();
        if !inner.tables.contains_key(table) {
            return Err(StoreError::unknown_table(table));
        }
        if visible_row(&inner, txn, table, key).is_none() {
            return Err(StoreError::RowNotFound {
                table: table.to_string(),
                key,
            });
        }
        // Staging the delete first would hide the row from its own
        // reference check; check while it is still visible.
        self.check_no_references(&inner, txn, table, key)?;
        drop(inner);
        txn.stage_row(table, key, None);
        Ok(())
    }

    fn get(&self, table: &str, key: i64) -> StoreResult<Option<Row>> {
        let inner = self.inner.read();
        let t = inner
            .tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        Ok(t.rows.get(&key).cloned())
    }

    fn get_in_txn(
        &self,
        txn: &StoreTransaction<'_>,
        table: &str,
        key: i64,
    ) -> StoreResult<Option<Row>> {
        let inner = self.inner.read();
        if !inner.tables.contains_key(table) {
            return Err(StoreError::unknown_table(table));
        }
        Ok(visible_row(&inner, txn, table, key))
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<(i64, Row)>> {
        let inner = self.inner.read();
        let t = inner
            .tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        Ok(t.rows.iter().map(|(k, v)| (*k, v.clone())).collect())
    }

    fn scan_in_txn(
        &self,
        txn: &StoreTransaction<'_>,
        table: &str,
    ) -> StoreResult<Vec<(i64, Row)>> {
        let inner = self.inner.read();
        if !inner.tables.contains_key(table) {
            return Err(StoreError::unknown_table(table));
        }
        Ok(visible_rows(&inner, txn, table))
    }

    fn next_key(&self, table: &str) -> StoreResult<i64> {
        let mut inner = self.inner.write();
        let t = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        let key = t.next_key;
        t.next_key += 1;
        Ok(key)
    }

    fn link(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        owner: i64,
        target: i64,
    ) -> StoreResult<()> {
        let inner = self.inner.read();
        let join = inner
            .join_tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        if visible_row(&inner, txn, &join.spec.owner_references, owner).is_none() {
            return Err(StoreError::ForeignKey {
                table: table.to_string(),
                column: join.spec.owner_column.clone(),
                key: owner,
            });
        }
        if visible_row(&inner, txn, &join.spec.target_references, target).is_none() {
            return Err(StoreError::ForeignKey {
                table: table.to_string(),
                column: join.spec.target_column.clone(),
                key: target,
            });
        }
        let committed = join.pairs.contains(&(owner, target));
        drop(inner);
        let overlay = txn.link_overlay(table);
        if !overlay.visible((owner, target), committed) {
            overlay.stage_link((owner, target));
        }
        Ok(())
    }

    fn unlink(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        owner: i64,
        target: i64,
    ) -> StoreResult<bool> {
        let inner = self.inner.read();
        let join = inner
            .join_tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        let committed = join.pairs.contains(&(owner, target));
        drop(inner);
        let overlay = txn.link_overlay(table);
        if !overlay.visible((owner, target), committed) {
            return Ok(false);
        }
        overlay.stage_unlink((owner, target));
        Ok(true)
    }

    fn unlink_all(
        &self,
        txn: &mut StoreTransaction<'_>,
        table: &str,
        side: JoinSide,
        key: i64,
    ) -> StoreResult<usize> {
        let inner = self.inner.read();
        if !inner.join_tables.contains_key(table) {
            return Err(StoreError::unknown_table(table));
        }
        let pairs = visible_pairs(&inner, txn, table);
        drop(inner);

        let mut removed = 0;
        let overlay = txn.link_overlay(table);
        for &(owner, target) in &pairs {
            let matches = match side {
                JoinSide::Owner => owner == key,
                JoinSide::Target => target == key,
            };
            if matches {
                overlay.stage_unlink((owner, target));
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn links(&self, table: &str, side: JoinSide, key: i64) -> StoreResult<Vec<i64>> {
        let inner = self.inner.read();
        let join = inner
            .join_tables
            .get(table)
            .ok_or_else(|| StoreError::unknown_table(table))?;
        Ok(pair_keys(&join.pairs, side, key))
    }

    fn links_in_txn(
        &self,
        txn: &StoreTransaction<'_>,
        table: &str,
        side: JoinSide,
        key: i64,
    ) -> StoreResult<Vec<i64>> {
        let inner = self.inner.read();
        if !inner.join_tables.contains_key(table) {
            return Err(StoreError::unknown_table(table));
        }
        let pairs = visible_pairs(&inner, txn, table);
        Ok(pair_keys(&pairs, side, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ColumnSpec, ForeignKeySpec};
    use relmap_schema::{ColumnType, Value};

    fn customers_spec() -> TableSpec {
        TableSpec::new("JPA_CUSTOMERS", "ID")
            .column(ColumnSpec::new("LAST_NAME", ColumnType::Text))
            .column(ColumnSpec::new("EMAIL", ColumnType::Text).unique())
            .column(ColumnSpec::new("AGE", ColumnType::Integer))
    }

    fn orders_spec() -> TableSpec {
        TableSpec::new("JPA_ORDERS", "ID")
            .column(ColumnSpec::new("ORDER_NAME", ColumnType::Text))
            .column(ColumnSpec::new("CUSTOMER_ID", ColumnType::Integer))
            .foreign_key(ForeignKeySpec::new("CUSTOMER_ID", "JPA_CUSTOMERS"))
    }

    fn join_spec() -> JoinTableSpec {
        JoinTableSpec {
            name: "rel_item_category".to_string(),
            owner_column: "ITEM_ID".to_string(),
            owner_references: "JPA_CUSTOMERS".to_string(),
            target_column: "CATEGORY_ID".to_string(),
            target_references: "JPA_ORDERS".to_string(),
        }
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_table(&customers_spec()).unwrap();
        store.create_table(&orders_spec()).unwrap();
        store.create_join_table(&join_spec()).unwrap();
        store
    }

    fn commit_customer(store: &InMemoryStore, key: i64, name: &str) {
        let mut txn = store.begin();
        store
            .insert(
                &mut txn,
                "JPA_CUSTOMERS",
                key,
                Row::new().with("LAST_NAME", name),
            )
            .unwrap();
        store.commit(txn).unwrap();
    }

    #[test]
    fn insert_commit_get() {
        let store = store();
        commit_customer(&store, 1, "devinkin");
        let row = store.get("JPA_CUSTOMERS", 1).unwrap().unwrap();
        assert_eq!(row.get_or_null("LAST_NAME"), Value::Text("devinkin".into()));
    }

    #[test]
    fn uncommitted_writes_invisible_outside_txn() {
        let store = store();
        let mut txn = store.begin();
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 1, Row::new())
            .unwrap();
        assert!(store.get("JPA_CUSTOMERS", 1).unwrap().is_none());
        assert!(store
            .get_in_txn(&txn, "JPA_CUSTOMERS", 1)
            .unwrap()
            .is_some());
        drop(txn); // rollback
        assert!(store.get("JPA_CUSTOMERS", 1).unwrap().is_none());
    }

    #[test]
    fn duplicate_key_rejected_at_staging() {
        let store = store();
        commit_customer(&store, 1, "a");
        let mut txn = store.begin();
        let err = store
            .insert(&mut txn, "JPA_CUSTOMERS", 1, Row::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { key: 1, .. }));
    }

    #[test]
    fn unique_constraint() {
        let store = store();
        let mut txn = store.begin();
        store
            .insert(
                &mut txn,
                "JPA_CUSTOMERS",
                1,
                Row::new().with("EMAIL", "a@x"),
            )
            .unwrap();
        let err = store
            .insert(
                &mut txn,
                "JPA_CUSTOMERS",
                2,
                Row::new().with("EMAIL", "a@x"),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
        // NULLs never collide.
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 3, Row::new())
            .unwrap();
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 4, Row::new())
            .unwrap();
    }

    #[test]
    fn type_mismatch_rejected() {
        let store = store();
        let mut txn = store.begin();
        let err = store
            .insert(
                &mut txn,
                "JPA_CUSTOMERS",
                1,
                Row::new().with("AGE", "twelve"),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
    }

    #[test]
    fn unknown_column_rejected() {
        let store = store();
        let mut txn = store.begin();
        let err = store
            .insert(&mut txn, "JPA_CUSTOMERS", 1, Row::new().with("NOPE", 1i64))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[test]
    fn foreign_key_enforced_on_insert() {
        let store = store();
        let mut txn = store.begin();
        let err = store
            .insert(
                &mut txn,
                "JPA_ORDERS",
                1,
                Row::new().with("CUSTOMER_ID", 42i64),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey { key: 42, .. }));

        // Referencing a row staged in the same transaction is fine.
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 42, Row::new())
            .unwrap();
        store
            .insert(
                &mut txn,
                "JPA_ORDERS",
                1,
                Row::new().with("CUSTOMER_ID", 42i64),
            )
            .unwrap();
    }

    #[test]
    fn delete_with_referencing_rows_fails() {
        let store = store();
        let mut txn = store.begin();
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 1, Row::new())
            .unwrap();
        store
            .insert(
                &mut txn,
                "JPA_ORDERS",
                1,
                Row::new().with("CUSTOMER_ID", 1i64),
            )
            .unwrap();
        store.commit(txn).unwrap();

        let mut txn = store.begin();
        let err = store.delete(&mut txn, "JPA_CUSTOMERS", 1).unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey { .. }));

        // Deleting the referencing row first unblocks the parent.
        store.delete(&mut txn, "JPA_ORDERS", 1).unwrap();
        store.delete(&mut txn, "JPA_CUSTOMERS", 1).unwrap();
        store.commit(txn).unwrap();
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn delete_missing_row() {
        let store = store();
        let mut txn = store.begin();
        let err = store.delete(&mut txn, "JPA_CUSTOMERS", 9).unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound { .. }));
    }

    #[test]
    fn next_key_is_monotonic_and_survives_assigned_keys() {
        let store = store();
        assert_eq!(store.next_key("JPA_CUSTOMERS").unwrap(), 1);
        assert_eq!(store.next_key("JPA_CUSTOMERS").unwrap(), 2);

        commit_customer(&store, 10, "x");
        assert_eq!(store.next_key("JPA_CUSTOMERS").unwrap(), 11);
    }

    #[test]
    fn link_unlink_roundtrip() {
        let store = store();
        let mut txn = store.begin();
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 1, Row::new())
            .unwrap();
        store.insert(&mut txn, "JPA_ORDERS", 2, Row::new()).unwrap();
        store.link(&mut txn, "rel_item_category", 1, 2).unwrap();
        // Idempotent.
        store.link(&mut txn, "rel_item_category", 1, 2).unwrap();
        store.commit(txn).unwrap();

        assert_eq!(
            store.links("rel_item_category", JoinSide::Owner, 1).unwrap(),
            vec![2]
        );
        assert_eq!(
            store
                .links("rel_item_category", JoinSide::Target, 2)
                .unwrap(),
            vec![1]
        );

        let mut txn = store.begin();
        assert!(store.unlink(&mut txn, "rel_item_category", 1, 2).unwrap());
        assert!(!store.unlink(&mut txn, "rel_item_category", 1, 2).unwrap());
        store.commit(txn).unwrap();
        assert!(store
            .links("rel_item_category", JoinSide::Owner, 1)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn link_to_missing_row_fails() {
        let store = store();
        let mut txn = store.begin();
        let err = store.link(&mut txn, "rel_item_category", 1, 2).unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey { .. }));
    }

    #[test]
    fn delete_with_join_links_fails_until_unlinked() {
        let store = store();
        let mut txn = store.begin();
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 1, Row::new())
            .unwrap();
        store.insert(&mut txn, "JPA_ORDERS", 2, Row::new()).unwrap();
        store.link(&mut txn, "rel_item_category", 1, 2).unwrap();
        store.commit(txn).unwrap();

        let mut txn = store.begin();
        let err = store.delete(&mut txn, "JPA_CUSTOMERS", 1).unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey { .. }));

        let removed = store
            .unlink_all(&mut txn, "rel_item_category", JoinSide::Owner, 1)
            .unwrap();
        assert_eq!(removed, 1);
        store.delete(&mut txn, "JPA_CUSTOMERS", 1).unwrap();
        store.commit(txn).unwrap();
    }

    #[test]
    fn scan_in_txn_overlays_staged_writes() {
        let store = store();
        commit_customer(&store, 1, "a");
        commit_customer(&store, 2, "b");

        let mut txn = store.begin();
        store.delete(&mut txn, "JPA_CUSTOMERS", 1).unwrap();
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 3, Row::new().with("LAST_NAME", "c"))
            .unwrap();

        let committed: Vec<i64> = store
            .scan("JPA_CUSTOMERS")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(committed, vec![1, 2]);

        let visible: Vec<i64> = store
            .scan_in_txn(&txn, "JPA_CUSTOMERS")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(visible, vec![2, 3]);
    }

    #[test]
    fn commit_is_atomic_across_tables() {
        let store = store();
        let mut txn = store.begin();
        store
            .insert(&mut txn, "JPA_CUSTOMERS", 1, Row::new())
            .unwrap();
        store
            .insert(
                &mut txn,
                "JPA_ORDERS",
                1,
                Row::new().with("CUSTOMER_ID", 1i64),
            )
            .unwrap();
        store.commit(txn).unwrap();
        assert_eq!(store.row_count(), 2);
    }

    #[test]
    fn unknown_table_errors() {
        let store = store();
        assert!(matches!(
            store.get("NOPE", 1),
            Err(StoreError::UnknownTable { .. })
        ));
        assert!(!store.has_table("NOPE"));
        assert!(store.has_table("rel_item_category"));
    }

    #[test]
    fn duplicate_table_rejected() {
        let store = store();
        let err = store.create_table(&customers_spec()).unwrap_err();
        assert!(matches!(err, StoreError::TableExists { .. }));
    }
}
