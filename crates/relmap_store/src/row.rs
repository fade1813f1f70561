//! Row representation.

use relmap_schema::Value;
use std::collections::BTreeMap;

/// One table row: an ordered column-name to value map.
///
/// Columns absent from the map read as `Value::Null`; the store does not
/// distinguish a missing column from an explicit NULL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, consuming and returning the row (builder style).
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Returns a column value, or `None` if the column is absent.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Returns a column value, treating absence as NULL.
    #[must_use]
    pub fn get_or_null(&self, column: &str) -> Value {
        self.columns.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Removes a column, returning its previous value.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.columns.remove(column)
    }

    /// Iterates over (column, value) pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of stored columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if no columns are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let row = Row::new().with("LAST_NAME", "devinkin").with("AGE", 12i64);
        assert_eq!(row.get("LAST_NAME"), Some(&Value::Text("devinkin".into())));
        assert_eq!(row.get("AGE"), Some(&Value::Integer(12)));
        assert_eq!(row.get("EMAIL"), None);
        assert_eq!(row.get_or_null("EMAIL"), Value::Null);
    }

    #[test]
    fn overwrite_keeps_last() {
        let mut row = Row::new().with("AGE", 1i64);
        row.set("AGE", 2i64);
        assert_eq!(row.get_or_null("AGE"), Value::Integer(2));
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn iteration_is_column_ordered() {
        let row = Row::new().with("B", 2i64).with("A", 1i64);
        let cols: Vec<&str> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(cols, vec!["A", "B"]);
    }
}
