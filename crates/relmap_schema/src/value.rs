//! Dynamic column value type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The set of column types a mapped field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Boolean column.
    Bool,
    /// Signed 64-bit integer column.
    Integer,
    /// UTF-8 text column.
    Text,
    /// Raw byte column.
    Bytes,
    /// Point-in-time column, stored as milliseconds since the Unix epoch.
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Timestamp => "timestamp",
        };
        write!(f, "{name}")
    }
}

/// A dynamic column value.
///
/// `Value` is the unit of data exchanged between entities, rows, and the
/// query executor. Floats are intentionally not supported: they have no
/// total order and no canonical equality, which predicate evaluation and
/// unique-constraint checks both rely on.
///
/// The derived `Ord` gives the total order used by `ORDER BY` and range
/// predicates: `Null` sorts before everything, values of different types
/// compare by type tag, and values of the same type compare naturally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
}

impl Value {
    /// Returns true if this is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean value, if this is a `Bool`.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an `Integer`.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the text value, if this is a `Text`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the byte value, if this is a `Bytes`.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the timestamp value, if this is a `Timestamp`.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<i64> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the column type of this value, or `None` for `Null`.
    #[must_use]
    pub const fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ColumnType::Bool),
            Self::Integer(_) => Some(ColumnType::Integer),
            Self::Text(_) => Some(ColumnType::Text),
            Self::Bytes(_) => Some(ColumnType::Bytes),
            Self::Timestamp(_) => Some(ColumnType::Timestamp),
        }
    }

    /// Returns true if this value can be stored in a column of `ty`.
    ///
    /// `Null` is compatible with every column type; nullability is checked
    /// separately against the column definition.
    #[must_use]
    pub fn compatible_with(&self, ty: ColumnType) -> bool {
        match self.column_type() {
            None => true,
            Some(own) => own == ty,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Bytes(b) => write!(f, "x'{}'", b.len()),
            Self::Timestamp(t) => write!(f, "@{t}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn null_sorts_first() {
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Null < Value::Integer(i64::MIN));
        assert!(Value::Null < Value::Text(String::new()));
    }

    #[test]
    fn same_type_orders_naturally() {
        assert!(Value::Integer(1) < Value::Integer(2));
        assert!(Value::Integer(-5) < Value::Integer(0));
        assert!(Value::Text("a".into()) < Value::Text("b".into()));
        assert!(Value::Timestamp(100) < Value::Timestamp(200));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Integer(7).as_integer(), Some(7));
        assert_eq!(Value::Text("x".into()).as_text(), Some("x"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(7).as_text(), None);
        assert!(Value::Null.is_null());
    }

    #[test]
    fn type_compatibility() {
        assert!(Value::Integer(1).compatible_with(ColumnType::Integer));
        assert!(!Value::Integer(1).compatible_with(ColumnType::Text));
        assert!(Value::Null.compatible_with(ColumnType::Text));
        assert!(Value::Null.compatible_with(ColumnType::Bytes));
    }

    #[test]
    fn serde_round_trip() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Integer(-42),
            Value::Text("devinkin".into()),
            Value::Bytes(vec![0, 1, 2]),
            Value::Timestamp(1_700_000_000_000),
        ] {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn option_conversion() {
        let some: Value = Some("hi").into();
        assert_eq!(some, Value::Text("hi".into()));
        let none: Value = Option::<i64>::None.into();
        assert_eq!(none, Value::Null);
    }

    proptest! {
        #[test]
        fn integer_order_matches_i64(a in any::<i64>(), b in any::<i64>()) {
            let va = Value::Integer(a);
            let vb = Value::Integer(b);
            prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        }

        #[test]
        fn ordering_is_total(a in any::<i64>(), s in ".*") {
            // Values of different types must compare consistently both ways.
            let int = Value::Integer(a);
            let text = Value::Text(s);
            prop_assert_eq!(int.cmp(&text), text.cmp(&int).reverse());
        }
    }
}
