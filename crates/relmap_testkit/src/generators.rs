//! Property-based test generators.

use crate::fixtures::{Customer, Item};
use proptest::prelude::*;
use relmap_schema::Value;
use relmap_store::Row;

/// Strategy for plausible last names.
pub fn last_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z]{2,11}").expect("valid regex")
}

/// Strategy for any column value, including NULL.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-zA-Z0-9 ]{0,24}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        any::<i64>().prop_map(Value::Timestamp),
    ]
}

/// Strategy for rows over upper-case column names.
pub fn row_strategy() -> impl Strategy<Value = Row> {
    prop::collection::btree_map("[A-Z][A-Z_]{0,9}", value_strategy(), 0..6)
        .prop_map(|columns| columns.into_iter().collect())
}

/// Strategy for transient customers.
pub fn customer_strategy() -> impl Strategy<Value = Customer> {
    (last_name_strategy(), 0i64..120).prop_map(|(last_name, age)| Customer {
        id: None,
        last_name,
        age,
    })
}

/// Strategy for transient items.
pub fn item_strategy() -> impl Strategy<Value = Item> {
    ("[a-z]{3,12}", 1i64..10_000).prop_map(|(item_name, price)| Item {
        id: None,
        item_name,
        price,
    })
}
