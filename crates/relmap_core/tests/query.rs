//! Integration tests for the query language and caches.

use relmap_core::{CoreError, QueryHint};
use relmap_schema::Value;
use relmap_testkit::prelude::*;

#[test]
fn from_shorthand_selects_every_row_in_key_order() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();
    let customers: Vec<Customer> = session.query("FROM Customer").result_list().unwrap();
    let names: Vec<&str> = customers.iter().map(|c| c.last_name.as_str()).collect();
    assert_eq!(names, ["devinkin", "linus", "grace"]);
}

#[test]
fn where_clause_filters_on_comparisons() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let seniors: Vec<Customer> = session
        .query("FROM Customer c WHERE c.age > 50")
        .result_list()
        .unwrap();
    assert_eq!(seniors.len(), 2);

    let not_linus: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name <> 'linus'")
        .result_list()
        .unwrap();
    assert_eq!(not_linus.len(), 2);

    let exact: Vec<Customer> = session
        .query("FROM Customer c WHERE c.age = 55")
        .result_list()
        .unwrap();
    assert_eq!(exact[0].last_name, "linus");
}

#[test]
fn string_literals_match_non_ascii_text() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer = Customer::new("café", 30);
    session.persist(&mut customer).unwrap();
    session.commit().unwrap();

    let found: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name = 'café'")
        .result_list()
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].last_name, "café");

    let prefixed: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name LIKE 'caf%'")
        .result_list()
        .unwrap();
    assert_eq!(prefixed.len(), 1);
}

#[test]
fn connectives_combine_predicates() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let both: Vec<Customer> = session
        .query("FROM Customer c WHERE c.age > 10 AND c.age < 60")
        .result_list()
        .unwrap();
    assert_eq!(both.len(), 2);

    let either: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name = 'grace' OR c.age <= 12")
        .result_list()
        .unwrap();
    assert_eq!(either.len(), 2);

    let negated: Vec<Customer> = session
        .query("FROM Customer c WHERE NOT (c.age > 50)")
        .result_list()
        .unwrap();
    assert_eq!(negated.len(), 1);
    assert_eq!(negated[0].last_name, "devinkin");
}

#[test]
fn like_matches_wildcards() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let g_names: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name LIKE 'g%'")
        .result_list()
        .unwrap();
    assert_eq!(g_names.len(), 1);
    assert_eq!(g_names[0].last_name, "grace");

    let single: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name LIKE '_inus'")
        .result_list()
        .unwrap();
    assert_eq!(single.len(), 1);

    let rest: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name NOT LIKE '%in%'")
        .result_list()
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].last_name, "grace");
}

#[test]
fn null_checks_are_explicit() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let missing_age: Vec<Customer> = session
        .query("FROM Customer c WHERE c.age IS NULL")
        .result_list()
        .unwrap();
    assert!(missing_age.is_empty());

    let with_age: Vec<Customer> = session
        .query("FROM Customer c WHERE c.age IS NOT NULL")
        .result_list()
        .unwrap();
    assert_eq!(with_age.len(), 3);

    // Comparisons against NULL never match.
    let none: Vec<Customer> = session
        .query("FROM Customer c WHERE c.age > ?1")
        .bind(1, Value::Null)
        .result_list()
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn order_by_sorts_descending_and_ascending() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let by_age_desc: Vec<Customer> = session
        .query("FROM Customer c ORDER BY c.age DESC")
        .result_list()
        .unwrap();
    let ages: Vec<i64> = by_age_desc.iter().map(|c| c.age).collect();
    assert_eq!(ages, [85, 55, 12]);

    let by_name: Vec<Customer> = session
        .query("FROM Customer c ORDER BY c.last_name")
        .result_list()
        .unwrap();
    assert_eq!(by_name[0].last_name, "devinkin");
    assert_eq!(by_name[2].last_name, "linus");
}

#[test]
fn positional_and_named_parameters_bind() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let positional: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name = ?1")
        .bind(1, "linus")
        .result_list()
        .unwrap();
    assert_eq!(positional.len(), 1);

    let named: Vec<Customer> = session
        .query("FROM Customer c WHERE c.age >= :min AND c.age <= :max")
        .bind_named("min", 50)
        .bind_named("max", 90)
        .result_list()
        .unwrap();
    assert_eq!(named.len(), 2);

    // Bare `?` parameters number themselves left to right.
    let bare: Vec<Customer> = session
        .query("FROM Customer c WHERE c.last_name = ? OR c.age = ?")
        .bind(1, "grace")
        .bind(2, 12)
        .result_list()
        .unwrap();
    assert_eq!(bare.len(), 2);
}

#[test]
fn unbound_parameters_are_reported() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();
    let err = session
        .query("FROM Customer c WHERE c.age > :min")
        .result_list::<Customer>()
        .unwrap_err();
    assert!(matches!(err, CoreError::UnboundParameter { .. }));
}

#[test]
fn unknown_fields_and_parse_errors_are_reported() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let err = session
        .query("FROM Customer c WHERE c.nme = 'x'")
        .result_list::<Customer>()
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::UnknownField { ref entity, ref field } if entity == "Customer" && field == "nme"
    ));

    let err = session
        .query("FROM Customer WHERE age >")
        .result_list::<Customer>()
        .unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }));
}

#[test]
fn single_result_insists_on_exactly_one() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let grace: Customer = session
        .query("FROM Customer c WHERE c.last_name = 'grace'")
        .single_result()
        .unwrap();
    assert_eq!(grace.age, 85);

    let err = session
        .query("FROM Customer c WHERE c.age > 200")
        .single_result::<Customer>()
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));

    let err = session
        .query("FROM Customer c WHERE c.age > 50")
        .single_result::<Customer>()
        .unwrap_err();
    assert!(matches!(err, CoreError::NonUnique { count: 2, .. }));
}

#[test]
fn projections_return_values_instead_of_entities() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let rows = session
        .query("SELECT c.last_name, c.age FROM Customer c ORDER BY c.age")
        .projection_list()
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec![Value::from("devinkin"), Value::from(12i64)]);

    let names = session
        .query("SELECT c.last_name FROM Customer c WHERE c.age > 50 ORDER BY c.last_name")
        .scalar_list()
        .unwrap();
    assert_eq!(names, vec![Value::from("grace"), Value::from("linus")]);

    // Entity hydration from a field projection is refused.
    let err = session
        .query("SELECT c.last_name FROM Customer c")
        .result_list::<Customer>()
        .unwrap_err();
    assert!(matches!(err, CoreError::IllegalState { .. }));
}

#[test]
fn named_queries_come_from_the_registry() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();

    let customer: Customer = session
        .named_query("customer_by_id")
        .unwrap()
        .bind(1, keys[1])
        .single_result()
        .unwrap();
    assert_eq!(customer.last_name, "linus");

    let matches: Vec<Customer> = session
        .named_query("customers_by_name")
        .unwrap()
        .bind(1, "%in%")
        .result_list()
        .unwrap();
    assert_eq!(matches.len(), 2);

    assert!(matches!(
        session.named_query("no_such_query"),
        Err(CoreError::UnknownQuery { .. })
    ));
}

#[test]
fn native_queries_address_tables_and_columns() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();

    let grace: Vec<Customer> = session
        .native_query("FROM JPA_CUSTOMERS WHERE LAST_NAME = 'grace'")
        .result_list()
        .unwrap();
    assert_eq!(grace.len(), 1);

    let ages = session
        .native_query("SELECT AGE FROM JPA_CUSTOMERS ORDER BY AGE DESC")
        .scalar_list()
        .unwrap();
    assert_eq!(ages, vec![Value::from(85i64), Value::from(55i64), Value::from(12i64)]);
}

#[test]
fn queries_see_pending_writes_through_auto_flush() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer = Customer::new("ada", 36);
    session.persist(&mut customer).unwrap();

    let all: Vec<Customer> = session.query("FROM Customer").result_list().unwrap();
    assert_eq!(all.len(), 4);

    let mut loaded: Customer = session
        .query("FROM Customer c WHERE c.last_name = 'linus'")
        .single_result()
        .unwrap();
    loaded.age = 56;
    session.update(&loaded).unwrap();
    let bumped: Vec<Customer> = session
        .query("FROM Customer c WHERE c.age = 56")
        .result_list()
        .unwrap();
    assert_eq!(bumped.len(), 1);
    session.rollback().unwrap();
}

#[test]
fn hinted_queries_are_cached_until_the_entity_changes() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let baseline = factory.query_cache_stats();

    let mut first = factory.open_session();
    let _: Vec<Customer> = first
        .query("FROM Customer c WHERE c.age > 50")
        .hint(QueryHint::Cacheable)
        .result_list()
        .unwrap();
    let after_first = factory.query_cache_stats();
    assert_eq!(after_first.puts, baseline.puts + 1);

    let mut second = factory.open_session();
    let _: Vec<Customer> = second
        .query("FROM Customer c WHERE c.age > 50")
        .hint(QueryHint::Cacheable)
        .result_list()
        .unwrap();
    let after_second = factory.query_cache_stats();
    assert_eq!(after_second.hits, after_first.hits + 1);

    // A committed write to Customer drops the cached results.
    let mut writer = factory.open_session();
    writer.begin().unwrap();
    let mut customer: Customer = writer.find(keys[0]).unwrap().unwrap();
    customer.age = 13;
    writer.update(&customer).unwrap();
    writer.commit().unwrap();

    let mut third = factory.open_session();
    let _: Vec<Customer> = third
        .query("FROM Customer c WHERE c.age > 50")
        .hint(QueryHint::Cacheable)
        .result_list()
        .unwrap();
    let after_third = factory.query_cache_stats();
    assert_eq!(after_third.misses, after_second.misses + 1);
}

#[test]
fn unhinted_queries_bypass_the_result_cache() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let baseline = factory.query_cache_stats();
    let mut session = factory.open_session();
    let _: Vec<Customer> = session.query("FROM Customer").result_list().unwrap();
    assert_eq!(factory.query_cache_stats().puts, baseline.puts);
}

#[test]
fn bulk_update_rewrites_matching_rows() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    // Pull one entity into the session to observe detachment.
    let devinkin: Customer = session.find(keys[0]).unwrap().unwrap();

    let touched = session
        .query("UPDATE Customer c SET c.age = ?1 WHERE c.age < :cutoff")
        .bind(1, 18)
        .bind_named("cutoff", 60)
        .execute_update()
        .unwrap();
    assert_eq!(touched, 2);
    assert!(!session.contains(&devinkin));
    session.commit().unwrap();

    let mut other = factory.open_session();
    assert_eq!(other.find::<Customer>(keys[0]).unwrap().unwrap().age, 18);
    assert_eq!(other.find::<Customer>(keys[1]).unwrap().unwrap().age, 18);
    assert_eq!(other.find::<Customer>(keys[2]).unwrap().unwrap().age, 85);
}

#[test]
fn bulk_update_skips_the_version_column() {
    let factory = TestFactory::new();
    let mut setup = factory.open_session();
    setup.begin().unwrap();
    let mut item = Item::new("keyboard", 120);
    let key = setup.persist(&mut item).unwrap();
    setup.commit().unwrap();

    let mut session = factory.open_session();
    session.begin().unwrap();
    let touched = session
        .query("UPDATE Item i SET i.price = 99")
        .execute_update()
        .unwrap();
    assert_eq!(touched, 1);
    session.commit().unwrap();

    let mut other = factory.open_session();
    let versions = other
        .native_query("SELECT VERSION FROM JPA_ITEMS WHERE ID = ?1")
        .bind(1, key)
        .scalar_list()
        .unwrap();
    assert_eq!(versions, vec![Value::from(1i64)]);
}

#[test]
fn bulk_update_cannot_assign_the_key() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let err = session
        .query("UPDATE Customer c SET c.id = 1")
        .execute_update()
        .unwrap_err();
    assert!(matches!(err, CoreError::IllegalState { .. }));
}

#[test]
fn bulk_delete_removes_matching_rows() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let removed = session.query("DELETE FROM Order").execute_update().unwrap();
    assert_eq!(removed, 3);
    session.commit().unwrap();

    let mut other = factory.open_session();
    let orders: Vec<Order> = other.related::<Customer, Order>(keys[0], "orders").unwrap();
    assert!(orders.is_empty());
    assert!(other.find::<Customer>(keys[0]).unwrap().is_some());
}

#[test]
fn bulk_statements_require_a_transaction() {
    let factory = TestFactory::new();
    seed_customers(&factory);
    let mut session = factory.open_session();
    let err = session
        .query("DELETE FROM Order")
        .execute_update()
        .unwrap_err();
    assert!(matches!(err, CoreError::TransactionRequired));
}
