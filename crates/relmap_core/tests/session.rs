//! Integration tests for the session lifecycle.

use relmap_core::{CoreError, EntityKey, Ref};
use relmap_testkit::prelude::*;

#[test]
fn persist_find_commit_roundtrip() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer = Customer::new("devinkin", 12);
    let key = session.persist(&mut customer).unwrap();
    assert_eq!(customer.id, Some(key));
    session.commit().unwrap();

    let mut other = factory.open_session();
    let found: Customer = other.find(key).unwrap().expect("committed row");
    assert_eq!(found.last_name, "devinkin");
    assert_eq!(found.age, 12);
}

#[test]
fn persisted_entity_is_visible_before_commit() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer = Customer::new("devinkin", 12);
    let key = session.persist(&mut customer).unwrap();

    // Same session sees it through the identity map.
    assert!(session.find::<Customer>(key).unwrap().is_some());
    assert!(session.contains(&customer));

    // Other sessions do not until commit.
    let mut other = factory.open_session();
    assert!(other.find::<Customer>(key).unwrap().is_none());
}

#[test]
fn mutating_operations_require_a_transaction() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    let mut customer = Customer::new("devinkin", 12);
    assert!(matches!(
        session.persist(&mut customer),
        Err(CoreError::TransactionRequired)
    ));
    assert!(matches!(session.flush(), Err(CoreError::TransactionRequired)));
    assert!(matches!(session.commit(), Err(CoreError::TransactionRequired)));
    assert!(matches!(session.rollback(), Err(CoreError::TransactionRequired)));
}

#[test]
fn begin_twice_is_an_error() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    assert!(matches!(session.begin(), Err(CoreError::TransactionActive)));
}

#[test]
fn persist_rejects_preset_keys_under_auto_strategy() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer = Customer::new("devinkin", 12);
    customer.id = Some(EntityKey::new(42));
    assert!(matches!(
        session.persist(&mut customer),
        Err(CoreError::IllegalState { .. })
    ));
}

#[test]
fn updates_are_explicit() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();

    let mut customer: Customer = session.find(keys[0]).unwrap().unwrap();
    customer.age = 13;
    // Not reported to the session yet; commit writes nothing.
    session.commit().unwrap();
    let mut other = factory.open_session();
    assert_eq!(other.find::<Customer>(keys[0]).unwrap().unwrap().age, 12);

    session.begin().unwrap();
    session.update(&customer).unwrap();
    session.commit().unwrap();
    let mut third = factory.open_session();
    assert_eq!(third.find::<Customer>(keys[0]).unwrap().unwrap().age, 13);
}

#[test]
fn update_of_unmanaged_entity_is_an_error() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let detached = Customer {
        id: Some(keys[0]),
        last_name: "devinkin".into(),
        age: 99,
    };
    assert!(matches!(
        session.update(&detached),
        Err(CoreError::IllegalState { .. })
    ));
}

#[test]
fn remove_is_cascaded_to_orders() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();

    let customer: Customer = session.find(keys[0]).unwrap().unwrap();
    let orders: Vec<Order> = session.related::<Customer, Order>(keys[0], "orders").unwrap();
    assert_eq!(orders.len(), 2);

    session.remove(&customer).unwrap();
    session.commit().unwrap();

    let mut other = factory.open_session();
    assert!(other.find::<Customer>(keys[0]).unwrap().is_none());
    for order in &orders {
        assert!(other.find::<Order>(order.id.unwrap()).unwrap().is_none());
    }
    // The other customers survived.
    assert!(other.find::<Customer>(keys[1]).unwrap().is_some());
}

#[test]
fn remove_of_detached_or_transient_is_an_error() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();

    let transient = Customer::new("nobody", 1);
    assert!(matches!(
        session.remove(&transient),
        Err(CoreError::IllegalState { .. })
    ));

    let detached = Customer {
        id: Some(keys[0]),
        last_name: "devinkin".into(),
        age: 12,
    };
    assert!(matches!(
        session.remove(&detached),
        Err(CoreError::IllegalState { .. })
    ));
}

#[test]
fn persist_then_remove_before_flush_writes_nothing() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer = Customer::new("ephemeral", 1);
    let key = session.persist(&mut customer).unwrap();
    session.remove(&customer).unwrap();
    session.commit().unwrap();

    let mut other = factory.open_session();
    assert!(other.find::<Customer>(key).unwrap().is_none());
}

#[test]
fn removed_entity_is_invisible_to_find_before_commit() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let customer: Customer = session.find(keys[2]).unwrap().unwrap();
    session.remove(&customer).unwrap();
    assert!(session.find::<Customer>(keys[2]).unwrap().is_none());
}

#[test]
fn rollback_discards_staged_writes_and_detaches() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer = Customer::new("devinkin", 12);
    let key = session.persist(&mut customer).unwrap();
    session.flush().unwrap();
    session.rollback().unwrap();

    assert!(!session.contains(&customer));
    let mut other = factory.open_session();
    assert!(other.find::<Customer>(key).unwrap().is_none());
}

#[test]
fn foreign_key_violations_surface_at_flush() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut order = Order::new("orphan", EntityKey::new(999));
    session.persist(&mut order).unwrap();
    let err = session.flush().unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn merge_of_transient_behaves_like_persist() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let managed = session.merge(&Customer::new("devinkin", 12)).unwrap();
    let key = managed.id.expect("merge assigned a key");
    session.commit().unwrap();

    let mut other = factory.open_session();
    assert!(other.find::<Customer>(key).unwrap().is_some());
}

#[test]
fn merge_of_detached_copy_updates_the_row() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);

    // Detached copy, modified outside any session.
    let detached = Customer {
        id: Some(keys[0]),
        last_name: "devinkin".into(),
        age: 21,
    };
    let mut session = factory.open_session();
    session.begin().unwrap();
    let managed = session.merge(&detached).unwrap();
    assert_eq!(managed.age, 21);
    session.commit().unwrap();

    let mut other = factory.open_session();
    assert_eq!(other.find::<Customer>(keys[0]).unwrap().unwrap().age, 21);
}

#[test]
fn merge_overwrites_an_already_loaded_entity() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let _loaded: Customer = session.find(keys[0]).unwrap().unwrap();

    let detached = Customer {
        id: Some(keys[0]),
        last_name: "renamed".into(),
        age: 12,
    };
    session.merge(&detached).unwrap();
    session.commit().unwrap();

    let mut other = factory.open_session();
    assert_eq!(
        other.find::<Customer>(keys[0]).unwrap().unwrap().last_name,
        "renamed"
    );
}

#[test]
fn merge_of_vanished_row_inserts_with_a_fresh_key() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let customer: Customer = session.find(keys[2]).unwrap().unwrap();
    session.remove(&customer).unwrap();
    session.commit().unwrap();

    let mut other = factory.open_session();
    other.begin().unwrap();
    let merged = other.merge(&customer).unwrap();
    let new_key = merged.id.unwrap();
    assert_ne!(new_key, keys[2]);
    other.commit().unwrap();

    let mut third = factory.open_session();
    assert!(third.find::<Customer>(keys[2]).unwrap().is_none());
    assert_eq!(
        third.find::<Customer>(new_key).unwrap().unwrap().last_name,
        "grace"
    );
}

#[test]
fn pending_reference_cascades_persist() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut department =
        Department::new("engineering", Ref::pending(Manager::new("margaret")));
    let dept_key = session.persist(&mut department).unwrap();
    // The cascade collapsed the reference to a key.
    let mgr_key = department.manager.key().expect("manager persisted");
    session.commit().unwrap();

    let mut other = factory.open_session();
    let dept: Department = other.find(dept_key).unwrap().unwrap();
    assert_eq!(dept.manager.key(), Some(mgr_key));
    let manager: Manager = other.resolve(&dept.manager).unwrap().unwrap();
    assert_eq!(manager.mgr_name, "margaret");
}

#[test]
fn pending_reference_without_cascade_is_an_error() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut order = Order {
        id: None,
        order_name: "o-x".into(),
        customer: Ref::pending(Customer::new("devinkin", 12)),
    };
    assert!(matches!(
        session.persist(&mut order),
        Err(CoreError::IllegalState { .. })
    ));
}

#[test]
fn one_to_one_navigates_both_directions() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut department =
        Department::new("research", Ref::pending(Manager::new("grace")));
    let dept_key = session.persist(&mut department).unwrap();
    let mgr_key = department.manager.key().unwrap();
    session.commit().unwrap();

    let mut other = factory.open_session();
    let managers: Vec<Manager> = other
        .related::<Department, Manager>(dept_key, "manager")
        .unwrap();
    assert_eq!(managers.len(), 1);

    let departments: Vec<Department> = other
        .related::<Manager, Department>(mgr_key, "department")
        .unwrap();
    assert_eq!(departments.len(), 1);
    assert_eq!(departments[0].id, Some(dept_key));
}

#[test]
fn many_to_many_link_and_unlink() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut item = Item::new("keyboard", 120);
    let mut gadgets = Category::new("gadgets");
    let mut office = Category::new("office");
    let item_key = session.persist(&mut item).unwrap();
    let gadgets_key = session.persist(&mut gadgets).unwrap();
    let office_key = session.persist(&mut office).unwrap();
    session.flush().unwrap();
    session.link::<Item>(item_key, "categories", gadgets_key).unwrap();
    session.link::<Item>(item_key, "categories", office_key).unwrap();
    session.commit().unwrap();

    let mut other = factory.open_session();
    let categories: Vec<Category> = other
        .related::<Item, Category>(item_key, "categories")
        .unwrap();
    assert_eq!(categories.len(), 2);

    // Navigable from the mapped side too.
    let items: Vec<Item> = other.related::<Category, Item>(gadgets_key, "items").unwrap();
    assert_eq!(items.len(), 1);

    other.begin().unwrap();
    assert!(other
        .unlink::<Item>(item_key, "categories", office_key)
        .unwrap());
    other.commit().unwrap();

    let mut third = factory.open_session();
    let categories: Vec<Category> = third
        .related::<Item, Category>(item_key, "categories")
        .unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].id, Some(gadgets_key));
}

#[test]
fn removing_a_linked_entity_drops_its_links() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut item = Item::new("keyboard", 120);
    let mut category = Category::new("gadgets");
    let item_key = session.persist(&mut item).unwrap();
    let category_key = session.persist(&mut category).unwrap();
    session.flush().unwrap();
    session.link::<Item>(item_key, "categories", category_key).unwrap();
    session.commit().unwrap();

    session.begin().unwrap();
    let category: Category = session.find(category_key).unwrap().unwrap();
    session.remove(&category).unwrap();
    session.commit().unwrap();

    let mut other = factory.open_session();
    let categories: Vec<Category> = other
        .related::<Item, Category>(item_key, "categories")
        .unwrap();
    assert!(categories.is_empty());
    assert!(other.find::<Item>(item_key).unwrap().is_some());
}

#[test]
fn refresh_discards_pending_changes() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer: Customer = session.find(keys[0]).unwrap().unwrap();
    customer.age = 99;
    session.update(&customer).unwrap();

    session.refresh(&mut customer).unwrap();
    assert_eq!(customer.age, 12);
    session.commit().unwrap();

    let mut other = factory.open_session();
    assert_eq!(other.find::<Customer>(keys[0]).unwrap().unwrap().age, 12);
}

#[test]
fn refresh_of_a_deleted_row_is_not_found() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    let mut customer: Customer = session.find(keys[2]).unwrap().unwrap();

    let mut other = factory.open_session();
    other.begin().unwrap();
    let doomed: Customer = other.find(keys[2]).unwrap().unwrap();
    other.remove(&doomed).unwrap();
    other.commit().unwrap();

    assert!(matches!(
        session.refresh(&mut customer),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn stale_update_fails_with_version_conflict() {
    let factory = TestFactory::new();
    let mut setup = factory.open_session();
    setup.begin().unwrap();
    let mut item = Item::new("keyboard", 120);
    let key = setup.persist(&mut item).unwrap();
    setup.commit().unwrap();

    // First session loads version 1, without opening a transaction.
    let mut stale = factory.open_session();
    let mut stale_item: Item = stale.find(key).unwrap().unwrap();

    // Second session commits a concurrent change, bumping the version.
    let mut fresh = factory.open_session();
    fresh.begin().unwrap();
    let mut fresh_item: Item = fresh.find(key).unwrap().unwrap();
    fresh_item.price = 150;
    fresh.update(&fresh_item).unwrap();
    fresh.commit().unwrap();

    stale.begin().unwrap();
    stale_item.price = 99;
    stale.update(&stale_item).unwrap();
    let err = stale.flush().unwrap_err();
    assert!(matches!(err, CoreError::StaleState { .. }));
}

#[test]
fn second_level_cache_serves_repeat_finds() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    factory.evict_all();
    let baseline = factory.cache().stats();

    let mut first = factory.open_session();
    let _: Customer = first.find(keys[0]).unwrap().unwrap();
    let mut second = factory.open_session();
    let _: Customer = second.find(keys[0]).unwrap().unwrap();

    let stats = factory.cache().stats();
    assert_eq!(stats.hits, baseline.hits + 1);
    assert!(stats.puts > baseline.puts);
}

#[test]
fn commit_republishes_cacheable_snapshots() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);

    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer: Customer = session.find(keys[0]).unwrap().unwrap();
    customer.age = 40;
    session.update(&customer).unwrap();
    session.commit().unwrap();

    // A fresh session is served the new snapshot from the cache.
    let mut other = factory.open_session();
    assert_eq!(other.find::<Customer>(keys[0]).unwrap().unwrap().age, 40);
    assert!(factory.cache().contains("Customer", keys[0].as_i64()));
}

#[test]
fn uncacheable_entities_stay_out_of_the_cache() {
    let factory = TestFactory::new();
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut order_owner = Customer::new("devinkin", 12);
    let owner_key = session.persist(&mut order_owner).unwrap();
    let mut order = Order::new("o-1", owner_key);
    let order_key = session.persist(&mut order).unwrap();
    session.commit().unwrap();

    let mut other = factory.open_session();
    let _: Order = other.find(order_key).unwrap().unwrap();
    assert!(!factory.cache().contains("Order", order_key.as_i64()));
}

#[test]
fn eager_to_one_loads_the_target_alongside() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    let orders: Vec<Order> = session.related::<Customer, Order>(keys[0], "orders").unwrap();
    factory.evict_all();

    // Order.customer is eager: finding the order pulls the customer into
    // the session and, being cacheable, into the second-level cache.
    let mut fresh = factory.open_session();
    let _: Order = fresh.find(orders[0].id.unwrap()).unwrap().unwrap();
    assert!(factory.cache().contains("Customer", keys[0].as_i64()));
}

#[test]
fn get_reference_resolves_lazily() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();

    let reference: Ref<Customer> = session.get_reference(keys[0]);
    assert_eq!(reference.key(), Some(keys[0]));
    let customer = session.resolve(&reference).unwrap().unwrap();
    assert_eq!(customer.last_name, "devinkin");

    let dangling: Ref<Customer> = session.get_reference(EntityKey::new(12345));
    assert!(session.resolve(&dangling).unwrap().is_none());
}

#[test]
fn closed_sessions_reject_everything() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.close();
    assert!(matches!(
        session.find::<Customer>(keys[0]),
        Err(CoreError::SessionClosed)
    ));
    assert!(matches!(session.begin(), Err(CoreError::SessionClosed)));
}

#[test]
fn detach_forgets_pending_changes_to_one_entity() {
    let factory = TestFactory::new();
    let keys = seed_customers(&factory);
    let mut session = factory.open_session();
    session.begin().unwrap();
    let mut customer: Customer = session.find(keys[0]).unwrap().unwrap();
    customer.age = 77;
    session.update(&customer).unwrap();
    session.detach(&customer);
    assert!(!session.contains(&customer));
    session.commit().unwrap();

    let mut other = factory.open_session();
    assert_eq!(other.find::<Customer>(keys[0]).unwrap().unwrap().age, 12);
}
