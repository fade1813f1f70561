//! Demo domain fixtures and factory helpers.
//!
//! The domain mirrors a small web shop: customers with orders
//! (one-to-many), departments with managers (one-to-one), and items in
//! categories (many-to-many through a join table). Customers are
//! cacheable, items are versioned.

use relmap_core::{
    Config, CoreResult, Entity, EntityKey, PendingRef, Ref, SessionFactory,
};
use relmap_schema::{
    Association, Cascade, ColumnDef, ColumnType, EntityDescriptor, FetchPolicy, JoinTable,
    SchemaRegistry,
};
use relmap_store::{InMemoryStore, Row};
use std::sync::Arc;

/// A customer; the one side of customer/orders. Cacheable.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    /// Primary key, assigned at persist.
    pub id: Option<EntityKey>,
    /// Mapped to `LAST_NAME`.
    pub last_name: String,
    /// Mapped to `AGE`.
    pub age: i64,
}

impl Customer {
    /// Creates a transient customer.
    pub fn new(last_name: impl Into<String>, age: i64) -> Self {
        Self {
            id: None,
            last_name: last_name.into(),
            age,
        }
    }
}

impl Entity for Customer {
    const NAME: &'static str = "Customer";

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }

    fn to_row(&self) -> CoreResult<Row> {
        Ok(Row::new()
            .with("LAST_NAME", self.last_name.as_str())
            .with("AGE", self.age))
    }

    fn from_row(key: EntityKey, row: &Row) -> CoreResult<Self> {
        Ok(Self {
            id: Some(key),
            last_name: row
                .get_or_null("LAST_NAME")
                .as_text()
                .unwrap_or_default()
                .to_string(),
            age: row.get_or_null("AGE").as_integer().unwrap_or_default(),
        })
    }
}

/// An order; the many side of customer/orders.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Primary key, assigned at persist.
    pub id: Option<EntityKey>,
    /// Mapped to `ORDER_NAME`.
    pub order_name: String,
    /// Foreign key `CUSTOMER_ID`; does not cascade persist.
    pub customer: Ref<Customer>,
}

impl Order {
    /// Creates a transient order for a persistent customer.
    pub fn new(order_name: impl Into<String>, customer: EntityKey) -> Self {
        Self {
            id: None,
            order_name: order_name.into(),
            customer: Ref::to(customer),
        }
    }
}

impl Entity for Order {
    const NAME: &'static str = "Order";

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }

    fn to_row(&self) -> CoreResult<Row> {
        Ok(Row::new()
            .with("ORDER_NAME", self.order_name.as_str())
            .with("CUSTOMER_ID", self.customer.fk_value()?))
    }

    fn from_row(key: EntityKey, row: &Row) -> CoreResult<Self> {
        Ok(Self {
            id: Some(key),
            order_name: row
                .get_or_null("ORDER_NAME")
                .as_text()
                .unwrap_or_default()
                .to_string(),
            customer: Ref::from_fk_value(&row.get_or_null("CUSTOMER_ID"))?,
        })
    }

    fn visit_refs(
        &mut self,
        f: &mut dyn FnMut(&str, &mut dyn PendingRef) -> CoreResult<()>,
    ) -> CoreResult<()> {
        f("customer", &mut self.customer)
    }
}

/// A department; owning side of the department/manager one-to-one.
#[derive(Debug, Clone, PartialEq)]
pub struct Department {
    /// Primary key, assigned at persist.
    pub id: Option<EntityKey>,
    /// Mapped to `DEPT_NAME`.
    pub dept_name: String,
    /// Foreign key `MGR_ID`; cascades persist.
    pub manager: Ref<Manager>,
}

impl Department {
    /// Creates a transient department.
    pub fn new(dept_name: impl Into<String>, manager: Ref<Manager>) -> Self {
        Self {
            id: None,
            dept_name: dept_name.into(),
            manager,
        }
    }
}

impl Entity for Department {
    const NAME: &'static str = "Department";

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }

    fn to_row(&self) -> CoreResult<Row> {
        Ok(Row::new()
            .with("DEPT_NAME", self.dept_name.as_str())
            .with("MGR_ID", self.manager.fk_value()?))
    }

    fn from_row(key: EntityKey, row: &Row) -> CoreResult<Self> {
        Ok(Self {
            id: Some(key),
            dept_name: row
                .get_or_null("DEPT_NAME")
                .as_text()
                .unwrap_or_default()
                .to_string(),
            manager: Ref::from_fk_value(&row.get_or_null("MGR_ID"))?,
        })
    }

    fn visit_refs(
        &mut self,
        f: &mut dyn FnMut(&str, &mut dyn PendingRef) -> CoreResult<()>,
    ) -> CoreResult<()> {
        f("manager", &mut self.manager)
    }
}

/// A manager; non-owning side of the department/manager one-to-one.
#[derive(Debug, Clone, PartialEq)]
pub struct Manager {
    /// Primary key, assigned at persist.
    pub id: Option<EntityKey>,
    /// Mapped to `MGR_NAME`.
    pub mgr_name: String,
}

impl Manager {
    /// Creates a transient manager.
    pub fn new(mgr_name: impl Into<String>) -> Self {
        Self {
            id: None,
            mgr_name: mgr_name.into(),
        }
    }
}

impl Entity for Manager {
    const NAME: &'static str = "Manager";

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }

    fn to_row(&self) -> CoreResult<Row> {
        Ok(Row::new().with("MGR_NAME", self.mgr_name.as_str()))
    }

    fn from_row(key: EntityKey, row: &Row) -> CoreResult<Self> {
        Ok(Self {
            id: Some(key),
            mgr_name: row
                .get_or_null("MGR_NAME")
                .as_text()
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// An item; owning side of the item/category many-to-many. Versioned.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Primary key, assigned at persist.
    pub id: Option<EntityKey>,
    /// Mapped to `ITEM_NAME`.
    pub item_name: String,
    /// Mapped to `PRICE`.
    pub price: i64,
}

impl Item {
    /// Creates a transient item.
    pub fn new(item_name: impl Into<String>, price: i64) -> Self {
        Self {
            id: None,
            item_name: item_name.into(),
            price,
        }
    }
}

impl Entity for Item {
    const NAME: &'static str = "Item";

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }

    fn to_row(&self) -> CoreResult<Row> {
        Ok(Row::new()
            .with("ITEM_NAME", self.item_name.as_str())
            .with("PRICE", self.price))
    }

    fn from_row(key: EntityKey, row: &Row) -> CoreResult<Self> {
        Ok(Self {
            id: Some(key),
            item_name: row
                .get_or_null("ITEM_NAME")
                .as_text()
                .unwrap_or_default()
                .to_string(),
            price: row.get_or_null("PRICE").as_integer().unwrap_or_default(),
        })
    }
}

/// A category; non-owning side of the item/category many-to-many.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    /// Primary key, assigned at persist.
    pub id: Option<EntityKey>,
    /// Mapped to `CATEGORY_NAME`.
    pub category_name: String,
}

impl Category {
    /// Creates a transient category.
    pub fn new(category_name: impl Into<String>) -> Self {
        Self {
            id: None,
            category_name: category_name.into(),
        }
    }
}

impl Entity for Category {
    const NAME: &'static str = "Category";

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }

    fn to_row(&self) -> CoreResult<Row> {
        Ok(Row::new().with("CATEGORY_NAME", self.category_name.as_str()))
    }

    fn from_row(key: EntityKey, row: &Row) -> CoreResult<Self> {
        Ok(Self {
            id: Some(key),
            category_name: row
                .get_or_null("CATEGORY_NAME")
                .as_text()
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Builds the demo domain registry.
pub fn demo_registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .entity(
            EntityDescriptor::new("Customer", "JPA_CUSTOMERS")
                .column(ColumnDef::new("last_name", "LAST_NAME", ColumnType::Text).not_null())
                .column(ColumnDef::new("age", "AGE", ColumnType::Integer))
                .association(
                    Association::one_to_many("orders", "Order", "customer")
                        .cascade(Cascade::Remove),
                )
                .cacheable(),
        )
        .entity(
            EntityDescriptor::new("Order", "JPA_ORDERS")
                .column(ColumnDef::new("order_name", "ORDER_NAME", ColumnType::Text))
                .association(Association::many_to_one("customer", "Customer", "CUSTOMER_ID")),
        )
        .entity(
            EntityDescriptor::new("Department", "JPA_DEPARTMENTS")
                .column(ColumnDef::new("dept_name", "DEPT_NAME", ColumnType::Text))
                .association(
                    Association::one_to_one("manager", "Manager", "MGR_ID")
                        .cascade(Cascade::Persist),
                ),
        )
        .entity(
            EntityDescriptor::new("Manager", "JPA_MANAGERS")
                .column(ColumnDef::new("mgr_name", "MGR_NAME", ColumnType::Text))
                .association(
                    Association::one_to_one_mapped("department", "Department", "manager")
                        .fetch(FetchPolicy::Lazy),
                ),
        )
        .entity(
            EntityDescriptor::new("Item", "JPA_ITEMS")
                .column(ColumnDef::new("item_name", "ITEM_NAME", ColumnType::Text))
                .column(ColumnDef::new("price", "PRICE", ColumnType::Integer))
                .versioned("VERSION")
                .association(Association::many_to_many(
                    "categories",
                    "Category",
                    JoinTable::new("JPA_ITEM_CATEGORY", "ITEM_ID", "CATEGORY_ID"),
                )),
        )
        .entity(
            EntityDescriptor::new("Category", "JPA_CATEGORIES")
                .column(ColumnDef::new(
                    "category_name",
                    "CATEGORY_NAME",
                    ColumnType::Text,
                ))
                .association(Association::many_to_many_mapped(
                    "items",
                    "Item",
                    "categories",
                )),
        )
        .named_query("customer_by_id", "FROM Customer c WHERE c.id = ?1")
        .named_query(
            "customers_by_name",
            "FROM Customer c WHERE c.last_name LIKE ?1 ORDER BY c.last_name",
        )
        .build()
        .expect("demo registry is valid")
}

/// A factory over an in-memory store, for tests.
pub struct TestFactory {
    /// The factory under test.
    pub factory: SessionFactory,
}

impl TestFactory {
    /// Creates a factory with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a factory with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        let factory =
            SessionFactory::new(demo_registry(), Arc::new(InMemoryStore::new()), config)
                .expect("schema generation succeeds on an empty store");
        Self { factory }
    }
}

impl Default for TestFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestFactory {
    type Target = SessionFactory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

/// Runs a test against a fresh factory.
pub fn with_factory<F, R>(f: F) -> R
where
    F: FnOnce(&SessionFactory) -> R,
{
    let test_factory = TestFactory::new();
    f(&test_factory.factory)
}

/// Persists a few customers with orders and returns the customer keys.
///
/// Layout: devinkin (age 12) with orders `o-1`, `o-2`; linus (age 55)
/// with order `o-3`; grace (age 85) with none.
pub fn seed_customers(factory: &SessionFactory) -> Vec<EntityKey> {
    let mut session = factory.open_session();
    session.begin().expect("begin");
    let mut keys = Vec::new();
    for (name, age, orders) in [
        ("devinkin", 12, &["o-1", "o-2"][..]),
        ("linus", 55, &["o-3"][..]),
        ("grace", 85, &[][..]),
    ] {
        let mut customer = Customer::new(name, age);
        let key = session.persist(&mut customer).expect("persist customer");
        for order_name in orders {
            let mut order = Order::new(*order_name, key);
            session.persist(&mut order).expect("persist order");
        }
        keys.push(key);
    }
    session.commit().expect("commit seed data");
    keys
}
