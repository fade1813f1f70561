//! # relmap Schema
//!
//! Entity mapping metadata for relmap.
//!
//! This crate defines the static half of the mapper: column values and
//! their canonical ordering, column and association mappings, entity
//! descriptors, and the registry that validates the whole schema once at
//! startup. Nothing here touches a backing store; descriptors are plain
//! data consumed by `relmap_store` (schema generation) and `relmap_core`
//! (session and query execution).
//!
//! ## Example
//!
//! ```
//! use relmap_schema::{
//!     Association, ColumnDef, ColumnType, EntityDescriptor, SchemaRegistry,
//! };
//!
//! let registry = SchemaRegistry::builder()
//!     .entity(
//!         EntityDescriptor::new("Customer", "JPA_CUSTOMERS")
//!             .column(ColumnDef::new("last_name", "LAST_NAME", ColumnType::Text))
//!             .column(ColumnDef::new("age", "AGE", ColumnType::Integer))
//!             .association(Association::one_to_many("orders", "Order", "customer")),
//!     )
//!     .entity(
//!         EntityDescriptor::new("Order", "JPA_ORDERS")
//!             .association(Association::many_to_one("customer", "Customer", "CUSTOMER_ID")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(registry.entity("Customer").unwrap().table, "JPA_CUSTOMERS");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod association;
mod column;
mod descriptor;
mod error;
mod registry;
mod value;

pub use association::{Association, AssociationKind, Cascade, FetchPolicy, JoinTable};
pub use column::ColumnDef;
pub use descriptor::{EntityDescriptor, KeyStrategy};
pub use error::{SchemaError, SchemaResult};
pub use registry::{SchemaRegistry, SchemaRegistryBuilder};
pub use value::{ColumnType, Value};
