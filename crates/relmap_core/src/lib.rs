//! # relmap Core
//!
//! Sessions, entity lifecycle, and query execution for relmap.
//!
//! This crate ties the mapping metadata of `relmap_schema` to the row
//! store of `relmap_store`. A [`SessionFactory`] holds the validated
//! registry, the backend, and the shared caches; a [`Session`] is a unit
//! of work with an identity map, explicit dirty tracking, and
//! flush-time write-behind; [`Query`] runs a small entity query dialect
//! (and its native, column-named variant) against table scans.
//!
//! ## Design principles
//!
//! - Entities are plain values; the session tracks row snapshots, not
//!   object graphs
//! - Writes stage at flush, in one store transaction per session
//!   transaction
//! - Constraint violations surface at flush or commit, not at the call
//!   that caused them
//! - Caches (second-level, query results, parsed plans) live on the
//!   factory and are safe to share across threads
//!
//! ## Example
//!
//! ```
//! use relmap_core::{CoreResult, Entity, EntityKey, SessionFactory};
//! use relmap_schema::{ColumnDef, ColumnType, EntityDescriptor, SchemaRegistry};
//! use relmap_store::{InMemoryStore, Row};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Customer {
//!     id: Option<EntityKey>,
//!     last_name: String,
//! }
//!
//! impl Entity for Customer {
//!     const NAME: &'static str = "Customer";
//!
//!     fn key(&self) -> Option<EntityKey> {
//!         self.id
//!     }
//!
//!     fn set_key(&mut self, key: EntityKey) {
//!         self.id = Some(key);
//!     }
//!
//!     fn to_row(&self) -> CoreResult<Row> {
//!         Ok(Row::new().with("LAST_NAME", self.last_name.as_str()))
//!     }
//!
//!     fn from_row(key: EntityKey, row: &Row) -> CoreResult<Self> {
//!         Ok(Self {
//!             id: Some(key),
//!             last_name: row.get_or_null("LAST_NAME").as_text().unwrap_or("").to_string(),
//!         })
//!     }
//! }
//!
//! let registry = SchemaRegistry::builder()
//!     .entity(
//!         EntityDescriptor::new("Customer", "JPA_CUSTOMERS")
//!             .column(ColumnDef::new("last_name", "LAST_NAME", ColumnType::Text)),
//!     )
//!     .build()
//!     .unwrap();
//! let factory =
//!     SessionFactory::with_defaults(registry, Arc::new(InMemoryStore::new())).unwrap();
//!
//! let mut session = factory.open_session();
//! session.begin().unwrap();
//! let mut customer = Customer { id: None, last_name: "devinkin".into() };
//! let key = session.persist(&mut customer).unwrap();
//! session.commit().unwrap();
//!
//! let found: Option<Customer> = session.find(key).unwrap();
//! assert_eq!(found, Some(customer));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod entity;
mod error;
mod factory;
mod query;
mod session;
mod types;

pub use cache::{CacheStats, SecondLevelCache};
pub use config::{Config, SchemaPolicy};
pub use entity::{Entity, PendingRef, Ref};
pub use error::{CoreError, CoreResult};
pub use factory::SessionFactory;
pub use query::{Query, QueryHint};
pub use session::Session;
pub use types::EntityKey;
