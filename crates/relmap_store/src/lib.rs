//! # relmap Store
//!
//! Backing store trait and in-memory implementation for relmap.
//!
//! This crate provides the relational half of the mapper: typed rows
//! keyed by integer primary keys, join tables for many-to-many links, and
//! single-writer transactions with staged writes. The store knows nothing
//! about entities, sessions, or queries; `relmap_core` owns all of that.
//!
//! ## Design principles
//!
//! - Backends are row stores: get, scan, insert, update, delete, link
//! - Constraints are enforced when writes are staged (session flush time)
//! - One write transaction at a time; commit applies atomically
//! - Must be `Send + Sync` so a factory can be shared across threads
//!
//! ## Example
//!
//! ```
//! use relmap_store::{ColumnSpec, InMemoryStore, Row, StoreBackend, TableSpec};
//! use relmap_schema::ColumnType;
//!
//! let store = InMemoryStore::new();
//! store
//!     .create_table(
//!         &TableSpec::new("JPA_CUSTOMERS", "ID")
//!             .column(ColumnSpec::new("LAST_NAME", ColumnType::Text)),
//!     )
//!     .unwrap();
//!
//! let mut txn = store.begin();
//! store
//!     .insert(&mut txn, "JPA_CUSTOMERS", 1, Row::new().with("LAST_NAME", "devinkin"))
//!     .unwrap();
//! store.commit(txn).unwrap();
//!
//! assert!(store.get("JPA_CUSTOMERS", 1).unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod row;
mod transaction;

pub use backend::{
    ColumnSpec, ForeignKeySpec, JoinSide, JoinTableSpec, StoreBackend, TableSpec,
};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use row::Row;
pub use transaction::StoreTransaction;
