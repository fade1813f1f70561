//! # relmap Testkit
//!
//! Test utilities for relmap.
//!
//! This crate provides:
//! - A demo domain (customers/orders, departments/managers,
//!   items/categories) with `Entity` implementations and a validated
//!   registry
//! - Factory helpers over an in-memory store
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relmap_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_factory() {
//!     with_factory(|factory| {
//!         let mut session = factory.open_session();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
