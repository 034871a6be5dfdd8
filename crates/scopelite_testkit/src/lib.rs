//! # scopelite Testkit
//!
//! Test utilities for scopelite.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Scenario builders for commonly used tables
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scopelite_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_database() {
//!     with_temp_db(|conn| {
//!         conn.execute("create table t (x integer)").unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
