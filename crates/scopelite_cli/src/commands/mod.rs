//! CLI command implementations.

pub mod backup;
pub mod demo;
pub mod exec;
pub mod query;
pub mod types;
