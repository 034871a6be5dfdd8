//! # scopelite Core
//!
//! Lifecycle-safe client layer over the SQLite C API.
//!
//! This crate provides:
//! - Connections that close themselves and reject use after close
//! - Prepared statements with type-dispatched parameter binding
//! - A forward-only row cursor with sentinel comparison and iterator adapters
//! - Typed column access and column metadata
//! - Online backup between connections, in one step or incrementally
//! - A per-connection profiling hook
//!
//! Every object borrows the one it was created from: a [`Statement`]
//! borrows its [`Connection`], a [`Reader`] its statement, a [`Row`] its
//! reader. Misordered cleanup is a compile error rather than a runtime one.
//!
//! ```rust,ignore
//! use scopelite_core::{Connection, End};
//!
//! let conn = Connection::open_in_memory()?;
//! conn.execute("create table Things (Content text)")?;
//!
//! let mut insert = conn.prepare("insert into Things values (?)")?;
//! for content in ["a", "b"] {
//!     insert.bind(1, content)?;
//!     insert.execute()?;
//!     insert.reset()?;
//! }
//!
//! let mut select = conn.prepare("select Content from Things")?;
//! let mut reader = select.execute_reader()?;
//! while reader != End {
//!     println!("{:?}", reader.row().and_then(|row| row.text(0)));
//!     reader.advance()?;
//! }
//! ```

#![warn(missing_docs)]

mod backup;
mod config;
mod connection;
mod error;
mod profile;
mod reader;
mod row;
mod statement;
mod types;
mod value;

pub use backup::{Backup, BackupConfig, BackupProgress, BackupStep, PageCount};
pub use config::{Config, Location};
pub use connection::Connection;
pub use error::{ResultCode, SqlError, SqlResult};
pub use profile::ProfileEvent;
pub use reader::{CursorState, End, MappedRows, Reader};
pub use row::{ColumnValue, FromColumn, Row};
pub use statement::{Statement, StatementState};
pub use types::{type_name, ColumnType};
pub use value::{Null, Value};

use libsqlite3_sys as ffi;
use std::ffi::CStr;

/// Returns the version string of the linked engine, e.g. `"3.45.0"`.
pub fn version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static nul-terminated string.
    unsafe { CStr::from_ptr(ffi::sqlite3_libversion()) }
        .to_str()
        .unwrap_or("unknown")
}

/// Returns the version of the linked engine as a number, e.g. `3045000`.
pub fn version_number() -> i32 {
    // SAFETY: no preconditions.
    unsafe { ffi::sqlite3_libversion_number() }
}
