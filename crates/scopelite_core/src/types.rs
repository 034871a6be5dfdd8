//! Column storage classes.

use libsqlite3_sys as ffi;
use std::ffi::c_int;
use std::fmt;

/// The storage class of a column value in the current row.
///
/// The engine types values, not columns: the same column may report a
/// different tag on a different row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// SQL NULL.
    Null,
    /// A signed 64-bit integer.
    Integer,
    /// An IEEE 754 double.
    Float,
    /// Text in the database encoding.
    Text,
    /// Raw bytes.
    Blob,
}

impl ColumnType {
    /// All five storage classes, in engine code order.
    pub const ALL: [ColumnType; 5] = [
        ColumnType::Integer,
        ColumnType::Float,
        ColumnType::Text,
        ColumnType::Blob,
        ColumnType::Null,
    ];

    /// Maps an engine type code to its tag.
    pub fn from_code(code: c_int) -> Option<Self> {
        match code {
            ffi::SQLITE_INTEGER => Some(ColumnType::Integer),
            ffi::SQLITE_FLOAT => Some(ColumnType::Float),
            ffi::SQLITE_TEXT => Some(ColumnType::Text),
            ffi::SQLITE_BLOB => Some(ColumnType::Blob),
            ffi::SQLITE_NULL => Some(ColumnType::Null),
            _ => None,
        }
    }

    /// Returns the engine type code.
    pub fn code(self) -> c_int {
        match self {
            ColumnType::Integer => ffi::SQLITE_INTEGER,
            ColumnType::Float => ffi::SQLITE_FLOAT,
            ColumnType::Text => ffi::SQLITE_TEXT,
            ColumnType::Blob => ffi::SQLITE_BLOB,
            ColumnType::Null => ffi::SQLITE_NULL,
        }
    }

    /// Returns the display name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            ColumnType::Null => "NULL",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the display name of a storage class.
pub const fn type_name(column_type: ColumnType) -> &'static str {
    column_type.name()
}
