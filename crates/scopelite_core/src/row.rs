//! Column access for the current row.
//!
//! Every accessor asks the engine again; nothing is cached. Text and blob
//! values are copied out, so a later conversion of the same column cannot
//! invalidate anything already returned.
//!
//! Value accessors follow the engine's coercion rules: reading text as an
//! integer parses its numeric prefix (or yields 0), reading NULL as a number
//! yields 0, and so on.

use crate::error::{SqlError, SqlResult};
use crate::statement::{column_index, owned_text};
use crate::types::ColumnType;
use libsqlite3_sys as ffi;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A view over the columns of the row a [`Reader`](crate::Reader) is on.
///
/// Borrowed from the reader, so it cannot outlive the current position.
#[derive(Clone, Copy)]
pub struct Row<'r> {
    stmt: NonNull<ffi::sqlite3_stmt>,
    _reader: PhantomData<&'r ()>,
}

impl<'r> Row<'r> {
    pub(crate) fn new(stmt: NonNull<ffi::sqlite3_stmt>) -> Self {
        Self {
            stmt,
            _reader: PhantomData,
        }
    }

    fn raw(&self) -> *mut ffi::sqlite3_stmt {
        self.stmt.as_ptr()
    }

    /// Returns the number of columns.
    pub fn column_count(&self) -> usize {
        // SAFETY: the statement outlives this view.
        unsafe { ffi::sqlite3_column_count(self.raw()) as usize }
    }

    /// Reads a column as a 32-bit integer.
    pub fn int(&self, index: usize) -> i32 {
        // SAFETY: the statement is positioned on a row; out-of-range indices
        // read as NULL.
        unsafe { ffi::sqlite3_column_int(self.raw(), column_index(index)) }
    }

    /// Reads a column as a 64-bit integer.
    pub fn int64(&self, index: usize) -> i64 {
        // SAFETY: as for `int`.
        unsafe { ffi::sqlite3_column_int64(self.raw(), column_index(index)) }
    }

    /// Reads a column as a double.
    pub fn double(&self, index: usize) -> f64 {
        // SAFETY: as for `int`.
        unsafe { ffi::sqlite3_column_double(self.raw(), column_index(index)) }
    }

    /// Reads a column as UTF-8 text; `None` for NULL.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self, index: usize) -> Option<String> {
        if self.column_type(index) == ColumnType::Null {
            return None;
        }
        let column = column_index(index);
        // SAFETY: the text pointer is fetched before the length, as the
        // engine requires, and both are consumed before any other call.
        let bytes = unsafe {
            let ptr = ffi::sqlite3_column_text(self.raw(), column);
            let len = ffi::sqlite3_column_bytes(self.raw(), column);
            engine_bytes(ptr.cast::<u8>(), len)
        };
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads a column as UTF-16 text in native byte order; `None` for NULL.
    pub fn text16(&self, index: usize) -> Option<Vec<u16>> {
        if self.column_type(index) == ColumnType::Null {
            return None;
        }
        let column = column_index(index);
        // SAFETY: as for `text`, using the UTF-16 pair of calls.
        let bytes = unsafe {
            let ptr = ffi::sqlite3_column_text16(self.raw(), column);
            let len = ffi::sqlite3_column_bytes16(self.raw(), column);
            engine_bytes(ptr.cast::<u8>(), len)
        };
        Some(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }

    /// Reads a column as raw bytes; empty for NULL.
    pub fn blob(&self, index: usize) -> Vec<u8> {
        let column = column_index(index);
        // SAFETY: as for `text`.
        let bytes = unsafe {
            let ptr = ffi::sqlite3_column_blob(self.raw(), column);
            let len = ffi::sqlite3_column_bytes(self.raw(), column);
            engine_bytes(ptr.cast::<u8>(), len)
        };
        bytes.to_vec()
    }

    /// Reads a column as any [`FromColumn`] type.
    ///
    /// # Errors
    ///
    /// `SqlError::Step` with `SQLITE_RANGE` for an index past the last
    /// column, or whatever the target type reports.
    ///
    /// ```rust,ignore
    /// let name: String = row.get(0)?;
    /// let nickname: Option<String> = row.get(1)?;
    /// ```
    pub fn get<T: FromColumn>(&self, index: usize) -> SqlResult<T> {
        if index >= self.column_count() {
            return Err(SqlError::step(
                ffi::SQLITE_RANGE,
                format!("column index {index} out of range"),
            ));
        }
        T::from_column(self, index)
    }

    /// Reads a column as an owned value of its current storage class.
    pub fn value(&self, index: usize) -> ColumnValue {
        match self.column_type(index) {
            ColumnType::Null => ColumnValue::Null,
            ColumnType::Integer => ColumnValue::Integer(self.int64(index)),
            ColumnType::Float => ColumnValue::Float(self.double(index)),
            ColumnType::Text => ColumnValue::Text(self.text(index).unwrap_or_default()),
            ColumnType::Blob => ColumnValue::Blob(self.blob(index)),
        }
    }

    /// Returns the storage class of a column in this row.
    pub fn column_type(&self, index: usize) -> ColumnType {
        // SAFETY: as for `int`.
        let code = unsafe { ffi::sqlite3_column_type(self.raw(), column_index(index)) };
        ColumnType::from_code(code).unwrap_or(ColumnType::Null)
    }

    /// Name of the database the column comes from (`main`, `temp`, ...).
    ///
    /// `None` for expressions and for indices past the last column.
    pub fn database_name(&self, index: usize) -> Option<String> {
        // SAFETY: as for `int`; the name is copied before the next call.
        owned_text(unsafe { ffi::sqlite3_column_database_name(self.raw(), column_index(index)) })
    }

    /// Name of the table column the result column comes from.
    pub fn origin_name(&self, index: usize) -> Option<String> {
        // SAFETY: as for `database_name`.
        owned_text(unsafe { ffi::sqlite3_column_origin_name(self.raw(), column_index(index)) })
    }

    /// Name of the table the column comes from.
    pub fn table_name(&self, index: usize) -> Option<String> {
        // SAFETY: as for `database_name`.
        owned_text(unsafe { ffi::sqlite3_column_table_name(self.raw(), column_index(index)) })
    }

    /// Display name of the column (its alias, if it has one).
    pub fn name(&self, index: usize) -> Option<String> {
        // SAFETY: as for `database_name`.
        owned_text(unsafe { ffi::sqlite3_column_name(self.raw(), column_index(index)) })
    }

    /// Display name of the column as UTF-16.
    pub fn name16(&self, index: usize) -> Option<Vec<u16>> {
        // SAFETY: as for `int`.
        let ptr = unsafe { ffi::sqlite3_column_name16(self.raw(), column_index(index)) };
        if ptr.is_null() {
            return None;
        }
        let ptr = ptr.cast::<u16>();
        let mut len = 0;
        // SAFETY: the engine returns a nul-terminated UTF-16 string, suitably
        // aligned by its allocator.
        unsafe {
            while *ptr.add(len) != 0 {
                len += 1;
            }
            Some(std::slice::from_raw_parts(ptr, len).to_vec())
        }
    }

    /// Declared type of the table column, if the column is a direct reference.
    pub fn decltype(&self, index: usize) -> Option<String> {
        // SAFETY: as for `database_name`.
        owned_text(unsafe { ffi::sqlite3_column_decltype(self.raw(), column_index(index)) })
    }
}

impl fmt::Debug for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for index in 0..self.column_count() {
            list.entry(&self.value(index));
        }
        list.finish()
    }
}

/// Borrows `len` engine-owned bytes at `ptr`.
///
/// # Safety
///
/// `ptr` must be null or valid for `len` bytes until the next engine call
/// on the same statement.
unsafe fn engine_bytes<'a>(ptr: *const u8, len: i32) -> &'a [u8] {
    match usize::try_from(len) {
        // SAFETY: upheld by the caller.
        Ok(len) if !ptr.is_null() && len > 0 => unsafe { std::slice::from_raw_parts(ptr, len) },
        _ => &[],
    }
}

/// An owned column value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// SQL NULL.
    Null,
    /// A 64-bit integer.
    Integer(i64),
    /// A double.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl ColumnValue {
    /// Returns the storage class of the value.
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValue::Null => ColumnType::Null,
            ColumnValue::Integer(_) => ColumnType::Integer,
            ColumnValue::Float(_) => ColumnType::Float,
            ColumnValue::Text(_) => ColumnType::Text,
            ColumnValue::Blob(_) => ColumnType::Blob,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("NULL"),
            ColumnValue::Integer(value) => write!(f, "{value}"),
            ColumnValue::Float(value) => write!(f, "{value}"),
            ColumnValue::Text(value) => f.write_str(value),
            ColumnValue::Blob(bytes) => {
                f.write_str("x'")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

/// Types that can be read out of a column.
pub trait FromColumn: Sized {
    /// Reads the column at `index` of `row`.
    fn from_column(row: &Row<'_>, index: usize) -> SqlResult<Self>;
}

impl FromColumn for i32 {
    fn from_column(row: &Row<'_>, index: usize) -> SqlResult<Self> {
        Ok(row.int(index))
    }
}

impl FromColumn for i64 {
    fn from_column(row: &Row<'_>, index: usize) -> SqlResult<Self> {
        Ok(row.int64(index))
    }
}

impl FromColumn for f64 {
    fn from_column(row: &Row<'_>, index: usize) -> SqlResult<Self> {
        Ok(row.double(index))
    }
}

impl FromColumn for String {
    fn from_column(row: &Row<'_>, index: usize) -> SqlResult<Self> {
        row.text(index).ok_or_else(|| {
            SqlError::step(
                ffi::SQLITE_MISMATCH,
                format!("column {index} is NULL, expected text"),
            )
        })
    }
}

impl FromColumn for Vec<u8> {
    fn from_column(row: &Row<'_>, index: usize) -> SqlResult<Self> {
        Ok(row.blob(index))
    }
}

impl FromColumn for ColumnValue {
    fn from_column(row: &Row<'_>, index: usize) -> SqlResult<Self> {
        Ok(row.value(index))
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(row: &Row<'_>, index: usize) -> SqlResult<Self> {
        match row.column_type(index) {
            ColumnType::Null => Ok(None),
            _ => T::from_column(row, index).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::error::ResultCode;

    fn with_row<R>(sql: &str, f: impl FnOnce(&Row<'_>) -> R) -> R {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare(sql).unwrap();
        let reader = stmt.execute_reader().unwrap();
        let row = reader.row().unwrap();
        f(&row)
    }

    #[test]
    fn engine_coercion() {
        with_row("select '42abc', 3.9, null, 7", |row| {
            assert_eq!(row.int(0), 42);
            assert_eq!(row.int(1), 3);
            assert_eq!(row.int64(2), 0);
            assert_eq!(row.double(3), 7.0);
            assert_eq!(row.text(3).as_deref(), Some("7"));
        });
    }

    #[test]
    fn null_reads() {
        with_row("select null", |row| {
            assert_eq!(row.text(0), None);
            assert_eq!(row.text16(0), None);
            assert!(row.blob(0).is_empty());
            assert_eq!(row.value(0), ColumnValue::Null);
            assert_eq!(row.column_type(0), ColumnType::Null);
        });
    }

    #[test]
    fn storage_classes() {
        with_row("select 1, 1.5, 'a', x'0102', null", |row| {
            let types: Vec<_> = (0..row.column_count())
                .map(|i| row.column_type(i))
                .collect();
            assert_eq!(
                types,
                vec![
                    ColumnType::Integer,
                    ColumnType::Float,
                    ColumnType::Text,
                    ColumnType::Blob,
                    ColumnType::Null,
                ]
            );
            assert_eq!(row.value(3), ColumnValue::Blob(vec![1, 2]));
            assert_eq!(row.value(3).to_string(), "x'0102'");
        });
    }

    #[test]
    fn utf16_text() {
        with_row("select 'Joe Ünïcode'", |row| {
            let expected: Vec<u16> = "Joe Ünïcode".encode_utf16().collect();
            assert_eq!(row.text16(0), Some(expected));
        });
    }

    #[test]
    fn typed_get() {
        with_row("select 5, 'five', null, x'ff'", |row| {
            assert_eq!(row.get::<i64>(0).unwrap(), 5);
            assert_eq!(row.get::<String>(1).unwrap(), "five");
            assert_eq!(row.get::<Option<String>>(2).unwrap(), None);
            assert_eq!(row.get::<Option<i32>>(0).unwrap(), Some(5));
            assert_eq!(row.get::<Vec<u8>>(3).unwrap(), vec![0xff]);

            let err = row.get::<String>(2).unwrap_err();
            assert_eq!(err.result_code(), ResultCode::Mismatch);

            let err = row.get::<i32>(4).unwrap_err();
            assert_eq!(err.result_code(), ResultCode::Range);
        });
    }

    #[test]
    fn names_for_expressions() {
        with_row("select 1 + 1 as Two", |row| {
            assert_eq!(row.name(0).as_deref(), Some("Two"));
            assert_eq!(row.name16(0), Some("Two".encode_utf16().collect()));
            assert_eq!(row.database_name(0), None);
            assert_eq!(row.table_name(0), None);
            assert_eq!(row.origin_name(0), None);
            assert_eq!(row.decltype(0), None);
            assert_eq!(row.name(1), None);
        });
    }

    #[test]
    fn debug_lists_values() {
        with_row("select 1, 'a'", |row| {
            assert_eq!(format!("{row:?}"), r#"[Integer(1), Text("a")]"#);
        });
    }
}
