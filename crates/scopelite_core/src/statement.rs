//! Prepared statements.
//!
//! A [`Statement`] owns one compiled query and borrows the [`Connection`] it
//! was compiled against, so it can never outlive it. The compiled form is
//! finalized exactly once, when the statement is dropped.
//!
//! ## State machine
//!
//! ```text
//! Unprepared --prepare--> Ready --bind*--> Ready --execute/execute_reader--> Stepped
//!                           ^                                                  |
//!                           +----------------------reset-----------------------+
//! ```
//!
//! Executing a `Stepped` statement rewinds it first, keeping its bindings.

use crate::connection::Connection;
use crate::error::{code_description, engine_message, SqlError, SqlResult};
use crate::reader::{MappedRows, Reader};
use crate::row::Row;
use crate::value::Value;
use libsqlite3_sys as ffi;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::fmt;
use std::ptr::{self, NonNull};

/// Lifecycle state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// No query has been compiled yet.
    Unprepared,
    /// Compiled (or reset) and not stepped since.
    Ready,
    /// Stepped at least once since the last prepare or reset.
    Stepped,
}

/// A compiled query bound to one connection.
pub struct Statement<'c> {
    conn: &'c Connection,
    /// `None` while unprepared, or when the prepared text held no statement.
    raw: Option<NonNull<ffi::sqlite3_stmt>>,
    state: StatementState,
}

impl<'c> Statement<'c> {
    /// Creates an unprepared statement.
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            raw: None,
            state: StatementState::Unprepared,
        }
    }

    /// Compiles the first statement in `sql`.
    ///
    /// Any previously compiled form is finalized first. Text that holds no
    /// statement (empty, whitespace, comments) leaves the statement without a
    /// compiled form: executing it does nothing and reading it yields no rows.
    pub fn prepare(&mut self, sql: &str) -> SqlResult<()> {
        self.finalize();
        let (raw, _) = compile(self.conn, sql)?;
        self.raw = raw;
        self.state = StatementState::Ready;
        tracing::debug!(sql, empty = raw.is_none(), "statement prepared");
        Ok(())
    }

    /// Returns the owning connection.
    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Returns true if a compiled form exists.
    pub fn is_prepared(&self) -> bool {
        self.raw.is_some()
    }

    /// Returns the SQL text of the compiled statement.
    pub fn sql(&self) -> Option<String> {
        let raw = self.raw?;
        // SAFETY: `raw` is a live statement; the text lives as long as it.
        let ptr = unsafe { ffi::sqlite3_sql(raw.as_ptr()) };
        owned_text(ptr)
    }

    /// Returns true if the statement makes no direct changes to the database.
    pub fn readonly(&self) -> bool {
        match self.raw {
            // SAFETY: `raw` is a live statement.
            Some(raw) => unsafe { ffi::sqlite3_stmt_readonly(raw.as_ptr()) != 0 },
            None => true,
        }
    }

    /// Returns the number of parameters the statement declares.
    pub fn parameter_count(&self) -> usize {
        match self.raw {
            // SAFETY: `raw` is a live statement.
            Some(raw) => unsafe { ffi::sqlite3_bind_parameter_count(raw.as_ptr()) as usize },
            None => 0,
        }
    }

    /// Returns the 1-based index of a named parameter (`:name`, `@name`, `$name`).
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        let raw = self.raw?;
        let name = CString::new(name).ok()?;
        // SAFETY: `raw` is live and `name` is nul-terminated.
        let index = unsafe { ffi::sqlite3_bind_parameter_index(raw.as_ptr(), name.as_ptr()) };
        (index > 0).then_some(index as usize)
    }

    /// Returns the number of columns in the result set.
    pub fn column_count(&self) -> usize {
        match self.raw {
            // SAFETY: `raw` is a live statement.
            Some(raw) => unsafe { ffi::sqlite3_column_count(raw.as_ptr()) as usize },
            None => 0,
        }
    }

    /// Returns the display name of a result column.
    pub fn column_name(&self, index: usize) -> Option<String> {
        let raw = self.raw?;
        // SAFETY: `raw` is live; out-of-range indices yield null.
        let ptr = unsafe { ffi::sqlite3_column_name(raw.as_ptr(), column_index(index)) };
        owned_text(ptr)
    }

    /// Name of the database a result column comes from.
    ///
    /// Available before the first step. `None` for expressions.
    pub fn column_database_name(&self, index: usize) -> Option<String> {
        let raw = self.raw?;
        // SAFETY: `raw` is live; out-of-range indices yield null.
        owned_text(unsafe { ffi::sqlite3_column_database_name(raw.as_ptr(), column_index(index)) })
    }

    /// Name of the table a result column comes from.
    pub fn column_table_name(&self, index: usize) -> Option<String> {
        let raw = self.raw?;
        // SAFETY: as above.
        owned_text(unsafe { ffi::sqlite3_column_table_name(raw.as_ptr(), column_index(index)) })
    }

    /// Name of the table column a result column comes from.
    pub fn column_origin_name(&self, index: usize) -> Option<String> {
        let raw = self.raw?;
        // SAFETY: as above.
        owned_text(unsafe { ffi::sqlite3_column_origin_name(raw.as_ptr(), column_index(index)) })
    }

    /// Binds `value` to the 1-based parameter `index`.
    ///
    /// Rebinding an index before execution overwrites the previous value.
    /// The engine copies text and blob data during the call.
    ///
    /// # Errors
    ///
    /// `SqlError::Bind` if the index is out of range, the value is too large,
    /// or the statement is mid-execution (call [`Statement::reset`] first).
    pub fn bind<'v>(&mut self, index: usize, value: impl Into<Value<'v>>) -> SqlResult<()> {
        let value = value.into();
        let Some(raw) = self.raw else {
            return Err(SqlError::bind(
                ffi::SQLITE_RANGE,
                code_description(ffi::SQLITE_RANGE),
            ));
        };
        let Ok(slot) = c_int::try_from(index) else {
            return Err(SqlError::bind(
                ffi::SQLITE_RANGE,
                code_description(ffi::SQLITE_RANGE),
            ));
        };

        let stmt = raw.as_ptr();
        // SAFETY: `stmt` is live; pointers and lengths describe borrowed data
        // that the engine copies (SQLITE_TRANSIENT) before returning.
        let rc = unsafe {
            match value {
                Value::Null => ffi::sqlite3_bind_null(stmt, slot),
                Value::Narrow(text) => {
                    let bytes = text.to_bytes();
                    ffi::sqlite3_bind_text(
                        stmt,
                        slot,
                        bytes.as_ptr().cast::<c_char>(),
                        byte_len(bytes.len())?,
                        ffi::SQLITE_TRANSIENT(),
                    )
                }
                Value::Text(text) => ffi::sqlite3_bind_text(
                    stmt,
                    slot,
                    text.as_ptr().cast::<c_char>(),
                    byte_len(text.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
                Value::Utf16(text) => ffi::sqlite3_bind_text16(
                    stmt,
                    slot,
                    text.as_ptr().cast::<c_void>(),
                    byte_len(text.len().saturating_mul(2))?,
                    ffi::SQLITE_TRANSIENT(),
                ),
                Value::Int(number) => ffi::sqlite3_bind_int(stmt, slot, number),
                Value::Int64(number) => ffi::sqlite3_bind_int64(stmt, slot, number),
                Value::Float(number) => ffi::sqlite3_bind_double(stmt, slot, number),
                Value::Blob(bytes) => ffi::sqlite3_bind_blob(
                    stmt,
                    slot,
                    bytes.as_ptr().cast::<c_void>(),
                    byte_len(bytes.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
            }
        };

        if rc != ffi::SQLITE_OK {
            return Err(SqlError::bind(rc, engine_message(self.conn.handle(), rc)));
        }
        Ok(())
    }

    /// Binds `values` to parameters `1..=values.len()`.
    pub fn bind_all(&mut self, values: &[Value<'_>]) -> SqlResult<()> {
        for (offset, value) in values.iter().enumerate() {
            self.bind(offset + 1, *value)?;
        }
        Ok(())
    }

    /// Binds `value` to a named parameter.
    pub fn bind_named<'v>(&mut self, name: &str, value: impl Into<Value<'v>>) -> SqlResult<()> {
        match self.parameter_index(name) {
            Some(index) => self.bind(index, value),
            None => Err(SqlError::bind(
                ffi::SQLITE_RANGE,
                format!("no parameter named {name}"),
            )),
        }
    }

    /// Resets every parameter to NULL.
    pub fn clear_bindings(&mut self) -> SqlResult<()> {
        let Some(raw) = self.raw else {
            return Ok(());
        };
        // SAFETY: `raw` is a live statement.
        let rc = unsafe { ffi::sqlite3_clear_bindings(raw.as_ptr()) };
        if rc != ffi::SQLITE_OK {
            return Err(SqlError::bind(rc, engine_message(self.conn.handle(), rc)));
        }
        Ok(())
    }

    /// Runs the statement to completion, discarding any rows.
    ///
    /// A statement stepped since its last reset is rewound first.
    pub fn execute(&mut self) -> SqlResult<()> {
        self.rewind();
        loop {
            match self.step_raw() {
                ffi::SQLITE_ROW => continue,
                ffi::SQLITE_DONE => return Ok(()),
                rc => return Err(self.step_error(rc)),
            }
        }
    }

    /// Starts reading rows.
    ///
    /// The returned reader has already taken its first step. A statement
    /// stepped since its last reset is rewound first, so rows left unread
    /// by an earlier reader are never skipped.
    pub fn execute_reader(&mut self) -> SqlResult<Reader<'_, 'c>> {
        self.rewind();
        Reader::new(self)
    }

    /// Reads every row through `f`.
    pub fn query_map<T, F>(&mut self, f: F) -> SqlResult<MappedRows<'_, 'c, F>>
    where
        F: FnMut(&Row<'_>) -> SqlResult<T>,
    {
        Ok(self.execute_reader()?.map(f))
    }

    /// Returns the statement to its ready state, keeping its bindings.
    ///
    /// # Errors
    ///
    /// If the most recent step failed, the engine reports that failure again.
    pub fn reset(&mut self) -> SqlResult<()> {
        if self.state != StatementState::Unprepared {
            self.state = StatementState::Ready;
        }
        let Some(raw) = self.raw else {
            return Ok(());
        };
        // SAFETY: `raw` is a live statement.
        let rc = unsafe { ffi::sqlite3_reset(raw.as_ptr()) };
        if rc != ffi::SQLITE_OK {
            return Err(self.step_error(rc));
        }
        Ok(())
    }

    /// Performs one engine step and returns its raw status.
    ///
    /// A statement without a compiled form is done immediately.
    pub(crate) fn step_raw(&mut self) -> c_int {
        let Some(raw) = self.raw else {
            return ffi::SQLITE_DONE;
        };
        self.state = StatementState::Stepped;
        // SAFETY: `raw` is a live statement, held exclusively through `&mut self`.
        unsafe { ffi::sqlite3_step(raw.as_ptr()) }
    }

    /// Resets a stepped statement before a new execution.
    fn rewind(&mut self) {
        if self.state != StatementState::Stepped {
            return;
        }
        self.state = StatementState::Ready;
        if let Some(raw) = self.raw {
            // SAFETY: `raw` is a live statement. A non-OK result repeats the
            // last step's error, which was reported when it happened.
            let rc = unsafe { ffi::sqlite3_reset(raw.as_ptr()) };
            tracing::trace!(rc, "statement rewound");
        }
    }

    pub(crate) fn step_error(&self, rc: c_int) -> SqlError {
        SqlError::step(rc, engine_message(self.conn.handle(), rc))
    }

    pub(crate) fn raw(&self) -> Option<NonNull<ffi::sqlite3_stmt>> {
        self.raw
    }

    fn finalize(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: `raw` is live and is never used again after this call.
            // The return value repeats the last step's error, already reported.
            let rc = unsafe { ffi::sqlite3_finalize(raw.as_ptr()) };
            tracing::trace!(rc, "statement finalized");
        }
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql())
            .field("state", &self.state)
            .finish()
    }
}

/// Compiles the first statement of `sql`.
///
/// Returns the compiled handle (`None` if the text held no statement) and the
/// number of bytes consumed, so callers can walk a multi-statement script.
pub(crate) fn compile(
    conn: &Connection,
    sql: &str,
) -> SqlResult<(Option<NonNull<ffi::sqlite3_stmt>>, usize)> {
    let db = conn.handle();
    if db.is_null() {
        return Err(SqlError::prepare(
            ffi::SQLITE_MISUSE,
            "database connection is closed",
        ));
    }
    let Ok(len) = c_int::try_from(sql.len()) else {
        return Err(SqlError::prepare(
            ffi::SQLITE_TOOBIG,
            code_description(ffi::SQLITE_TOOBIG),
        ));
    };

    let mut raw = ptr::null_mut();
    let mut tail: *const c_char = ptr::null();
    // SAFETY: `db` is live; `sql` is valid for `len` bytes and need not be
    // nul-terminated because the length is given.
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(db, sql.as_ptr().cast::<c_char>(), len, &mut raw, &mut tail)
    };
    if rc != ffi::SQLITE_OK {
        // SAFETY: on failure the engine sets `raw` to null, finalizing a null
        // handle is a no-op.
        unsafe { ffi::sqlite3_finalize(raw) };
        return Err(SqlError::prepare(rc, engine_message(db, rc)));
    }

    let consumed = if tail.is_null() {
        sql.len()
    } else {
        // SAFETY: the engine points `tail` into `sql` (or one past its end).
        let offset = unsafe { tail.offset_from(sql.as_ptr().cast::<c_char>()) };
        usize::try_from(offset).unwrap_or(sql.len()).min(sql.len())
    };
    Ok((NonNull::new(raw), consumed))
}

/// Converts a byte length to the engine's length type.
fn byte_len(len: usize) -> SqlResult<c_int> {
    c_int::try_from(len)
        .map_err(|_| SqlError::bind(ffi::SQLITE_TOOBIG, code_description(ffi::SQLITE_TOOBIG)))
}

/// Converts a column index to the engine's index type.
///
/// Indices beyond `c_int` saturate, which the engine treats as out of range.
pub(crate) fn column_index(index: usize) -> c_int {
    c_int::try_from(index).unwrap_or(c_int::MAX)
}

/// Copies an engine-owned, nul-terminated string.
pub(crate) fn owned_text(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null engine strings are nul-terminated and live until the
    // next call on the same statement; the copy is made immediately.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}
