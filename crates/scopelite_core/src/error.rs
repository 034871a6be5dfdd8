//! Error types for scopelite.
//!
//! Every failure carries the engine's numeric status code together with the
//! message the engine reported at the moment the call failed. Messages are
//! captured eagerly: the engine overwrites its per-connection error slot on the
//! next call, so they are never recomputed later.

use libsqlite3_sys as ffi;
use std::ffi::{c_int, CStr};
use std::fmt;
use thiserror::Error;

/// Result type for scopelite operations.
pub type SqlResult<T> = Result<T, SqlError>;

/// Errors surfaced by the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// The backing store could not be acquired or created.
    #[error("open failed ({code}): {message}")]
    Open {
        /// Engine status code.
        code: i32,
        /// Engine message.
        message: String,
    },

    /// The query text could not be compiled.
    #[error("prepare failed ({code}): {message}")]
    Prepare {
        /// Engine status code.
        code: i32,
        /// Engine message.
        message: String,
    },

    /// A parameter could not be bound.
    #[error("bind failed ({code}): {message}")]
    Bind {
        /// Engine status code.
        code: i32,
        /// Engine message.
        message: String,
    },

    /// A step reported something other than "row" or "done".
    #[error("step failed ({code}): {message}")]
    Step {
        /// Engine status code.
        code: i32,
        /// Engine message.
        message: String,
    },

    /// A backup session could not be started or could not make progress.
    #[error("backup failed ({code}): {message}")]
    Backup {
        /// Engine status code.
        code: i32,
        /// Engine message.
        message: String,
    },

    /// The engine refused to release a connection.
    #[error("close failed ({code}): {message}")]
    Close {
        /// Engine status code.
        code: i32,
        /// Engine message.
        message: String,
    },
}

impl SqlError {
    /// Creates an open error.
    pub fn open(code: i32, message: impl Into<String>) -> Self {
        Self::Open {
            code,
            message: message.into(),
        }
    }

    /// Creates a prepare error.
    pub fn prepare(code: i32, message: impl Into<String>) -> Self {
        Self::Prepare {
            code,
            message: message.into(),
        }
    }

    /// Creates a bind error.
    pub fn bind(code: i32, message: impl Into<String>) -> Self {
        Self::Bind {
            code,
            message: message.into(),
        }
    }

    /// Creates a step error.
    pub fn step(code: i32, message: impl Into<String>) -> Self {
        Self::Step {
            code,
            message: message.into(),
        }
    }

    /// Creates a backup error.
    pub fn backup(code: i32, message: impl Into<String>) -> Self {
        Self::Backup {
            code,
            message: message.into(),
        }
    }

    /// Creates a close error.
    pub fn close(code: i32, message: impl Into<String>) -> Self {
        Self::Close {
            code,
            message: message.into(),
        }
    }

    /// Returns the engine status code (possibly an extended code).
    pub fn code(&self) -> i32 {
        match self {
            Self::Open { code, .. }
            | Self::Prepare { code, .. }
            | Self::Bind { code, .. }
            | Self::Step { code, .. }
            | Self::Backup { code, .. }
            | Self::Close { code, .. } => *code,
        }
    }

    /// Returns the engine message captured at failure time.
    pub fn message(&self) -> &str {
        match self {
            Self::Open { message, .. }
            | Self::Prepare { message, .. }
            | Self::Bind { message, .. }
            | Self::Step { message, .. }
            | Self::Backup { message, .. }
            | Self::Close { message, .. } => message,
        }
    }

    /// Returns the primary result code.
    pub fn result_code(&self) -> ResultCode {
        ResultCode::from(self.code())
    }

    /// Returns true if the engine reported a busy or locked database.
    pub fn is_busy(&self) -> bool {
        matches!(self.result_code(), ResultCode::Busy | ResultCode::Locked)
    }
}

/// Primary engine result codes.
///
/// Extended codes fold onto their primary code (the low byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Successful result.
    Ok,
    /// Generic error.
    Error,
    /// Internal logic error in the engine.
    Internal,
    /// Access permission denied.
    Perm,
    /// Callback requested an abort.
    Abort,
    /// The database file is locked.
    Busy,
    /// A table in the database is locked.
    Locked,
    /// A memory allocation failed.
    NoMem,
    /// Attempt to write a readonly database.
    ReadOnly,
    /// Operation terminated by an interrupt.
    Interrupt,
    /// Disk I/O error.
    IoErr,
    /// The database disk image is malformed.
    Corrupt,
    /// Unknown opcode or file not found.
    NotFound,
    /// Insertion failed because the database is full.
    Full,
    /// Unable to open the database file.
    CantOpen,
    /// Database lock protocol error.
    Protocol,
    /// Internal use only.
    Empty,
    /// The database schema changed.
    Schema,
    /// String or blob exceeds size limit.
    TooBig,
    /// Abort due to constraint violation.
    Constraint,
    /// Data type mismatch.
    Mismatch,
    /// Library used incorrectly.
    Misuse,
    /// Uses OS features not supported on host.
    NoLfs,
    /// Authorization denied.
    Auth,
    /// Not used.
    Format,
    /// Bind parameter or column index out of range.
    Range,
    /// File opened that is not a database file.
    NotADb,
    /// Notification from the log.
    Notice,
    /// Warning from the log.
    Warning,
    /// A step has another row ready.
    Row,
    /// A step has finished executing.
    Done,
    /// A code the engine documents but this crate does not name.
    Other(i32),
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        match code & 0xff {
            0 => ResultCode::Ok,
            1 => ResultCode::Error,
            2 => ResultCode::Internal,
            3 => ResultCode::Perm,
            4 => ResultCode::Abort,
            5 => ResultCode::Busy,
            6 => ResultCode::Locked,
            7 => ResultCode::NoMem,
            8 => ResultCode::ReadOnly,
            9 => ResultCode::Interrupt,
            10 => ResultCode::IoErr,
            11 => ResultCode::Corrupt,
            12 => ResultCode::NotFound,
            13 => ResultCode::Full,
            14 => ResultCode::CantOpen,
            15 => ResultCode::Protocol,
            16 => ResultCode::Empty,
            17 => ResultCode::Schema,
            18 => ResultCode::TooBig,
            19 => ResultCode::Constraint,
            20 => ResultCode::Mismatch,
            21 => ResultCode::Misuse,
            22 => ResultCode::NoLfs,
            23 => ResultCode::Auth,
            24 => ResultCode::Format,
            25 => ResultCode::Range,
            26 => ResultCode::NotADb,
            27 => ResultCode::Notice,
            28 => ResultCode::Warning,
            100 => ResultCode::Row,
            101 => ResultCode::Done,
            other => ResultCode::Other(other),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::Ok => "SQLITE_OK",
            ResultCode::Error => "SQLITE_ERROR",
            ResultCode::Internal => "SQLITE_INTERNAL",
            ResultCode::Perm => "SQLITE_PERM",
            ResultCode::Abort => "SQLITE_ABORT",
            ResultCode::Busy => "SQLITE_BUSY",
            ResultCode::Locked => "SQLITE_LOCKED",
            ResultCode::NoMem => "SQLITE_NOMEM",
            ResultCode::ReadOnly => "SQLITE_READONLY",
            ResultCode::Interrupt => "SQLITE_INTERRUPT",
            ResultCode::IoErr => "SQLITE_IOERR",
            ResultCode::Corrupt => "SQLITE_CORRUPT",
            ResultCode::NotFound => "SQLITE_NOTFOUND",
            ResultCode::Full => "SQLITE_FULL",
            ResultCode::CantOpen => "SQLITE_CANTOPEN",
            ResultCode::Protocol => "SQLITE_PROTOCOL",
            ResultCode::Empty => "SQLITE_EMPTY",
            ResultCode::Schema => "SQLITE_SCHEMA",
            ResultCode::TooBig => "SQLITE_TOOBIG",
            ResultCode::Constraint => "SQLITE_CONSTRAINT",
            ResultCode::Mismatch => "SQLITE_MISMATCH",
            ResultCode::Misuse => "SQLITE_MISUSE",
            ResultCode::NoLfs => "SQLITE_NOLFS",
            ResultCode::Auth => "SQLITE_AUTH",
            ResultCode::Format => "SQLITE_FORMAT",
            ResultCode::Range => "SQLITE_RANGE",
            ResultCode::NotADb => "SQLITE_NOTADB",
            ResultCode::Notice => "SQLITE_NOTICE",
            ResultCode::Warning => "SQLITE_WARNING",
            ResultCode::Row => "SQLITE_ROW",
            ResultCode::Done => "SQLITE_DONE",
            ResultCode::Other(code) => return write!(f, "SQLITE_{code}"),
        };
        f.write_str(name)
    }
}

/// Reads the connection's current error message.
///
/// Falls back to the static description of `code` when the connection
/// pointer is null (a failed open may leave it unset).
pub(crate) fn engine_message(db: *mut ffi::sqlite3, code: c_int) -> String {
    if db.is_null() {
        return code_description(code);
    }
    // SAFETY: `db` is a live connection handle; the returned pointer is owned
    // by the engine and valid until the next call on this connection.
    let ptr = unsafe { ffi::sqlite3_errmsg(db) };
    if ptr.is_null() {
        return code_description(code);
    }
    // SAFETY: the engine returns a nul-terminated string.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Returns the engine's static English description of a result code.
pub(crate) fn code_description(code: c_int) -> String {
    // SAFETY: sqlite3_errstr accepts any code and returns a static string.
    let ptr = unsafe { ffi::sqlite3_errstr(code) };
    if ptr.is_null() {
        return format!("unknown error code {code}");
    }
    // SAFETY: static nul-terminated string owned by the engine.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
