//! Engine handle.

use crate::backup::{Backup, BackupConfig};
use crate::config::{Config, Location};
use crate::error::{engine_message, SqlError, SqlResult};
use crate::profile::{ProfileEvent, ProfileHook, ProfileSlot};
use crate::statement::{compile, Statement};
use crate::value::Value;
use libsqlite3_sys as ffi;
use std::ffi::{c_int, c_void, CString};
use std::fmt;
use std::path::Path;
use std::ptr::{self, NonNull};

/// An open database.
///
/// `Connection` is the entry point for everything else: statements, readers,
/// rows and backup sessions all borrow it, so none of them can be used once
/// it is gone.
///
/// # Opening a Connection
///
/// ```rust,ignore
/// use scopelite_core::Connection;
///
/// let conn = Connection::open("things.db")?;
/// conn.execute("create table Things (Content text)")?;
/// ```
///
/// # In-Memory Databases
///
/// ```rust,ignore
/// let conn = Connection::open_in_memory()?;
/// ```
///
/// # Closing
///
/// The handle is released on drop. Call [`Connection::close`] to observe a
/// failure instead of having it logged.
pub struct Connection {
    /// Engine handle; null once closed.
    db: *mut ffi::sqlite3,
    /// Where the database lives.
    location: Location,
    /// Opened through the UTF-16 entry point.
    wide: bool,
    /// Profiling hook registered with the engine, if any.
    profile: ProfileSlot,
}

// SAFETY: the bundled engine is compiled in serialized threading mode, so a
// handle may move between threads. `Connection` is not `Sync`: borrowed
// statements are not safe to drive from two threads at once.
unsafe impl Send for Connection {}

impl Connection {
    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::Open` if the file cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> SqlResult<Self> {
        Self::open_with_config(Location::file(path), &Config::default())
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> SqlResult<Self> {
        Self::open_with_config(Location::Memory, &Config::default())
    }

    /// Opens (or creates) a database file through the UTF-16 entry point.
    ///
    /// A newly created database uses UTF-16 as its text encoding.
    pub fn open_wide(path: impl AsRef<Path>) -> SqlResult<Self> {
        Self::open_with_config(Location::file(path), &Config::new().wide(true))
    }

    /// Opens a private in-memory database with UTF-16 text encoding.
    pub fn open_wide_memory() -> SqlResult<Self> {
        Self::open_with_config(Location::Memory, &Config::new().wide(true))
    }

    /// Opens a database with custom configuration.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use scopelite_core::{Config, Connection, Location};
    /// use std::time::Duration;
    ///
    /// let config = Config::default()
    ///     .create_if_missing(false)
    ///     .busy_timeout(Duration::from_secs(1));
    /// let conn = Connection::open_with_config(Location::file("things.db"), &config)?;
    /// ```
    pub fn open_with_config(location: Location, config: &Config) -> SqlResult<Self> {
        let name = location.engine_name();
        let mut db = ptr::null_mut();

        let rc = if config.wide {
            let mut wide: Vec<u16> = name.encode_utf16().collect();
            if wide.contains(&0) {
                return Err(interior_nul());
            }
            wide.push(0);
            // SAFETY: `wide` is nul-terminated UTF-16 and outlives the call.
            unsafe { ffi::sqlite3_open16(wide.as_ptr().cast::<c_void>(), &mut db) }
        } else {
            let Ok(name) = CString::new(name) else {
                return Err(interior_nul());
            };
            // SAFETY: `name` is nul-terminated; a null VFS selects the default.
            unsafe { ffi::sqlite3_open_v2(name.as_ptr(), &mut db, config.open_flags(), ptr::null()) }
        };

        if rc != ffi::SQLITE_OK {
            let message = engine_message(db, rc);
            if !db.is_null() {
                // SAFETY: the engine may allocate a handle even when the open
                // fails; it must still be released.
                unsafe { ffi::sqlite3_close(db) };
            }
            tracing::debug!(%location, rc, %message, "open failed");
            return Err(SqlError::open(rc, message));
        }

        // SAFETY: `db` was just opened successfully.
        unsafe {
            ffi::sqlite3_extended_result_codes(db, c_int::from(config.extended_result_codes));
            if !config.busy_timeout.is_zero() {
                let millis = c_int::try_from(config.busy_timeout.as_millis()).unwrap_or(c_int::MAX);
                ffi::sqlite3_busy_timeout(db, millis);
            }
        }

        tracing::debug!(%location, wide = config.wide, "connection opened");
        Ok(Self {
            db,
            location,
            wide: config.wide,
            profile: ProfileSlot::default(),
        })
    }

    /// Closes the connection.
    ///
    /// Closing an already closed connection does nothing.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::Close` if the engine refuses, which only happens
    /// when a statement or backup session was leaked with `mem::forget`.
    /// The connection stays open and keeps its profiling hook.
    pub fn close(&mut self) -> SqlResult<()> {
        if self.db.is_null() {
            return Ok(());
        }

        // SAFETY: `db` is live. Statements and backups borrow `self`, so none
        // can exist while `&mut self` is held unless they were leaked.
        let rc = unsafe { ffi::sqlite3_close(self.db) };
        if rc != ffi::SQLITE_OK {
            return Err(SqlError::close(rc, engine_message(self.db, rc)));
        }
        self.db = ptr::null_mut();
        // The engine no longer holds the hook; release it.
        self.profile.install(self.db, None);
        tracing::debug!(location = %self.location, "connection closed");
        Ok(())
    }

    /// Returns true until the connection is closed.
    pub fn is_open(&self) -> bool {
        !self.db.is_null()
    }

    /// Returns where the database lives.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Returns true if the connection was opened through the UTF-16 entry point.
    pub fn is_wide(&self) -> bool {
        self.wide
    }

    /// Registers a hook invoked after every statement finishes.
    ///
    /// Replaces any previously registered hook.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// conn.profile(|event| {
    ///     println!("{} took {:?}", event.sql(), event.elapsed());
    /// });
    /// ```
    pub fn profile<F>(&self, hook: F)
    where
        F: FnMut(&ProfileEvent<'_>) + Send + 'static,
    {
        self.profile.install(self.db, Some(Box::new(hook) as ProfileHook));
    }

    /// Registers a hook together with an owned context value.
    ///
    /// The context is handed to every call by mutable reference and dropped
    /// when the hook is replaced or cleared.
    pub fn profile_with_context<C, F>(&self, mut hook: F, mut context: C)
    where
        C: Send + 'static,
        F: FnMut(&mut C, &ProfileEvent<'_>) + Send + 'static,
    {
        self.profile(move |event| hook(&mut context, event));
    }

    /// Removes the profiling hook.
    pub fn clear_profile(&self) {
        self.profile.install(self.db, None);
    }

    /// Returns true if a profiling hook is registered.
    pub fn is_profiling(&self) -> bool {
        self.profile.is_installed()
    }

    /// Compiles a statement.
    pub fn prepare(&self, sql: &str) -> SqlResult<Statement<'_>> {
        let mut statement = Statement::new(self);
        statement.prepare(sql)?;
        Ok(statement)
    }

    /// Runs a single statement to completion.
    pub fn execute(&self, sql: &str) -> SqlResult<()> {
        self.prepare(sql)?.execute()
    }

    /// Binds `params` to parameters `1..=params.len()` and runs the statement.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use scopelite_core::Value;
    ///
    /// conn.execute_with(
    ///     "insert into People values (?, ?)",
    ///     &[Value::from("Joe"), Value::from(42)],
    /// )?;
    /// ```
    pub fn execute_with(&self, sql: &str, params: &[Value<'_>]) -> SqlResult<()> {
        let mut statement = self.prepare(sql)?;
        statement.bind_all(params)?;
        statement.execute()
    }

    /// Runs every statement in a script, in order.
    ///
    /// Stops at the first failure; statements before it stay applied.
    pub fn execute_batch(&self, sql: &str) -> SqlResult<()> {
        let mut rest = sql;
        while !rest.is_empty() {
            let (raw, consumed) = compile(self, rest)?;
            if let Some(raw) = raw {
                run_compiled(self, raw)?;
            }
            if consumed == 0 {
                break;
            }
            rest = rest.get(consumed..).unwrap_or_default();
        }
        Ok(())
    }

    /// Returns the number of rows changed by the most recent statement.
    pub fn changes(&self) -> u64 {
        if self.db.is_null() {
            return 0;
        }
        // SAFETY: `db` is live.
        let changes = unsafe { ffi::sqlite3_changes(self.db) };
        u64::try_from(changes).unwrap_or(0)
    }

    /// Returns the number of rows changed since the connection was opened.
    pub fn total_changes(&self) -> u64 {
        if self.db.is_null() {
            return 0;
        }
        // SAFETY: `db` is live.
        let changes = unsafe { ffi::sqlite3_total_changes(self.db) };
        u64::try_from(changes).unwrap_or(0)
    }

    /// Returns the rowid of the most recent successful insert.
    pub fn last_insert_rowid(&self) -> i64 {
        if self.db.is_null() {
            return 0;
        }
        // SAFETY: `db` is live.
        unsafe { ffi::sqlite3_last_insert_rowid(self.db) }
    }

    /// Returns true outside an explicit transaction.
    pub fn is_autocommit(&self) -> bool {
        if self.db.is_null() {
            return true;
        }
        // SAFETY: `db` is live.
        unsafe { ffi::sqlite3_get_autocommit(self.db) != 0 }
    }

    /// Copies this database over `destination`.
    pub fn backup_to(&self, destination: &mut Connection) -> SqlResult<()> {
        let mut backup = Backup::new(destination, self)?;
        backup.run_to_completion(&BackupConfig::default())?;
        backup.finish()
    }

    /// Copies this database into a file, replacing its contents.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let conn = Connection::open_in_memory()?;
    /// conn.execute("create table Things (Content text)")?;
    /// conn.save_to_file("things.db")?;
    /// ```
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> SqlResult<()> {
        let mut destination = Connection::open(path)?;
        self.backup_to(&mut destination)?;
        destination.close()
    }

    /// Raw engine handle; null once closed.
    pub(crate) fn handle(&self) -> *mut ffi::sqlite3 {
        self.db
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(location = %self.location, %err, "failed to close connection");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("location", &self.location)
            .field("open", &self.is_open())
            .field("wide", &self.wide)
            .finish()
    }
}

/// Steps a compiled script statement to completion and finalizes it.
fn run_compiled(conn: &Connection, raw: NonNull<ffi::sqlite3_stmt>) -> SqlResult<()> {
    let stmt = raw.as_ptr();
    let rc = loop {
        // SAFETY: `stmt` was compiled against `conn` and is finalized below.
        match unsafe { ffi::sqlite3_step(stmt) } {
            ffi::SQLITE_ROW => continue,
            rc => break rc,
        }
    };
    let result = if rc == ffi::SQLITE_DONE {
        Ok(())
    } else {
        Err(SqlError::step(rc, engine_message(conn.handle(), rc)))
    };
    // SAFETY: `stmt` is live and never used again.
    unsafe { ffi::sqlite3_finalize(stmt) };
    result
}

fn interior_nul() -> SqlError {
    SqlError::open(ffi::SQLITE_CANTOPEN, "path contains an interior nul byte")
}
