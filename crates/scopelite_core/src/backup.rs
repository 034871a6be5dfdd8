//! Online backup between two connections.
//!
//! A [`Backup`] copies the pages of a source database over a destination
//! database, either in one step or a few pages at a time. The destination is
//! borrowed exclusively and the source shared for the whole session, so
//! neither can be closed while it runs.
//!
//! ## Usage
//!
//! ```ignore
//! use scopelite_core::{Backup, BackupConfig, Connection, PageCount};
//!
//! let source = Connection::open("things.db")?;
//! let mut destination = Connection::open_in_memory()?;
//!
//! let mut backup = Backup::new(&mut destination, &source)?;
//! let config = BackupConfig::default().pages_per_step(PageCount::Pages(64));
//! backup.run_with_progress(&config, |progress| {
//!     println!("{}/{}", progress.copied(), progress.pagecount);
//! })?;
//! backup.finish()?;
//! ```

use crate::connection::Connection;
use crate::error::{code_description, engine_message, SqlError, SqlResult};
use libsqlite3_sys as ffi;
use std::ffi::{c_int, CString};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::thread;
use std::time::Duration;

/// How many pages one [`Backup::step`] copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    /// Every remaining page.
    All,
    /// At most this many pages.
    Pages(u32),
}

impl PageCount {
    fn as_raw(self) -> c_int {
        match self {
            PageCount::All => -1,
            PageCount::Pages(pages) => c_int::try_from(pages).unwrap_or(c_int::MAX),
        }
    }
}

/// Outcome of a single [`Backup::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStep {
    /// Pages were copied and more remain.
    More,
    /// Every page has been copied.
    Done,
    /// The engine could not lock a database file; retry later.
    Busy,
    /// A table in the source was locked by the same process; retry later.
    Locked,
}

/// Page counters reported after the most recent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupProgress {
    /// Pages still to copy.
    pub remaining: u32,
    /// Pages in the source database.
    pub pagecount: u32,
}

impl BackupProgress {
    /// Pages copied so far.
    pub fn copied(&self) -> u32 {
        self.pagecount.saturating_sub(self.remaining)
    }
}

/// Configuration for [`Backup::run_to_completion`].
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Pages copied per step.
    pub pages_per_step: PageCount,
    /// Pause before retrying a busy or locked step.
    pub retry_pause: Duration,
    /// Consecutive busy or locked steps tolerated before giving up.
    pub max_retries: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            pages_per_step: PageCount::All,
            retry_pause: Duration::from_millis(250),
            max_retries: 40,
        }
    }
}

impl BackupConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pages copied per step.
    #[must_use]
    pub const fn pages_per_step(mut self, pages: PageCount) -> Self {
        self.pages_per_step = pages;
        self
    }

    /// Sets the pause between retries.
    #[must_use]
    pub const fn retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Sets the number of consecutive retries tolerated.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// A backup session from one connection into another.
pub struct Backup<'d, 's> {
    raw: Option<NonNull<ffi::sqlite3_backup>>,
    destination: &'d mut Connection,
    _source: PhantomData<&'s Connection>,
}

impl<'d, 's> Backup<'d, 's> {
    /// Starts a session copying `source`'s main database over `destination`'s.
    pub fn new(destination: &'d mut Connection, source: &'s Connection) -> SqlResult<Self> {
        Self::new_with_names(destination, "main", source, "main")
    }

    /// Starts a session between named databases (`main`, `temp`, or an
    /// attached name).
    pub fn new_with_names(
        destination: &'d mut Connection,
        destination_name: &str,
        source: &'s Connection,
        source_name: &str,
    ) -> SqlResult<Self> {
        let dest_db = destination.handle();
        let src_db = source.handle();
        if dest_db.is_null() || src_db.is_null() {
            return Err(SqlError::backup(
                ffi::SQLITE_MISUSE,
                "database connection is closed",
            ));
        }
        let (Ok(dest_name), Ok(src_name)) = (CString::new(destination_name), CString::new(source_name))
        else {
            return Err(SqlError::backup(
                ffi::SQLITE_MISUSE,
                "database name contains an interior nul byte",
            ));
        };

        // SAFETY: both handles are live and distinct (one is borrowed
        // mutably); the names are nul-terminated.
        let raw = unsafe {
            ffi::sqlite3_backup_init(dest_db, dest_name.as_ptr(), src_db, src_name.as_ptr())
        };
        let Some(raw) = NonNull::new(raw) else {
            // SAFETY: `dest_db` is live; init failures are recorded on it.
            let rc = unsafe { ffi::sqlite3_extended_errcode(dest_db) };
            return Err(SqlError::backup(rc, engine_message(dest_db, rc)));
        };

        tracing::debug!(
            source = %source.location(),
            destination = %destination.location(),
            "backup started"
        );
        Ok(Self {
            raw: Some(raw),
            destination,
            _source: PhantomData,
        })
    }

    /// Copies up to `pages` pages.
    ///
    /// # Errors
    ///
    /// `SqlError::Backup` for any status other than more, done, busy and
    /// locked. The session cannot continue after an error.
    pub fn step(&mut self, pages: PageCount) -> SqlResult<BackupStep> {
        let Some(raw) = self.raw else {
            return Ok(BackupStep::Done);
        };
        // SAFETY: `raw` is a live session.
        let rc = unsafe { ffi::sqlite3_backup_step(raw.as_ptr(), pages.as_raw()) };
        match rc & 0xff {
            ffi::SQLITE_OK => Ok(BackupStep::More),
            ffi::SQLITE_DONE => Ok(BackupStep::Done),
            ffi::SQLITE_BUSY => Ok(BackupStep::Busy),
            ffi::SQLITE_LOCKED => Ok(BackupStep::Locked),
            _ => Err(self.error(rc)),
        }
    }

    /// Pages still to copy, as of the last step.
    pub fn remaining(&self) -> u32 {
        match self.raw {
            // SAFETY: `raw` is a live session.
            Some(raw) => u32::try_from(unsafe { ffi::sqlite3_backup_remaining(raw.as_ptr()) })
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Pages in the source database, as of the last step.
    pub fn pagecount(&self) -> u32 {
        match self.raw {
            // SAFETY: `raw` is a live session.
            Some(raw) => u32::try_from(unsafe { ffi::sqlite3_backup_pagecount(raw.as_ptr()) })
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Both counters at once.
    pub fn progress(&self) -> BackupProgress {
        BackupProgress {
            remaining: self.remaining(),
            pagecount: self.pagecount(),
        }
    }

    /// Steps until every page is copied.
    pub fn run_to_completion(&mut self, config: &BackupConfig) -> SqlResult<()> {
        self.run_with_progress(config, |_| {})
    }

    /// Steps until every page is copied, reporting progress after each step
    /// that copied pages.
    ///
    /// Busy and locked steps are retried after `retry_pause`; more than
    /// `max_retries` in a row fail the run.
    pub fn run_with_progress<F>(&mut self, config: &BackupConfig, mut progress: F) -> SqlResult<()>
    where
        F: FnMut(BackupProgress),
    {
        if config.pages_per_step == PageCount::Pages(0) {
            return Err(SqlError::backup(
                ffi::SQLITE_MISUSE,
                "a backup step must copy at least one page",
            ));
        }

        let mut retries = 0;
        loop {
            let status = self.step(config.pages_per_step)?;
            match status {
                BackupStep::More | BackupStep::Done => {
                    retries = 0;
                    let current = self.progress();
                    tracing::debug!(
                        remaining = current.remaining,
                        pagecount = current.pagecount,
                        "backup progress"
                    );
                    progress(current);
                    if status == BackupStep::Done {
                        return Ok(());
                    }
                }
                BackupStep::Busy | BackupStep::Locked => {
                    retries += 1;
                    if retries > config.max_retries {
                        let rc = if status == BackupStep::Busy {
                            ffi::SQLITE_BUSY
                        } else {
                            ffi::SQLITE_LOCKED
                        };
                        return Err(SqlError::backup(
                            rc,
                            format!("{} after {} retries", code_description(rc), config.max_retries),
                        ));
                    }
                    tracing::trace!(?status, retries, "backup waiting");
                    thread::sleep(config.retry_pause);
                }
            }
        }
    }

    /// Ends the session, reporting the engine's verdict on it.
    pub fn finish(mut self) -> SqlResult<()> {
        self.release()
    }

    fn release(&mut self) -> SqlResult<()> {
        let Some(raw) = self.raw.take() else {
            return Ok(());
        };
        // SAFETY: `raw` is live and never used again.
        let rc = unsafe { ffi::sqlite3_backup_finish(raw.as_ptr()) };
        if rc != ffi::SQLITE_OK {
            return Err(self.error(rc));
        }
        tracing::debug!("backup finished");
        Ok(())
    }

    fn error(&self, rc: c_int) -> SqlError {
        let dest_db = self.destination.handle();
        // SAFETY: the destination is live for the whole session.
        let recorded = unsafe { ffi::sqlite3_errcode(dest_db) };
        let message = if recorded & 0xff == rc & 0xff {
            engine_message(dest_db, rc)
        } else {
            code_description(rc)
        };
        SqlError::backup(rc, message)
    }
}

impl Drop for Backup<'_, '_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(%err, "backup session ended with an error");
        }
    }
}

impl fmt::Debug for Backup<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backup")
            .field("active", &self.raw.is_some())
            .field("progress", &self.progress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;

    fn populated(rows: i32) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("create table Things (Content text)").unwrap();
        let padding = "x".repeat(200);
        let mut stmt = conn.prepare("insert into Things values (?)").unwrap();
        for n in 0..rows {
            let text = format!("{n}{padding}");
            stmt.bind(1, &text).unwrap();
            stmt.execute().unwrap();
            stmt.reset().unwrap();
        }
        drop(stmt);
        conn
    }

    fn count(conn: &Connection) -> i32 {
        let mut stmt = conn.prepare("select count(*) from Things").unwrap();
        let reader = stmt.execute_reader().unwrap();
        reader.row().unwrap().int(0)
    }

    #[test]
    fn single_step_copies_everything() {
        let source = populated(50);
        let mut destination = Connection::open_in_memory().unwrap();

        let mut backup = Backup::new(&mut destination, &source).unwrap();
        assert_eq!(backup.step(PageCount::All).unwrap(), BackupStep::Done);
        assert_eq!(backup.remaining(), 0);
        backup.finish().unwrap();

        assert_eq!(count(&destination), 50);
    }

    #[test]
    fn incremental_steps_report_progress() {
        let source = populated(500);
        let mut destination = Connection::open_in_memory().unwrap();

        let mut backup = Backup::new(&mut destination, &source).unwrap();
        assert_eq!(backup.step(PageCount::Pages(1)).unwrap(), BackupStep::More);
        let first = backup.progress();
        assert!(first.pagecount > 1);
        assert_eq!(first.copied(), 1);

        let mut reports = Vec::new();
        let config = BackupConfig::new().pages_per_step(PageCount::Pages(4));
        backup
            .run_with_progress(&config, |progress| reports.push(progress))
            .unwrap();
        backup.finish().unwrap();

        assert!(reports.len() > 1);
        assert!(reports.windows(2).all(|w| w[0].remaining >= w[1].remaining));
        assert_eq!(reports.last().map(|p| p.remaining), Some(0));
        assert_eq!(count(&destination), 500);
    }

    #[test]
    fn destination_is_overwritten() {
        let source = populated(3);
        let mut destination = Connection::open_in_memory().unwrap();
        destination
            .execute("create table Leftover (x integer)")
            .unwrap();

        source.backup_to(&mut destination).unwrap();

        assert_eq!(count(&destination), 3);
        let err = destination.execute("select * from Leftover").unwrap_err();
        assert_eq!(err.result_code(), ResultCode::Error);
    }

    #[test]
    fn closed_destination_is_rejected() {
        let source = populated(1);
        let mut destination = Connection::open_in_memory().unwrap();
        destination.close().unwrap();

        let err = Backup::new(&mut destination, &source).unwrap_err();
        assert!(matches!(err, SqlError::Backup { .. }));
        assert_eq!(err.result_code(), ResultCode::Misuse);
    }

    #[test]
    fn unknown_database_name_fails() {
        let source = populated(1);
        let mut destination = Connection::open_in_memory().unwrap();

        let err = Backup::new_with_names(&mut destination, "main", &source, "nowhere").unwrap_err();
        assert!(matches!(err, SqlError::Backup { .. }));
        assert!(err.message().contains("nowhere"));
    }

    #[test]
    fn zero_page_steps_are_refused() {
        let source = populated(1);
        let mut destination = Connection::open_in_memory().unwrap();
        let mut backup = Backup::new(&mut destination, &source).unwrap();

        let config = BackupConfig::new().pages_per_step(PageCount::Pages(0));
        let err = backup.run_to_completion(&config).unwrap_err();
        assert_eq!(err.result_code(), ResultCode::Misuse);
    }

    #[test]
    fn dropping_a_session_releases_the_destination() {
        let source = populated(10);
        let mut destination = Connection::open_in_memory().unwrap();
        {
            let mut backup = Backup::new(&mut destination, &source).unwrap();
            backup.step(PageCount::Pages(1)).unwrap();
        }
        destination.close().unwrap();
    }

    #[test]
    fn default_config() {
        let config = BackupConfig::default();
        assert_eq!(config.pages_per_step, PageCount::All);
        assert_eq!(config.retry_pause, Duration::from_millis(250));
        assert_eq!(config.max_retries, 40);
    }
}
