//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use scopelite_core::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The connection.
    pub conn: Connection,
    /// The file backing the connection, if any.
    path: Option<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self {
            conn: Connection::open_in_memory().expect("Failed to open in-memory database"),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a new in-memory test database with UTF-16 text encoding.
    pub fn wide_memory() -> Self {
        Self {
            conn: Connection::open_wide_memory().expect("Failed to open wide in-memory database"),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test database in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("test.db");
        let conn = Connection::open(&path).expect("Failed to open file database");

        Self {
            conn,
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns a path next to the database file that does not exist yet.
    ///
    /// Panics for in-memory databases.
    pub fn sibling(&self, name: &str) -> PathBuf {
        let dir = self
            ._temp_dir
            .as_ref()
            .expect("In-memory databases have no directory");
        dir.path().join(name)
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for TestDatabase {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust,ignore
/// use scopelite_testkit::with_temp_db;
///
/// #[test]
/// fn my_test() {
///     with_temp_db(|conn| {
///         conn.execute("create table t (x integer)").unwrap();
///     });
/// }
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Connection) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.conn)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Connection, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db
        .path()
        .expect("File database should have a path")
        .to_path_buf();
    f(&test_db.conn, &path)
}

/// Runs a mutable test with a temporary database.
pub fn with_temp_db_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut Connection) -> R,
{
    let mut test_db = TestDatabase::memory();
    f(&mut test_db.conn)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use scopelite_core::{SqlResult, Value};

    /// Creates `Things(Content Text)` and inserts `1..=count` through one
    /// reused statement.
    pub fn things_table(conn: &Connection, count: i32) -> SqlResult<()> {
        conn.execute("create table Things (Content Text)")?;
        conn.execute("begin")?;
        let mut insert = conn.prepare("insert into Things values (?)")?;
        for n in 1..=count {
            insert.bind(1, n)?;
            insert.execute()?;
            insert.reset()?;
        }
        drop(insert);
        conn.execute("commit")
    }

    /// Creates an in-memory database holding [`things_table`].
    pub fn things_database(count: i32) -> TestDatabase {
        let db = TestDatabase::memory();
        things_table(&db, count).expect("Failed to populate Things");
        db
    }

    /// Creates `People(Name Text, Age Integer, Photo Blob)` with a few rows.
    pub fn people_table(conn: &Connection) -> SqlResult<()> {
        conn.execute("create table People (Name Text, Age Integer, Photo Blob)")?;
        let rows: [(&str, Option<i32>, &[u8]); 3] = [
            ("Joe", Some(42), &[0xde, 0xad]),
            ("Ann", None, &[]),
            ("Bob", Some(7), &[0xbe, 0xef, 0x00]),
        ];
        for (name, age, photo) in rows {
            conn.execute_with(
                "insert into People values (?, ?, ?)",
                &[Value::from(name), Value::from(age), Value::from(photo)],
            )?;
        }
        Ok(())
    }

    /// Reads the first column of every row as `i64`.
    pub fn column_i64(conn: &Connection, sql: &str) -> SqlResult<Vec<i64>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(|row| row.get::<i64>(0))?;
        rows.collect()
    }

    /// Counts the rows of `table`.
    pub fn count_rows(conn: &Connection, table: &str) -> SqlResult<i64> {
        let values = column_i64(conn, &format!("select count(*) from {table}"))?;
        Ok(values.first().copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::scenarios::*;
    use super::*;

    #[test]
    fn memory_database_has_no_path() {
        let db = TestDatabase::memory();
        assert!(db.path().is_none());
        assert!(db.location().is_memory());
    }

    #[test]
    fn file_database_lives_in_temp_dir() {
        let db = TestDatabase::file();
        let path = db.path().unwrap().to_path_buf();
        assert!(path.exists());
        assert!(!db.sibling("copy.db").exists());
    }

    #[test]
    fn things_scenario() {
        let db = things_database(25);
        assert_eq!(count_rows(&db, "Things").unwrap(), 25);
        assert_eq!(
            column_i64(&db, "select max(cast(Content as integer)) from Things").unwrap(),
            vec![25]
        );
    }

    #[test]
    fn people_scenario() {
        with_temp_db(|conn| {
            people_table(conn).unwrap();
            assert_eq!(count_rows(conn, "People").unwrap(), 3);
        });
    }

    #[test]
    fn with_file_db_passes_path() {
        with_file_db(|conn, path| {
            assert!(path.ends_with("test.db"));
            conn.execute("create table t (x)").unwrap();
        });
    }

    #[test]
    fn with_temp_db_mut_allows_close() {
        with_temp_db_mut(|conn| {
            conn.close().unwrap();
            assert!(!conn.is_open());
        });
    }
}
