//! Forward-only row cursor.
//!
//! A [`Reader`] takes one engine step per advance. It starts *primed*: the
//! first step is taken when the reader is created, so [`Reader::has_row`]
//! is meaningful immediately.
//!
//! ```rust,ignore
//! let mut stmt = conn.prepare("select Content from Things")?;
//! let mut reader = stmt.execute_reader()?;
//! while reader != End {
//!     if let Some(row) = reader.row() {
//!         println!("{:?}", row.text(0));
//!     }
//!     reader.advance()?;
//! }
//! ```
//!
//! Two iteration layers sit on top:
//! - [`Reader::next_row`] lends each row in turn (`while let Some(row) = ...`)
//! - [`Reader::map`] turns the cursor into a standard [`Iterator`] of owned values

use crate::error::{SqlError, SqlResult};
use crate::row::Row;
use crate::statement::Statement;
use libsqlite3_sys as ffi;
use std::fmt;
use std::iter::FusedIterator;

/// Position of a [`Reader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Positioned on a row.
    HasRow,
    /// The result set is exhausted.
    Exhausted,
    /// The last step failed.
    Failed,
}

impl CursorState {
    /// Returns true for [`CursorState::Exhausted`] and [`CursorState::Failed`].
    pub fn is_terminal(self) -> bool {
        !matches!(self, CursorState::HasRow)
    }
}

/// End-of-rows sentinel.
///
/// A reader compares equal to `End` exactly when it can no longer advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct End;

/// A forward-only cursor over a statement's rows.
///
/// Holds its statement exclusively, so there is only ever one cursor per
/// execution and it cannot be cloned.
pub struct Reader<'s, 'c> {
    statement: &'s mut Statement<'c>,
    state: CursorState,
    /// Whether the current row was already handed out by `next_row`.
    delivered: bool,
    /// Rows stepped onto so far.
    rows: u64,
}

impl<'s, 'c> Reader<'s, 'c> {
    /// Takes the primed first step.
    pub(crate) fn new(statement: &'s mut Statement<'c>) -> SqlResult<Self> {
        let mut reader = Self {
            statement,
            state: CursorState::HasRow,
            delivered: false,
            rows: 0,
        };
        reader.step()?;
        Ok(reader)
    }

    /// Returns the current position.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Returns true while positioned on a row.
    pub fn has_row(&self) -> bool {
        self.state == CursorState::HasRow
    }

    /// Returns true once the cursor can no longer advance.
    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns the number of rows stepped onto so far.
    pub fn rows_read(&self) -> u64 {
        self.rows
    }

    /// Returns the current row, or `None` in a terminal state.
    ///
    /// The row borrows the reader, so it cannot be held across an advance.
    pub fn row(&self) -> Option<Row<'_>> {
        if !self.has_row() {
            return None;
        }
        self.statement.raw().map(Row::new)
    }

    /// Steps to the next row.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::Step` if the engine fails, after which the cursor
    /// is [`CursorState::Failed`]. Advancing a terminal cursor is refused
    /// with `SQLITE_MISUSE` and never reaches the engine.
    pub fn advance(&mut self) -> SqlResult<()> {
        if self.state.is_terminal() {
            return Err(SqlError::step(
                ffi::SQLITE_MISUSE,
                "cursor advanced past its last row",
            ));
        }
        self.step()
    }

    /// Lends the next row.
    ///
    /// The first call yields the primed row; each later call advances once.
    /// Returns `Ok(None)` at the end.
    ///
    /// ```rust,ignore
    /// while let Some(row) = reader.next_row()? {
    ///     println!("{}", row.int(0));
    /// }
    /// ```
    pub fn next_row(&mut self) -> SqlResult<Option<Row<'_>>> {
        if self.delivered && self.has_row() {
            self.step()?;
        }
        if !self.has_row() {
            return Ok(None);
        }
        self.delivered = true;
        Ok(self.row())
    }

    /// Converts the cursor into an iterator of mapped rows.
    ///
    /// Rows already consumed through [`Reader::next_row`] are not yielded
    /// again.
    pub fn map<T, F>(self, f: F) -> MappedRows<'s, 'c, F>
    where
        F: FnMut(&Row<'_>) -> SqlResult<T>,
    {
        MappedRows {
            reader: self,
            f,
            fused: false,
        }
    }

    fn step(&mut self) -> SqlResult<()> {
        self.delivered = false;
        match self.statement.step_raw() {
            ffi::SQLITE_ROW => {
                self.state = CursorState::HasRow;
                self.rows += 1;
                tracing::trace!(row = self.rows, "cursor step");
                Ok(())
            }
            ffi::SQLITE_DONE => {
                self.state = CursorState::Exhausted;
                tracing::trace!(rows = self.rows, "cursor exhausted");
                Ok(())
            }
            rc => {
                self.state = CursorState::Failed;
                Err(self.statement.step_error(rc))
            }
        }
    }
}

impl PartialEq<End> for Reader<'_, '_> {
    fn eq(&self, _: &End) -> bool {
        self.is_done()
    }
}

impl PartialEq<Reader<'_, '_>> for End {
    fn eq(&self, reader: &Reader<'_, '_>) -> bool {
        reader.is_done()
    }
}

impl fmt::Debug for Reader<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("state", &self.state)
            .field("rows", &self.rows)
            .finish()
    }
}

/// Iterator produced by [`Reader::map`] and [`Statement::query_map`].
///
/// Yields one mapped value per row. Stops for good after the last row or
/// after the first error.
pub struct MappedRows<'s, 'c, F> {
    reader: Reader<'s, 'c>,
    f: F,
    fused: bool,
}

impl<'s, 'c, F> MappedRows<'s, 'c, F> {
    /// Returns the underlying cursor's position.
    pub fn state(&self) -> CursorState {
        self.reader.state()
    }
}

impl<T, F> Iterator for MappedRows<'_, '_, F>
where
    F: FnMut(&Row<'_>) -> SqlResult<T>,
{
    type Item = SqlResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        let item = match self.reader.next_row() {
            Ok(Some(row)) => (self.f)(&row),
            Ok(None) => {
                self.fused = true;
                return None;
            }
            Err(err) => Err(err),
        };
        if item.is_err() {
            self.fused = true;
        }
        Some(item)
    }
}

impl<T, F> FusedIterator for MappedRows<'_, '_, F> where F: FnMut(&Row<'_>) -> SqlResult<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::error::ResultCode;

    fn numbers(count: i32) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("create table Numbers (n integer)").unwrap();
        let mut stmt = conn.prepare("insert into Numbers values (?)").unwrap();
        for n in 1..=count {
            stmt.bind(1, n).unwrap();
            stmt.execute().unwrap();
            stmt.reset().unwrap();
        }
        drop(stmt);
        conn
    }

    #[test]
    fn hello_world() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("select 'Hello world!'").unwrap();
        let mut reader = stmt.execute_reader().unwrap();

        assert!(reader != End);
        assert_eq!(
            reader.row().unwrap().text(0).as_deref(),
            Some("Hello world!")
        );

        reader.advance().unwrap();
        assert!(reader == End);
        assert!(End == reader);
        assert!(reader.row().is_none());
    }

    #[test]
    fn advance_counts_rows() {
        let conn = numbers(5);
        let mut stmt = conn.prepare("select n from Numbers order by n").unwrap();
        let mut reader = stmt.execute_reader().unwrap();

        let mut seen = Vec::new();
        while reader != End {
            seen.push(reader.row().unwrap().int(0));
            reader.advance().unwrap();
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(reader.rows_read(), 5);
        assert_eq!(reader.state(), CursorState::Exhausted);
    }

    #[test]
    fn empty_result_is_done_immediately() {
        let conn = numbers(0);
        let mut stmt = conn.prepare("select n from Numbers").unwrap();
        let reader = stmt.execute_reader().unwrap();
        assert!(reader.is_done());
        assert!(reader == End);
    }

    #[test]
    fn advance_past_end_is_misuse() {
        let conn = numbers(1);
        let mut stmt = conn.prepare("select n from Numbers").unwrap();
        let mut reader = stmt.execute_reader().unwrap();
        reader.advance().unwrap();
        assert!(reader.is_done());

        let err = reader.advance().unwrap_err();
        assert!(matches!(err, SqlError::Step { .. }));
        assert_eq!(err.result_code(), ResultCode::Misuse);
        assert_eq!(reader.state(), CursorState::Exhausted);
    }

    #[test]
    fn failed_step_is_terminal() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("select abs(-9223372036854775807 - 1)")
            .unwrap();
        let err = stmt.execute_reader().unwrap_err();
        assert!(matches!(err, SqlError::Step { .. }));
        assert_eq!(err.result_code(), ResultCode::Error);
        assert!(err.message().contains("integer overflow"));
    }

    #[test]
    fn failure_after_first_row_compares_equal_to_end() {
        let conn = numbers(0);
        conn.execute("insert into Numbers values (1)").unwrap();
        conn.execute("insert into Numbers values (-9223372036854775808)")
            .unwrap();

        let mut stmt = conn.prepare("select abs(n) from Numbers").unwrap();
        let mut reader = stmt.execute_reader().unwrap();
        assert_eq!(reader.row().unwrap().int(0), 1);

        assert!(reader.advance().is_err());
        assert_eq!(reader.state(), CursorState::Failed);
        assert!(reader == End);
        assert!(End == reader);
        assert!(!(reader != End));

        let err = reader.advance().unwrap_err();
        assert_eq!(err.result_code(), ResultCode::Misuse);
    }

    #[test]
    fn next_row_yields_primed_row_first() {
        let conn = numbers(3);
        let mut stmt = conn.prepare("select n from Numbers order by n").unwrap();
        let mut reader = stmt.execute_reader().unwrap();

        let mut seen = Vec::new();
        while let Some(row) = reader.next_row().unwrap() {
            seen.push(row.int(0));
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(reader.next_row().unwrap().is_none());
    }

    #[test]
    fn mapped_rows_iterate_and_fuse() {
        let conn = numbers(4);
        let mut stmt = conn.prepare("select n from Numbers order by n").unwrap();
        let mut rows = stmt.query_map(|row| row.get::<i64>(0)).unwrap();

        let values: Vec<i64> = rows.by_ref().map(Result::unwrap).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
        assert!(rows.next().is_none());
        assert_eq!(rows.state(), CursorState::Exhausted);
    }

    #[test]
    fn mapped_rows_stop_after_mapper_error() {
        let conn = numbers(3);
        let mut stmt = conn.prepare("select n from Numbers order by n").unwrap();
        let rows = stmt
            .query_map(|row| {
                let n = row.int(0);
                if n == 2 {
                    Err(SqlError::step(ffi::SQLITE_MISMATCH, "two"))
                } else {
                    Ok(n)
                }
            })
            .unwrap();

        let results: Vec<_> = rows.collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Ok(1));
        assert!(results[1].is_err());
    }

    #[test]
    fn reexecute_after_reset() {
        let conn = numbers(2);
        let mut stmt = conn.prepare("select n from Numbers order by n").unwrap();

        let first: Vec<i32> = stmt
            .query_map(|row| Ok(row.int(0)))
            .unwrap()
            .collect::<SqlResult<_>>()
            .unwrap();
        stmt.reset().unwrap();
        let second: Vec<i32> = stmt
            .query_map(|row| Ok(row.int(0)))
            .unwrap()
            .collect::<SqlResult<_>>()
            .unwrap();
        assert_eq!(first, second);
    }
}
