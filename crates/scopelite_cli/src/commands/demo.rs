//! Demo command implementation.
//!
//! Inserts `1..=count` into `Things` through one reused statement, deletes
//! everything above 10, vacuums, saves the in-memory database to a file and
//! lists what was saved. A file left by a previous run is listed first.

use scopelite_core::{Connection, ProfileEvent, SqlResult};
use std::path::Path;
use tracing::info;

/// Runs the demo command.
pub fn run(count: i32, output: &Path, profile: bool) -> Result<(), Box<dyn std::error::Error>> {
    if output.exists() {
        let previous = Connection::open(output)?;
        if profile {
            previous.profile(print_timing);
        }
        println!("Previous run ({}):", output.display());
        print_things(&previous)?;
        println!();
    }

    let conn = Connection::open_in_memory()?;
    if profile {
        conn.profile(print_timing);
    }
    populate(&conn, count)?;
    conn.save_to_file(output)?;
    info!("Saved {} rows to {:?}", things(&conn)?.len(), output);

    let saved = Connection::open(output)?;
    println!("Saved ({}):", output.display());
    print_things(&saved)?;

    Ok(())
}

/// Builds the `Things` table and trims it to the first ten values.
pub fn populate(conn: &Connection, count: i32) -> SqlResult<()> {
    conn.execute("create table Things (Content Text)")?;

    let mut insert = conn.prepare("insert into Things values (?)")?;
    for value in 1..=count {
        insert.bind(1, value)?;
        insert.execute()?;
        insert.reset()?;
    }
    drop(insert);

    conn.execute("delete from Things where cast(Content as integer) > 10")?;
    conn.execute("vacuum")
}

/// Reads every `Things` row in insertion order.
pub fn things(conn: &Connection) -> SqlResult<Vec<f64>> {
    let mut stmt = conn.prepare("select Content from Things order by rowid")?;
    let rows = stmt.query_map(|row| Ok(row.double(0)))?;
    rows.collect()
}

fn print_things(conn: &Connection) -> SqlResult<()> {
    for (index, value) in things(conn)?.iter().enumerate() {
        println!("[{:2}]: {:.2}", index + 1, value);
    }
    Ok(())
}

fn print_timing(event: &ProfileEvent<'_>) {
    println!(
        "{:>10.3} ms  {}",
        event.elapsed().as_secs_f64() * 1000.0,
        event.sql()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_ten_values() {
        let conn = Connection::open_in_memory().unwrap();
        populate(&conn, 500).unwrap();
        let expected: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(things(&conn).unwrap(), expected);
    }

    #[test]
    fn saves_and_reruns() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("Backup.db");

        run(50, &output, false).unwrap();
        run(5, &output, true).unwrap();

        let saved = Connection::open(&output).unwrap();
        assert_eq!(things(&saved).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
