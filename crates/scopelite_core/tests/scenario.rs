//! End-to-end scenarios across connection, statement, cursor and backup.

use scopelite_core::{Connection, End, SqlResult};
use tempfile::TempDir;

fn contents(conn: &Connection) -> SqlResult<Vec<String>> {
    let mut stmt = conn.prepare("select Content from Things order by rowid")?;
    let rows = stmt.query_map(|row| row.get::<String>(0))?;
    rows.collect()
}

#[test]
fn hello_world_reaches_end() {
    let conn = Connection::open_in_memory().unwrap();
    let mut stmt = conn.prepare("select 'Hello world!'").unwrap();
    let mut reader = stmt.execute_reader().unwrap();

    assert!(reader != End);
    let row = reader.row().unwrap();
    assert_eq!(row.text(0).as_deref(), Some("Hello world!"));

    reader.advance().unwrap();
    assert!(reader == End);
}

#[test]
fn things_survive_vacuum_and_save_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("things.db");

    let conn = Connection::open_in_memory().unwrap();
    conn.execute("create table Things (Content Text)").unwrap();

    let mut insert = conn.prepare("insert into Things values (?)").unwrap();
    for n in 1..=100_000 {
        insert.bind(1, n).unwrap();
        insert.execute().unwrap();
        insert.reset().unwrap();
    }
    drop(insert);

    // Text affinity would compare against '10' as a string.
    conn.execute("delete from Things where cast(Content as integer) > 10")
        .unwrap();
    conn.execute("vacuum").unwrap();

    let expected: Vec<String> = (1..=10).map(|n| n.to_string()).collect();
    assert_eq!(contents(&conn).unwrap(), expected);

    conn.save_to_file(&path).unwrap();
    drop(conn);

    let reopened = Connection::open(&path).unwrap();
    assert_eq!(contents(&reopened).unwrap(), expected);
}

#[test]
fn cursor_over_n_rows_yields_n_rows_then_end() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute("create table Numbers (n integer)").unwrap();
    let mut insert = conn.prepare("insert into Numbers values (?)").unwrap();
    for n in 0..37i64 {
        insert.bind(1, n).unwrap();
        insert.execute().unwrap();
        insert.reset().unwrap();
    }
    drop(insert);

    let mut select = conn.prepare("select n from Numbers").unwrap();
    let mut reader = select.execute_reader().unwrap();
    let mut has_row_states = 0;
    while reader.has_row() {
        has_row_states += 1;
        reader.advance().unwrap();
    }
    assert_eq!(has_row_states, 37);
    assert!(reader == End);
}

#[test]
fn file_database_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.db");

    {
        let mut conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "create table People (Name text, Age integer);
             insert into People values ('Joe', 42);",
        )
        .unwrap();
        conn.close().unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    let mut stmt = conn.prepare("select Name, Age from People").unwrap();
    let reader = stmt.execute_reader().unwrap();
    let row = reader.row().unwrap();
    assert_eq!(row.get::<String>(0).unwrap(), "Joe");
    assert_eq!(row.get::<i32>(1).unwrap(), 42);
}

#[test]
fn backup_into_file_connection() {
    let dir = TempDir::new().unwrap();
    let source = Connection::open_in_memory().unwrap();
    source
        .execute_batch(
            "create table Things (Content Text);
             insert into Things values ('a');
             insert into Things values ('b');",
        )
        .unwrap();

    let mut destination = Connection::open(dir.path().join("copy.db")).unwrap();
    source.backup_to(&mut destination).unwrap();

    assert_eq!(contents(&destination).unwrap(), vec!["a", "b"]);
}
