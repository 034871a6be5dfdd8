//! Types command implementation.
//!
//! Stores one value of each bindable kind in a UTF-16 database and reports
//! the storage class and column provenance the engine gives back.

use scopelite_core::{type_name, Connection, Null, SqlResult, Value};

/// What the engine reports for one stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeReport {
    /// Value read back as text, `None` for NULL.
    pub text: Option<String>,
    /// Storage class name.
    pub type_name: &'static str,
    /// Source database.
    pub database: Option<String>,
    /// Source table column.
    pub origin: Option<String>,
    /// Source table.
    pub table: Option<String>,
    /// Display name.
    pub name: Option<String>,
}

/// Runs the types command.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_wide_memory()?;
    for report in describe(&conn)? {
        println!(
            "{} ({})",
            report.text.as_deref().unwrap_or("(null)"),
            report.type_name
        );
        println!("Column Database Name: {}", report.database.unwrap_or_default());
        println!("Column Origin Name: {}", report.origin.unwrap_or_default());
        println!("Column Table Name: {}", report.table.unwrap_or_default());
        println!("Column Name: {}", report.name.unwrap_or_default());
    }
    Ok(())
}

/// Inserts one value per bindable kind into `Things` and reads them back.
pub fn describe(conn: &Connection) -> SqlResult<Vec<TypeReport>> {
    conn.execute("create table Things (Content Text)")?;

    let wide: Vec<u16> = "Joe UTF-16".encode_utf16().collect();
    let missing: Option<Vec<u16>> = None;
    let values = [
        Value::from(c"Joe"),
        Value::from("Joe UTF-8"),
        Value::from(&wide),
        Value::from(123),
        Value::from(Null),
        Value::from(None::<i32>),
        Value::from(&missing),
    ];
    for value in values {
        conn.execute_with("insert into Things values (?)", &[value])?;
    }

    let mut stmt = conn.prepare("select Content as Value from Things")?;
    let rows = stmt.query_map(|row| {
        Ok(TypeReport {
            text: row.text(0),
            type_name: type_name(row.column_type(0)),
            database: row.database_name(0),
            origin: row.origin_name(0),
            table: row.table_name(0),
            name: row.name(0),
        })
    })?;
    rows.collect()
}
