//! Query command implementation.

use scopelite_core::{ColumnValue, Connection, SqlResult};
use serde::Serialize;

/// Query result.
#[derive(Debug, Serialize)]
pub struct QueryResult {
    /// Result columns.
    pub columns: Vec<ColumnInfo>,
    /// Rows, one cell per column.
    pub rows: Vec<Vec<Cell>>,
}

/// Description of one result column.
#[derive(Debug, Default, Serialize)]
pub struct ColumnInfo {
    /// Display name.
    pub name: String,
    /// Source database, if the column is a direct table reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Source table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Source table column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// One value with its storage class.
#[derive(Debug, Serialize)]
pub struct Cell {
    /// Storage class name.
    #[serde(rename = "type")]
    pub type_name: &'static str,
    /// The value.
    pub value: serde_json::Value,
}

impl From<ColumnValue> for Cell {
    fn from(value: ColumnValue) -> Self {
        let type_name = value.column_type().name();
        let value = match value {
            ColumnValue::Null => serde_json::Value::Null,
            ColumnValue::Integer(number) => number.into(),
            ColumnValue::Float(number) => serde_json::Number::from_f64(number)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ColumnValue::Text(text) => text.into(),
            blob @ ColumnValue::Blob(_) => blob.to_string().into(),
        };
        Self { type_name, value }
    }
}

/// Runs the query command.
pub fn run(
    conn: &Connection,
    sql: &str,
    show_metadata: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(conn, sql, show_metadata)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result, show_metadata);
        }
    }

    Ok(())
}

/// Runs `sql` and gathers every row.
pub fn collect(conn: &Connection, sql: &str, show_metadata: bool) -> SqlResult<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<ColumnInfo> = (0..stmt.column_count())
        .map(|index| {
            let name = stmt.column_name(index).unwrap_or_default();
            if show_metadata {
                ColumnInfo {
                    name,
                    database: stmt.column_database_name(index),
                    table: stmt.column_table_name(index),
                    origin: stmt.column_origin_name(index),
                }
            } else {
                ColumnInfo {
                    name,
                    ..ColumnInfo::default()
                }
            }
        })
        .collect();

    let mut rows = Vec::new();
    let mut reader = stmt.execute_reader()?;
    while let Some(row) = reader.next_row()? {
        rows.push(
            (0..row.column_count())
                .map(|index| Cell::from(row.value(index)))
                .collect(),
        );
    }

    Ok(QueryResult { columns, rows })
}

fn print_text_output(result: &QueryResult, show_metadata: bool) {
    let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    println!("{}", names.join(" | "));

    if show_metadata {
        for column in &result.columns {
            println!("  {}:", column.name);
            println!("    Database: {}", column.database.as_deref().unwrap_or("-"));
            println!("    Table:    {}", column.table.as_deref().unwrap_or("-"));
            println!("    Origin:   {}", column.origin.as_deref().unwrap_or("-"));
        }
    }

    for (index, row) in result.rows.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match &cell.value {
                serde_json::Value::String(text) => format!("{text} ({})", cell.type_name),
                other => format!("{other} ({})", cell.type_name),
            })
            .collect();
        println!("[{:2}]: {}", index + 1, cells.join(" | "));
    }

    println!("\n{} row(s)", result.rows.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopelite_testkit::scenarios::{people_table, things_database};
    use scopelite_testkit::with_temp_db;

    #[test]
    fn collects_rows_and_types() {
        let conn = Connection::open_in_memory().unwrap();
        let result = collect(
            &conn,
            "select 1 as One, 'two' as Two, null as Missing, x'0a' as Bytes",
            false,
        )
        .unwrap();

        let names: Vec<_> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Two", "Missing", "Bytes"]);
        assert_eq!(result.rows.len(), 1);

        let types: Vec<_> = result.rows[0].iter().map(|c| c.type_name).collect();
        assert_eq!(types, vec!["INTEGER", "TEXT", "NULL", "BLOB"]);
        assert_eq!(result.rows[0][3].value, serde_json::json!("x'0a'"));
    }

    #[test]
    fn metadata_names_source_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "create table Things (Content Text);
             insert into Things values ('Joe');",
        )
        .unwrap();

        let result = collect(&conn, "select Content, 1 + 1 from Things", true).unwrap();
        assert_eq!(result.columns[0].table.as_deref(), Some("Things"));
        assert_eq!(result.columns[0].origin.as_deref(), Some("Content"));
        assert_eq!(result.columns[1].table, None);
    }

    #[test]
    fn metadata_survives_an_empty_result() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("create table Things (Content Text)").unwrap();

        let result = collect(&conn, "select Content from Things", true).unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.columns[0].database.as_deref(), Some("main"));
        assert_eq!(result.columns[0].table.as_deref(), Some("Things"));
        assert_eq!(result.columns[0].origin.as_deref(), Some("Content"));
    }

    #[test]
    fn json_output_skips_missing_metadata() {
        let conn = Connection::open_in_memory().unwrap();
        let result = collect(&conn, "select 2.5 as Half", false).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "columns": [{ "name": "Half" }],
                "rows": [[{ "type": "FLOAT", "value": 2.5 }]],
            })
        );
    }

    #[test]
    fn collects_every_row() {
        let db = things_database(30);
        let sql = "select Content from Things where cast(Content as integer) > 20";
        let result = collect(&db, sql, false).unwrap();
        assert_eq!(result.rows.len(), 10);
    }

    #[test]
    fn null_and_blob_cells() {
        with_temp_db(|conn| {
            people_table(conn).unwrap();
            let sql = "select Age, Photo from People where Name = 'Ann'";
            let result = collect(conn, sql, false).unwrap();
            assert_eq!(result.rows[0][0].type_name, "NULL");
            assert_eq!(result.rows[0][1].type_name, "BLOB");
        });
    }
}
