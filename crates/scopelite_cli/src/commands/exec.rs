//! Exec command implementation.

use scopelite_core::Connection;
use tracing::info;

/// Runs every statement in `sql`.
pub fn run(conn: &Connection, sql: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Executing script against {}", conn.location());

    let before = conn.total_changes();
    conn.execute_batch(sql)?;

    println!("✓ Script executed");
    println!("  Rows changed: {}", conn.total_changes() - before);

    Ok(())
}
