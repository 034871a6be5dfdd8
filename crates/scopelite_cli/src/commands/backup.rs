//! Backup command implementation.

use scopelite_core::{Backup, BackupConfig, Connection, PageCount};
use std::path::Path;
use tracing::info;

/// Copies the database at `db_path` into `output_path`.
///
/// The destination is overwritten page by page while the source stays
/// readable.
pub fn run(
    db_path: &Path,
    output_path: &Path,
    pages_per_step: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Backing up {:?} to {:?}", db_path, output_path);

    let source = Connection::open(db_path)?;
    let mut destination = Connection::open(output_path)?;

    let config = BackupConfig::default()
        .pages_per_step(pages_per_step.map_or(PageCount::All, PageCount::Pages));

    let mut steps = 0u32;
    let mut backup = Backup::new(&mut destination, &source)?;
    backup.run_with_progress(&config, |progress| {
        steps += 1;
        println!(
            "  Step {steps}: {}/{} pages",
            progress.copied(),
            progress.pagecount
        );
    })?;
    let pages = backup.pagecount();
    backup.finish()?;
    destination.close()?;

    println!("✓ Backup created successfully");
    println!("  Path: {:?}", output_path);
    println!("  Pages: {pages}");
    println!("  Steps: {steps}");

    Ok(())
}
