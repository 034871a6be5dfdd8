//! scopelite CLI
//!
//! Command-line tools for SQLite databases, built on scopelite.
//!
//! # Commands
//!
//! - `query` - Run a query and print its rows
//! - `exec` - Run a SQL script
//! - `backup` - Copy a database into a file
//! - `demo` - Run the Things insert/delete/vacuum/save scenario
//! - `types` - Show how each bindable kind is stored

mod commands;

use clap::{Parser, Subcommand};
use scopelite_core::Connection;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// scopelite command-line database tools.
#[derive(Parser)]
#[command(name = "scopelite")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file (in-memory if omitted)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print its rows
    Query {
        /// The SQL query
        sql: String,

        /// Show column provenance (database, table, origin column)
        #[arg(short, long)]
        metadata: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a SQL script
    Exec {
        /// The SQL script (one or more statements)
        sql: String,
    },

    /// Copy the database into a file
    Backup {
        /// Destination file (overwritten)
        #[arg(short, long)]
        output: PathBuf,

        /// Pages copied per step (all at once if omitted)
        #[arg(long)]
        pages_per_step: Option<u32>,
    },

    /// Run the Things scenario: insert, delete, vacuum, save, reopen
    Demo {
        /// Number of rows to insert
        #[arg(short, long, default_value = "100000")]
        count: i32,

        /// File the result is saved to
        #[arg(short, long, default_value = "Backup.db")]
        output: PathBuf,

        /// Print per-statement timings
        #[arg(long)]
        profile: bool,
    },

    /// Show how each bindable kind is stored
    Types,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Query {
            sql,
            metadata,
            format,
        } => {
            let conn = open(cli.path.as_deref())?;
            commands::query::run(&conn, &sql, metadata, &format)?;
        }
        Commands::Exec { sql } => {
            let conn = open(cli.path.as_deref())?;
            commands::exec::run(&conn, &sql)?;
        }
        Commands::Backup {
            output,
            pages_per_step,
        } => {
            let path = cli.path.ok_or("Database path required for backup")?;
            commands::backup::run(&path, &output, pages_per_step)?;
        }
        Commands::Demo {
            count,
            output,
            profile,
        } => {
            commands::demo::run(count, &output, profile)?;
        }
        Commands::Types => {
            commands::types::run()?;
        }
        Commands::Version => {
            println!("scopelite CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("SQLite v{}", scopelite_core::version());
        }
    }

    Ok(())
}

/// Opens the database at `path`, or a private in-memory one.
fn open(path: Option<&Path>) -> Result<Connection, Box<dyn std::error::Error>> {
    let conn = match path {
        Some(path) => Connection::open(path)?,
        None => Connection::open_in_memory()?,
    };
    Ok(conn)
}
