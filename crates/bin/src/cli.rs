//! CLI argument definitions for the Fieldbook binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// SQLite database (default)
    Sqlite,
    /// In-memory with JSON persistence (for development and throwaway data)
    Inmemory,
}

/// Fieldbook offline record store
#[derive(Parser, Debug)]
#[command(name = "fieldbook")]
#[command(about = "Fieldbook: inspect and manage locally collected form records")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub backend_config: BackendConfig,

    /// Print JSON instead of aligned tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where records are stored
#[derive(clap::Args, Debug, Clone)]
pub struct BackendConfig {
    /// Storage backend to use
    #[arg(short, long, global = true, default_value = "sqlite", env = "FIELDBOOK_BACKEND")]
    pub backend: Backend,

    /// Data directory for storage files.
    /// For SQLite: stores fieldbook.db
    /// For InMemory: stores fieldbook.json
    #[arg(short = 'D', long, global = true, env = "FIELDBOOK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List, show and remove records
    #[command(subcommand)]
    Records(RecordsCommand),
    /// Show a table's variables in reconstructed form order
    Columns(TableArgs),
}

#[derive(Subcommand, Debug)]
pub enum RecordsCommand {
    /// List every record of a table, oldest first
    List(TableArgs),
    /// Show one record with its values
    Show(RecordArgs),
    /// Delete one record
    Delete(RecordArgs),
    /// Delete every record and variable descriptor of a table
    Clear(TableArgs),
}

/// Arguments naming a table
#[derive(clap::Args, Debug)]
pub struct TableArgs {
    /// Table name
    pub table: String,
}

/// Arguments naming one record
#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    /// Table name
    pub table: String,
    /// Record id
    pub id: String,
}
