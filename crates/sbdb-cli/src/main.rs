mod commands;
mod config;
mod models;
mod registry;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sbdb_eval::VerifyError;
use sbdb_generate::{BatchError, SpaceError};
use sbdb_store::{StoreError, TrackOperation};
use thiserror::Error;

use config::load_config;
use models::ModelKind;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("table error: {0}")]
    Core(#[from] sbdb_core::Error),
    #[error("variable space error: {0}")]
    Space(#[from] SpaceError),
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),
    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("verification failed: {exceeding} cell(s) exceed tolerance, {type_mismatches} type mismatch(es)")]
    VerificationFailed { exceeding: u64, type_mismatches: u64 },
}

#[derive(Parser, Debug)]
#[command(name = "sbdb", version, about = "Set-based design database toolkit")]
struct Cli {
    /// Path to the TOML config file (defaults to ./sbdb.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enumerate the combinations of a variable-set file.
    Enumerate(EnumerateArgs),
    /// Build a reference-model library over a variable set and export it.
    Generate(GenerateArgs),
    /// Compare a generated library against a reference library.
    Verify(VerifyArgs),
    /// Maintain the dataset generation record.
    Track(TrackArgs),
    /// Print the JSON Schema of variable-set files.
    Schema(SchemaArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Args, Debug)]
struct EnumerateArgs {
    /// Variable-set definition (JSON object of name to values).
    #[arg(long)]
    vars: PathBuf,
    /// Write combinations here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Output directory for runs.
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Variable-set definition (JSON object of name to values).
    #[arg(long)]
    vars: PathBuf,
    /// Reference model to instantiate.
    #[arg(long, value_enum)]
    model: ModelKind,
    /// Attributes to report, comma separated (defaults to the model's own list).
    #[arg(long, value_delimiter = ',')]
    attrs: Vec<String>,
    /// Collection name; files are written as `<name>_collection.{csv,json}`.
    #[arg(long)]
    name: Option<String>,
    /// Base directory for `datasets/` (overrides `[generate] out_dir`).
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Log progress every N objects (overrides `[generate] progress_interval`).
    #[arg(long)]
    progress_interval: Option<usize>,
    /// Stamp the generation into the dataset record.
    #[arg(long, default_value_t = false)]
    track: bool,
    /// Output directory for runs.
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Generated library CSV.
    #[arg(long)]
    generated: PathBuf,
    /// Reference library CSV.
    #[arg(long)]
    reference: PathBuf,
    /// Column joining the two tables.
    #[arg(long)]
    key: String,
    /// Relative tolerance (overrides `[verify] tolerance`).
    #[arg(long)]
    tolerance: Option<f64>,
    /// Rows to skip after the reference header (unit rows).
    #[arg(long, default_value_t = 0)]
    skip_rows: usize,
    /// Limit the number of examples in report.md.
    #[arg(long)]
    max_examples: Option<usize>,
    /// Directory for verification artifacts (defaults to the run directory).
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Fail when any cell exceeds tolerance or has mismatched types.
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Stamp a dataset verification for this collection into the record.
    #[arg(long, value_name = "COLLECTION")]
    track: Option<String>,
    /// Base directory holding the record file (overrides `[generate] out_dir`).
    #[arg(long, requires = "track")]
    base_dir: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Base directory holding `datasets/` and the record file.
    #[arg(long)]
    base_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: TrackCommand,
}

#[derive(Subcommand, Debug)]
enum TrackCommand {
    /// Rebuild the record from the collection files on disk.
    Init,
    /// Summarize the record.
    Status,
    /// Stamp an operation onto one collection.
    Update {
        #[arg(long)]
        collection: String,
        /// generation, dataset_verification, database_population or database_verification.
        #[arg(long)]
        operation: TrackOperation,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write the schema here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Enumerate(args) => commands::run_enumerate(args, &config),
        Command::Generate(args) => commands::run_generate(args, &config),
        Command::Verify(args) => commands::run_verify(args, &config),
        Command::Track(args) => commands::run_track(args, &config),
        Command::Schema(args) => commands::run_schema(args),
    }
}
