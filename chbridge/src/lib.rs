//! Library module for the chbridge command-line front end.
//!
//! Argument parsing, profile resolution and output rendering live here so
//! they can be tested without a database. The binary in main.rs only
//! dispatches subcommands.

use chbridge_core::adapters::ConnectionProfile;
use chbridge_core::error::{BridgeError, Stage};
use chbridge_core::models::{TableDescriptor, TransferResult, TransferStatus};
use chbridge_core::type_mapping::{FlatFileType, NativeType, to_flat_file};
use chbridge_core::writer::db::DEFAULT_BATCH_SIZE;
use chbridge_core::writer::default_export_path;
use clap::{Args, Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable holding the credential token.
pub const TOKEN_ENV: &str = "CHBRIDGE_TOKEN";

/// Directory exports land in when neither `--output` nor `--output-dir` is given.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// CLI argument structure
#[derive(Parser, Debug)]
#[command(name = "chbridge")]
#[command(about = "Move rows between ClickHouse and delimited files")]
#[command(version)]
#[command(long_about = "
chbridge - ClickHouse to flat file bridge

Lists the tables of a ClickHouse database, exports selected columns of a
table to a comma-delimited file, and imports a delimited file into a new
all-text table.

CONNECTION:
  --config profile.json   {\"host\",\"port\",\"database\",\"username\",\"token\"}
  --host/--port/--database/--user flags, token from CHBRIDGE_TOKEN

EXAMPLES:
  chbridge --database analytics discover
  chbridge export --table events --columns id,ts --output-dir output
  chbridge --config prod.json import --file events.csv --delimiter ';'
")]
pub struct Cli {
    /// Logging and output flags
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Connection profile source
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Test the database connection
    Test,
    /// List tables and columns of the database
    Discover,
    /// Export selected columns of a table to a delimited file
    Export(ExportArgs),
    /// Import a delimited file into a newly created table
    Import(ImportArgs),
}

/// Arguments of `export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Source table
    #[arg(short, long)]
    pub table: String,

    /// Comma-separated column names to export
    #[arg(
        long,
        value_delimiter = ',',
        required_unless_present = "all_columns",
        conflicts_with = "all_columns"
    )]
    pub columns: Vec<String>,

    /// Export every column of the table
    #[arg(long)]
    pub all_columns: bool,

    /// Directory for `<table>_export.csv`
    #[arg(long, value_name = "DIR", conflicts_with = "output")]
    pub output_dir: Option<PathBuf>,

    /// Exact output file path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments of `import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Staged delimited file
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Field delimiter: one character, or `tab`
    #[arg(long, default_value = ",")]
    pub delimiter: String,

    /// Rows per INSERT statement
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Delete the staged file once the import has finished
    #[arg(long)]
    pub remove_source: bool,
}

/// Global flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all logs except errors")]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Where the connection profile comes from.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// JSON connection profile; flags below override its fields
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database host
    #[arg(long, global = true, env = "CHBRIDGE_HOST")]
    pub host: Option<String>,

    /// HTTP interface port
    #[arg(long, global = true, env = "CHBRIDGE_PORT")]
    pub port: Option<u16>,

    /// Database name
    #[arg(long, global = true, env = "CHBRIDGE_DATABASE")]
    pub database: Option<String>,

    /// Database user
    #[arg(long, global = true, env = "CHBRIDGE_USER")]
    pub user: Option<String>,

    /// Connect over HTTPS
    #[arg(long, global = true)]
    pub secure: bool,
}

fn parse_batch_size(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

/// Builds the connection profile for this invocation.
///
/// The configuration file, if any, is read and parsed once. Flags override
/// its fields, and `env_token` fills the token only when the file carries
/// none.
///
/// # Errors
/// Returns a validation error for a missing or unparseable configuration
/// file or an incomplete profile, and a file access error if the file
/// cannot be read.
pub async fn resolve_profile(
    args: &ConnectionArgs,
    env_token: Option<String>,
) -> chbridge_core::Result<ConnectionProfile> {
    let mut profile = match &args.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BridgeError::validation(format!(
                        "configuration file {} does not exist",
                        path.display()
                    ))
                } else {
                    BridgeError::file_access(Stage::Read, path, e)
                }
            })?;
            ConnectionProfile::from_json(&raw)?
        }
        None => ConnectionProfile::default(),
    };

    if let Some(host) = &args.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = args.port {
        profile.port = port;
    }
    if let Some(database) = &args.database {
        profile.database.clone_from(database);
    }
    if let Some(user) = &args.user {
        profile.username.clone_from(user);
    }
    if args.secure {
        profile.secure = true;
    }
    if !profile.has_token()
        && let Some(token) = env_token.filter(|t| !t.is_empty())
    {
        profile = profile.with_token(token);
    }

    profile.validate()?;
    Ok(profile)
}

/// Picks `table` out of a discovery result and marks the exported columns.
///
/// # Errors
/// Returns a validation error if the table does not exist, a named column
/// does not exist, or nothing ends up selected.
pub fn resolve_projection(
    tables: Vec<TableDescriptor>,
    table: &str,
    columns: &[String],
    all_columns: bool,
) -> chbridge_core::Result<TableDescriptor> {
    let mut descriptor = tables
        .into_iter()
        .find(|t| t.name == table)
        .ok_or_else(|| BridgeError::validation(format!("table '{table}' does not exist")))?;

    if all_columns {
        descriptor.select_all();
    } else {
        let names: Vec<&str> = columns
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        descriptor.select(&names)?;
    }

    if descriptor.selected_columns().is_empty() {
        return Err(BridgeError::validation("at least one column must be selected"));
    }
    Ok(descriptor)
}

/// Output path of an export.
pub fn export_destination(
    table: &str,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> PathBuf {
    output.map_or_else(
        || default_export_path(output_dir.unwrap_or(Path::new(DEFAULT_OUTPUT_DIR)), table),
        Path::to_path_buf,
    )
}

/// Renders a discovery result as an indented listing.
pub fn render_tables(tables: &[TableDescriptor]) -> String {
    let mut out = String::new();
    if tables.is_empty() {
        out.push_str("No tables found\n");
        return out;
    }

    for table in tables {
        let _ = writeln!(out, "{} ({} columns)", table.name, table.columns.len());
        for column in &table.columns {
            let native = NativeType::parse(&column.type_name);
            let flat = match to_flat_file(&column.type_name) {
                FlatFileType::Text => "text",
            };
            let _ = writeln!(
                out,
                "  {:<32} {:<32} -> {}{}",
                column.name,
                column.type_name,
                flat,
                if native.nullable { " (empty when null)" } else { "" }
            );
        }
    }
    out
}

/// Renders a transfer outcome for the terminal.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn render_result(result: &TransferResult, json: bool) -> serde_json::Result<String> {
    if json {
        return serde_json::to_string_pretty(result);
    }

    let destination = result.destination.as_deref().unwrap_or("-");
    Ok(match &result.status {
        TransferStatus::Succeeded => format!(
            "Transferred {} records to {}",
            result.record_count, destination
        ),
        TransferStatus::Failed { kind, message } => format!(
            "{kind}: {message}\nRecords written before the failure: {} ({})",
            result.record_count, destination
        ),
    })
}

/// Deletes a staged import file, logging instead of failing.
pub async fn remove_staged_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Removed staged file {}", path.display()),
        Err(e) => warn!("Failed to remove staged file {}: {}", path.display(), e),
    }
}
