//! ClickHouse to flat file bridge.
//!
//! This binary resolves one connection profile per invocation and runs a
//! single operation against it: a connection test, schema discovery, an
//! export to a delimited file, or an import into a new table.
//!
//! # Security Guarantees
//! - The credential token is read from a profile file or `CHBRIDGE_TOKEN`,
//!   never from the command line
//! - No credentials are logged or printed

use anyhow::Context;
use chbridge::{
    Cli, Command, ExportArgs, ImportArgs, TOKEN_ENV, export_destination, remove_staged_file,
    render_result, render_tables, resolve_profile, resolve_projection,
};
use chbridge_core::error::{BridgeError, Stage};
use chbridge_core::reader::parse_delimiter;
use chbridge_core::{ConnectionProfile, Transfer, TransferOptions, TransferResult, init_logging};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let profile = resolve_profile(&cli.connection, std::env::var(TOKEN_ENV).ok())
        .await
        .context("Invalid connection configuration")?;
    let transfer = Transfer::clickhouse();

    match &cli.command {
        Command::Test => test_connection(&transfer, &profile).await,
        Command::Discover => discover(&transfer, &profile, cli.global.json).await,
        Command::Export(args) => {
            let result = export(&transfer, &profile, args).await;
            report(&result, cli.global.json)
        }
        Command::Import(args) => {
            let result = import(&transfer, &profile, args).await;
            report(&result, cli.global.json)
        }
    }
}

/// Tests database connection without touching any table
async fn test_connection(
    transfer: &Transfer,
    profile: &ConnectionProfile,
) -> anyhow::Result<ExitCode> {
    info!("Testing database connection...");

    transfer.test_connection(profile).await.map_err(|e| {
        error!("Connection test failed: {}", e);
        e
    })?;

    println!("Connection to {profile} successful");
    Ok(ExitCode::SUCCESS)
}

/// Prints every table and column of the database
async fn discover(
    transfer: &Transfer,
    profile: &ConnectionProfile,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let tables = transfer.discover_schema(profile).await.map_err(|e| {
        error!("Schema discovery failed: {}", e);
        e
    })?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&tables).context("Failed to serialize tables")?;
        println!("{rendered}");
    } else {
        print!("{}", render_tables(&tables));
    }
    Ok(ExitCode::SUCCESS)
}

/// Validates the projection against a fresh discovery, then exports
async fn export(
    transfer: &Transfer,
    profile: &ConnectionProfile,
    args: &ExportArgs,
) -> TransferResult {
    let tables = match transfer.discover_schema(profile).await {
        Ok(tables) => tables,
        Err(e) => return TransferResult::failed(0, None, &e),
    };
    let table = match resolve_projection(tables, &args.table, &args.columns, args.all_columns) {
        Ok(table) => table,
        Err(e) => return TransferResult::failed(0, None, &e),
    };

    let destination = export_destination(
        &table.name,
        args.output.as_deref(),
        args.output_dir.as_deref(),
    );
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        return TransferResult::failed(0, None, &BridgeError::file_access(Stage::Write, parent, e));
    }

    transfer
        .transfer_db_to_file(profile, &table.name, &table.selected_columns(), &destination)
        .await
}

/// Imports a staged file, removing it afterwards when asked to
async fn import(
    transfer: &Transfer,
    profile: &ConnectionProfile,
    args: &ImportArgs,
) -> TransferResult {
    let result = match parse_delimiter(&args.delimiter) {
        Ok(delimiter) => {
            let options = TransferOptions {
                batch_size: args.batch_size,
            };
            transfer
                .clone()
                .with_options(options)
                .transfer_file_path_to_db(profile, &args.file, delimiter)
                .await
        }
        Err(e) => TransferResult::failed(0, None, &e),
    };

    if args.remove_source {
        remove_staged_file(&args.file).await;
    }
    result
}

/// Prints a transfer result and maps it to the process exit code
fn report(result: &TransferResult, json: bool) -> anyhow::Result<ExitCode> {
    let rendered = render_result(result, json).context("Failed to serialize transfer result")?;

    if result.is_success() {
        println!("{rendered}");
        Ok(ExitCode::SUCCESS)
    } else {
        if json {
            println!("{rendered}");
        } else {
            eprintln!("{rendered}");
        }
        Ok(ExitCode::FAILURE)
    }
}
