//! Core library for chbridge.
//!
//! Moves tabular data between a ClickHouse database and delimited text files
//! in both directions, and lists the tables and columns a caller can choose
//! from before exporting.
//!
//! # Pipeline
//! Every transfer is one reader feeding one writer:
//! - `DbRecordReader` streams a column projection of a table
//! - `FileRecordWriter` writes a header line and one line per record
//! - `FileRecordReader` reads a header line and splits each data line
//! - `DbRecordWriter` creates a fresh all-text table and inserts rows
//!
//! # Guarantees
//! - One connection per request, closed on every exit path
//! - Credentials never appear in logs, `Debug` output, or errors
//! - A transfer reports exactly one `TransferResult`, on success or failure
//! - No retries, no resume, no rollback of rows already written

pub mod adapters;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod models;
pub mod reader;
pub mod sql;
pub mod transfer;
pub mod type_mapping;
pub mod writer;

// Re-export commonly used types
pub use adapters::{ConnectionProfile, DatabaseConnection, DatabaseConnector};
pub use error::{AdapterError, BridgeError, ErrorKind, Result, Stage};
pub use logging::init_logging;
pub use models::{
    ColumnDescriptor, DbRecord, DelimitedRow, TableDescriptor, TransferDirection, TransferRequest,
    TransferResult, TransferStatus,
};
pub use transfer::{Transfer, TransferOptions};
