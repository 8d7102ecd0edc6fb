//! Data models shared by the discovery and transfer components.
//!
//! All models are serializable so that the transport layer can hand them to
//! callers as JSON unchanged.

use crate::adapters::ConnectionProfile;
use crate::error::{BridgeError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A column as reported by schema discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name, unique within its table
    pub name: String,
    /// Native database type name, e.g. `Nullable(Int32)`
    #[serde(rename = "type")]
    pub type_name: String,
    /// Caller-controlled projection flag
    #[serde(default)]
    pub selected: bool,
}

impl ColumnDescriptor {
    /// Creates an unselected column descriptor.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            selected: false,
        }
    }
}

/// A table and its columns in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name, unique within a discovery result
    pub name: String,
    /// Columns in physical position order
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Creates a table descriptor with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Marks the named columns as selected, leaving the others untouched.
    ///
    /// # Errors
    /// Returns a validation error naming the first column that does not
    /// exist in this table; no flag is changed in that case.
    pub fn select<S: AsRef<str>>(&mut self, names: &[S]) -> crate::Result<()> {
        if let Some(missing) = names
            .iter()
            .map(AsRef::as_ref)
            .find(|name| self.column(name).is_none())
        {
            return Err(BridgeError::validation(format!(
                "column '{}' does not exist in table '{}'",
                missing, self.name
            )));
        }

        for column in &mut self.columns {
            if names.iter().any(|n| n.as_ref() == column.name) {
                column.selected = true;
            }
        }
        Ok(())
    }

    /// Marks every column as selected.
    pub fn select_all(&mut self) {
        for column in &mut self.columns {
            column.selected = true;
        }
    }

    /// Names of the selected columns, in table order.
    pub fn selected_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Database table to delimited file
    DbToFile,
    /// Delimited file to a new database table
    FileToDb,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DbToFile => write!(f, "db_to_file"),
            Self::FileToDb => write!(f, "file_to_db"),
        }
    }
}

/// One requested transfer.
#[derive(Debug, Clone)]
pub enum TransferRequest {
    /// Export a projection of one table to a file
    DbToFile {
        /// Source database
        profile: ConnectionProfile,
        /// Source table, as returned by discovery
        table: String,
        /// Selected column names, in output order
        columns: Vec<String>,
        /// Output file path
        destination: PathBuf,
    },
    /// Import a staged delimited file into a new table
    FileToDb {
        /// Destination database
        profile: ConnectionProfile,
        /// Staged input file
        source: PathBuf,
        /// Field delimiter
        delimiter: char,
    },
}

impl TransferRequest {
    /// The direction of this request.
    pub const fn direction(&self) -> TransferDirection {
        match self {
            Self::DbToFile { .. } => TransferDirection::DbToFile,
            Self::FileToDb { .. } => TransferDirection::FileToDb,
        }
    }
}

/// Terminal status of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferStatus {
    /// Every source record was written
    Succeeded,
    /// The first fatal error stopped the transfer
    Failed {
        /// Error kind
        kind: ErrorKind,
        /// Error message, unchanged from the failing stage
        message: String,
    },
}

/// Outcome of one transfer, produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Records confirmed written to the sink
    pub record_count: u64,
    /// Success or the failure that stopped the transfer
    #[serde(flatten)]
    pub status: TransferStatus,
    /// Output file path or created table name, once the sink exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl TransferResult {
    /// A successful transfer of `record_count` records.
    pub const fn succeeded(record_count: u64, destination: Option<String>) -> Self {
        Self {
            record_count,
            status: TransferStatus::Succeeded,
            destination,
        }
    }

    /// A transfer stopped by `error` after `record_count` confirmed records.
    pub fn failed(record_count: u64, destination: Option<String>, error: &BridgeError) -> Self {
        Self {
            record_count,
            status: TransferStatus::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
            destination,
        }
    }

    /// Whether the transfer completed.
    pub const fn is_success(&self) -> bool {
        matches!(self.status, TransferStatus::Succeeded)
    }

    /// The failure message, if the transfer failed.
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            TransferStatus::Succeeded => None,
            TransferStatus::Failed { message, .. } => Some(message),
        }
    }

    /// The failure kind, if the transfer failed.
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match &self.status {
            TransferStatus::Succeeded => None,
            TransferStatus::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// A row read from the database: column name to text value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbRecord {
    values: HashMap<String, String>,
}

impl DbRecord {
    /// Text value of a column; absent columns read as the empty string.
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map_or("", String::as_str)
    }

    /// Number of columns carried by this record.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record carries no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for DbRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A data line read from a delimited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedRow {
    /// 1-based line number in the source file
    pub line_number: u64,
    /// Raw fields, aligned positionally to the header
    pub fields: Vec<String>,
}
