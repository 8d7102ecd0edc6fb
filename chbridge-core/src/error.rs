//! Error types for the ingestion pipeline.
//!
//! Two layers exist. [`AdapterError`] is what a database adapter reports about
//! a single request to the server. [`BridgeError`] is what the pipeline
//! components return: every adapter failure is classified into one of the
//! four transfer error kinds and tagged with the [`Stage`] that hit it.
//!
//! Credential tokens never appear in any error message produced here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Pipeline stage in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Opening or verifying a database connection
    Connect,
    /// Reading the database catalog
    Discovery,
    /// Pulling rows from the source
    Read,
    /// Pushing rows to the sink
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Discovery => write!(f, "discovery"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// The error kinds a transfer can terminate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Cannot reach or authenticate to the database
    ConnectionError,
    /// Malformed or rejected SQL, including lazy arity/type mismatches
    QueryError,
    /// Cannot read the source file or write the destination
    FileAccessError,
    /// Caller supplied an unusable projection, file or configuration
    ValidationError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionError => write!(f, "ConnectionError"),
            Self::QueryError => write!(f, "QueryError"),
            Self::FileAccessError => write!(f, "FileAccessError"),
            Self::ValidationError => write!(f, "ValidationError"),
        }
    }
}

/// Failure reported by a database adapter for a single server request.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The server could not be reached
    #[error("cannot reach database at {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The server refused the supplied credentials
    #[error("authentication rejected: {message}")]
    Authentication { message: String },

    /// The server rejected the statement
    #[error("{}", format_server_error(*.code, .message))]
    Server { code: Option<u32>, message: String },

    /// A response row could not be decoded
    #[error("malformed response row: {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

fn format_server_error(code: Option<u32>, message: &str) -> String {
    match code {
        Some(code) => format!("server error {code}: {message}"),
        None => format!("server error: {message}"),
    }
}

impl AdapterError {
    /// Whether this failure means the database is unreachable or refused us,
    /// as opposed to rejecting a particular statement.
    pub const fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Authentication { .. })
    }
}

/// Main error type for chbridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Database connection or authentication failed
    #[error("Connection failed during {stage}: {context}")]
    Connection {
        stage: Stage,
        context: String,
        #[source]
        source: Option<AdapterError>,
    },

    /// Statement rejected by the database
    #[error("Query failed during {stage}: {context}")]
    Query { stage: Stage, context: String },

    /// Source or destination file could not be accessed
    #[error("File access failed during {stage} for {}: {source}", .path.display())]
    FileAccess {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller input rejected before any side effect
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Process-level setup failed (logging, CLI wiring)
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Convenience type alias for Results with `BridgeError`
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Convenience type alias for adapter-level results
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

impl BridgeError {
    /// Classifies an adapter failure at the given stage.
    ///
    /// Unreachable servers and refused credentials become connection errors;
    /// rejected statements and undecodable rows become query errors.
    pub fn from_adapter(stage: Stage, error: AdapterError) -> Self {
        if error.is_connection_failure() {
            Self::Connection {
                stage,
                context: error.to_string(),
                source: Some(error),
            }
        } else {
            Self::Query {
                stage,
                context: error.to_string(),
            }
        }
    }

    /// Wraps any adapter failure as a connection error.
    ///
    /// Schema discovery reports every failure this way.
    pub fn connection_failed(stage: Stage, error: AdapterError) -> Self {
        Self::Connection {
            stage,
            context: error.to_string(),
            source: Some(error),
        }
    }

    /// Creates a query error with context
    pub fn query_failed(stage: Stage, context: impl Into<String>) -> Self {
        Self::Query {
            stage,
            context: context.into(),
        }
    }

    /// Creates a file access error for the given path
    pub fn file_access(stage: Stage, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::FileAccess {
            stage,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// The transfer error kind this error terminates a transfer with.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::ConnectionError,
            Self::Query { .. } => ErrorKind::QueryError,
            Self::FileAccess { .. } => ErrorKind::FileAccessError,
            Self::Validation { .. } | Self::Configuration { .. } => ErrorKind::ValidationError,
        }
    }

    /// The stage that failed, if the error came from a running pipeline.
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Connection { stage, .. }
            | Self::Query { stage, .. }
            | Self::FileAccess { stage, .. } => Some(*stage),
            Self::Validation { .. } | Self::Configuration { .. } => None,
        }
    }
}
