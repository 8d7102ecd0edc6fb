//! Database adapter traits for request-scoped database access.
//!
//! Every pipeline component reaches the database through these traits. A
//! [`DatabaseConnector`] opens one [`DatabaseConnection`] per request; the
//! connection is used sequentially and closed by the caller on every exit
//! path. Nothing is pooled or shared between requests.
//!
//! # Module Structure
//! - `config`: `ConnectionProfile` for one request
//! - `clickhouse`: ClickHouse HTTP interface implementation
//! - `memory`: in-memory double for unit tests

use crate::error::AdapterResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

pub mod clickhouse;
pub mod config;

#[cfg(test)]
pub(crate) mod memory;

pub use clickhouse::{ClickHouseConnection, ClickHouseConnector};
pub use config::{ConnectionProfile, DEFAULT_HTTP_PORT};

/// One `(table, column, type)` triple from the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    /// Owning table
    pub table: String,
    /// Column name
    pub name: String,
    /// Native type name
    #[serde(rename = "type")]
    pub type_name: String,
}

impl CatalogEntry {
    /// Creates a catalog entry.
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A lazy, finite, non-restartable sequence of result rows.
#[async_trait]
pub trait RowStream: Send {
    /// Pulls the next row, or `None` once the result is exhausted.
    ///
    /// # Errors
    /// Returns an error if the response cannot be read or a row cannot be
    /// decoded; the stream must not be polled again afterwards.
    async fn next_row(&mut self) -> AdapterResult<Option<Map<String, Value>>>;
}

/// An open, request-scoped database connection.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Lists every column of `database` ordered by table, then physical
    /// position.
    ///
    /// # Errors
    /// Returns an error if the catalog query fails
    async fn fetch_catalog(&mut self, database: &str) -> AdapterResult<Vec<CatalogEntry>>;

    /// Starts a row-returning query and hands back its result stream.
    ///
    /// # Errors
    /// Returns an error if the server rejects the query before streaming
    async fn query_rows(&mut self, sql: &str) -> AdapterResult<Box<dyn RowStream>>;

    /// Executes a statement that returns no rows and waits for the
    /// server's acknowledgment.
    ///
    /// # Errors
    /// Returns an error if the statement is rejected
    async fn execute(&mut self, sql: &str) -> AdapterResult<()>;

    /// Releases the connection. Further calls on it are invalid.
    ///
    /// # Errors
    /// Returns an error if the session could not be shut down cleanly
    async fn close(&mut self) -> AdapterResult<()>;
}

/// Opens connections described by a [`ConnectionProfile`].
///
/// # Object Safety
/// This trait is object-safe so that the orchestrator can hold an
/// `Arc<dyn DatabaseConnector>`.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Opens and verifies a new connection.
    ///
    /// # Errors
    /// Returns a connection error if the server is unreachable, refuses the
    /// credentials, or does not know the configured database
    async fn connect(&self, profile: &ConnectionProfile)
    -> crate::Result<Box<dyn DatabaseConnection>>;

    /// Short name of the database engine, for logs.
    fn engine(&self) -> &'static str;
}

/// Closes a connection, logging instead of failing.
///
/// Used on every exit path so that a close failure never masks the outcome
/// of the work done on the connection.
pub async fn close_connection(connection: &mut dyn DatabaseConnection) {
    if let Err(e) = connection.close().await {
        tracing::warn!("Failed to close database connection: {}", e);
    }
}
