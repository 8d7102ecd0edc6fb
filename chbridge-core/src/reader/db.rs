//! Record reader over a database projection query.

use crate::adapters::{DatabaseConnection, RowStream};
use crate::error::{BridgeError, Stage};
use crate::models::DbRecord;
use crate::sql;
use crate::type_mapping::json_to_text;

/// Streams the rows of `SELECT <columns> FROM <table>` as text records.
///
/// The sequence is lazy, finite and non-restartable: rows are pulled from
/// the server one at a time and cannot be replayed.
pub struct DbRecordReader {
    stream: Box<dyn RowStream>,
    columns: Vec<String>,
    rows_read: u64,
    exhausted: bool,
}

impl std::fmt::Debug for DbRecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbRecordReader")
            .field("columns", &self.columns)
            .field("rows_read", &self.rows_read)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl DbRecordReader {
    /// Issues the projection query on `connection`.
    ///
    /// Table and column names are trusted; they are not checked against the
    /// catalog here.
    ///
    /// # Errors
    /// Returns a validation error for an empty projection or an empty column
    /// name, and a query or connection error (stage `read`) if the server
    /// rejects the query.
    pub async fn open(
        connection: &mut dyn DatabaseConnection,
        table: &str,
        columns: &[String],
    ) -> crate::Result<Self> {
        if columns.is_empty() {
            return Err(BridgeError::validation("at least one column must be selected"));
        }
        if columns.iter().any(|c| c.trim().is_empty()) {
            return Err(BridgeError::validation("column names cannot be empty"));
        }
        if table.trim().is_empty() {
            return Err(BridgeError::validation("table name cannot be empty"));
        }

        let query = sql::select_projection(table, columns);
        tracing::debug!("Opening reader: {}", query);

        let stream = connection
            .query_rows(&query)
            .await
            .map_err(|e| BridgeError::from_adapter(Stage::Read, e))?;

        Ok(Self {
            stream,
            columns: columns.to_vec(),
            rows_read: 0,
            exhausted: false,
        })
    }

    /// The projected column names, in query order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows handed out so far.
    pub const fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Pulls the next record, or `None` once the result is exhausted.
    ///
    /// Columns that are null or absent in the result read as empty text.
    ///
    /// # Errors
    /// Returns a query or connection error (stage `read`) if the stream
    /// breaks or yields an undecodable row.
    pub async fn next_record(&mut self) -> crate::Result<Option<DbRecord>> {
        if self.exhausted {
            return Ok(None);
        }

        let row = match self.stream.next_row().await {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.exhausted = true;
                return Ok(None);
            }
            Err(e) => {
                self.exhausted = true;
                return Err(BridgeError::from_adapter(Stage::Read, e));
            }
        };

        self.rows_read = self.rows_read.saturating_add(1);
        let record = self
            .columns
            .iter()
            .map(|c| (c.clone(), row.get(c).map(json_to_text).unwrap_or_default()))
            .collect();
        Ok(Some(record))
    }
}
