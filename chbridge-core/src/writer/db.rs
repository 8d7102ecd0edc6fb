//! Database table sink.
//!
//! Creates a fresh all-text table and inserts each row as string literals.
//! With the default batch size of one, every row is its own `INSERT`; larger
//! batches pack several rows into one statement without changing the table
//! schema or the reported count.

use crate::adapters::DatabaseConnection;
use crate::error::{BridgeError, Stage};
use crate::models::DelimitedRow;
use crate::sql;

/// Default rows per `INSERT` statement.
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Inserts rows into a table it created itself.
#[derive(Debug)]
pub struct DbRecordWriter {
    table: String,
    batch_size: usize,
    pending: Vec<Vec<String>>,
    records_written: u64,
}

impl DbRecordWriter {
    /// Issues `CREATE TABLE` for `table` with one text column per header name.
    ///
    /// # Errors
    /// Returns a validation error for an empty header and a query or
    /// connection error (stage `write`) if the table cannot be created.
    pub async fn create(
        connection: &mut dyn DatabaseConnection,
        table: impl Into<String>,
        header: &[String],
        batch_size: usize,
    ) -> crate::Result<Self> {
        if header.is_empty() {
            return Err(BridgeError::validation("header has no columns"));
        }

        let table = table.into();
        let statement = sql::create_text_table(&table, header);
        tracing::debug!("Creating table: {}", statement);

        connection
            .execute(&statement)
            .await
            .map_err(|e| BridgeError::from_adapter(Stage::Write, e))?;

        tracing::info!("Created table {} with {} text columns", table, header.len());
        Ok(Self {
            table,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
            records_written: 0,
        })
    }

    /// Name of the created table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Rows acknowledged by the database so far.
    pub const fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Queues a row and inserts the batch once it is full.
    ///
    /// # Errors
    /// Returns a query or connection error (stage `write`) if the insert is
    /// rejected; none of the rows in that batch are counted.
    pub async fn write_row(
        &mut self,
        connection: &mut dyn DatabaseConnection,
        row: DelimitedRow,
    ) -> crate::Result<()> {
        self.pending.push(row.fields);
        if self.pending.len() >= self.batch_size {
            self.flush(connection).await?;
        }
        Ok(())
    }

    /// Inserts any queued rows and returns the final count.
    ///
    /// # Errors
    /// Returns a query or connection error (stage `write`) if the last
    /// insert is rejected.
    pub async fn finish(&mut self, connection: &mut dyn DatabaseConnection) -> crate::Result<u64> {
        self.flush(connection).await?;
        Ok(self.records_written)
    }

    async fn flush(&mut self, connection: &mut dyn DatabaseConnection) -> crate::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let rows = std::mem::take(&mut self.pending);
        let statement = sql::insert_values(&self.table, &rows);
        tracing::trace!("Inserting {} rows into {}", rows.len(), self.table);

        connection
            .execute(&statement)
            .await
            .map_err(|e| BridgeError::from_adapter(Stage::Write, e))?;

        let acknowledged = u64::try_from(rows.len()).unwrap_or(u64::MAX);
        self.records_written = self.records_written.saturating_add(acknowledged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryDatabase;
    use crate::adapters::{ConnectionProfile, DatabaseConnector};
    use crate::error::ErrorKind;

    fn row(line_number: u64, fields: &[&str]) -> DelimitedRow {
        DelimitedRow {
            line_number,
            fields: fields.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_creates_table_and_inserts_per_row() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect(&ConnectionProfile::default()).await.unwrap();

        let mut writer = DbRecordWriter::create(conn.as_mut(), "import_1", &header(&["a", "b"]), 1)
            .await
            .unwrap();
        writer.write_row(conn.as_mut(), row(2, &["1", "O'Brien"])).await.unwrap();
        writer.write_row(conn.as_mut(), row(3, &["2", "x"])).await.unwrap();
        let count = writer.finish(conn.as_mut()).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            db.state().executed,
            vec![
                "CREATE TABLE import_1 (a String, b String) ENGINE = MergeTree() ORDER BY tuple()",
                "INSERT INTO import_1 VALUES ('1', 'O''Brien')",
                "INSERT INTO import_1 VALUES ('2', 'x')",
            ]
        );
    }

    #[tokio::test]
    async fn test_batched_inserts_keep_count() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect(&ConnectionProfile::default()).await.unwrap();

        let mut writer = DbRecordWriter::create(conn.as_mut(), "import_2", &header(&["a"]), 2)
            .await
            .unwrap();
        for n in 0..5u64 {
            writer
                .write_row(conn.as_mut(), row(n, &[n.to_string().as_str()]))
                .await
                .unwrap();
        }
        assert_eq!(writer.records_written(), 4);
        assert_eq!(writer.finish(conn.as_mut()).await.unwrap(), 5);

        let inserts = db.executed_containing("INSERT INTO import_2");
        assert_eq!(inserts.len(), 3);
        assert_eq!(inserts[0], "INSERT INTO import_2 VALUES ('0'), ('1')");
        assert_eq!(inserts[2], "INSERT INTO import_2 VALUES ('4')");
    }

    #[tokio::test]
    async fn test_rejected_insert_is_not_counted() {
        let db = MemoryDatabase::new();
        db.state().fail_execute = Some(("INSERT".to_string(), 2));
        let mut conn = db.connect(&ConnectionProfile::default()).await.unwrap();

        let mut writer = DbRecordWriter::create(conn.as_mut(), "import_3", &header(&["a"]), 1)
            .await
            .unwrap();
        writer.write_row(conn.as_mut(), row(2, &["ok"])).await.unwrap();
        let error = writer
            .write_row(conn.as_mut(), row(3, &["bad"]))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::QueryError);
        assert_eq!(error.stage(), Some(Stage::Write));
        assert_eq!(writer.records_written(), 1);
    }

    #[tokio::test]
    async fn test_create_failure() {
        let db = MemoryDatabase::new();
        db.state().fail_execute = Some(("CREATE TABLE".to_string(), 1));
        let mut conn = db.connect(&ConnectionProfile::default()).await.unwrap();

        let error = DbRecordWriter::create(conn.as_mut(), "import_4", &header(&["a"]), 1)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::QueryError);
    }
}
