//! Transfer orchestration: one reader, one writer, one result.
//!
//! A transfer runs its pipeline sequentially to completion or to the first
//! error. Nothing is retried or resumed, and data already written when an
//! error strikes stays where it is. The connection and the file handle are
//! released on every exit path before the result is returned.

#[cfg(test)]
mod tests;

use crate::adapters::{
    ClickHouseConnector, ConnectionProfile, DatabaseConnection, DatabaseConnector,
    close_connection,
};
use crate::discovery;
use crate::error::{BridgeError, Stage};
use crate::models::{TableDescriptor, TransferDirection, TransferRequest, TransferResult};
use crate::reader::{DbRecordReader, FileRecordReader};
use crate::sql;
use crate::writer::db::DEFAULT_BATCH_SIZE;
use crate::writer::{DbRecordWriter, FileRecordWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info, warn};

/// Tunables for a [`Transfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Rows per `INSERT` in the file-to-database direction
    pub batch_size: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// What a pipeline has committed so far.
#[derive(Debug, Default)]
struct Progress {
    records: u64,
    destination: Option<String>,
}

impl Progress {
    fn into_result(
        self,
        outcome: crate::Result<()>,
        direction: TransferDirection,
    ) -> TransferResult {
        match outcome {
            Ok(()) => {
                info!("{} transfer succeeded: {} records", direction, self.records);
                TransferResult::succeeded(self.records, self.destination)
            }
            Err(e) => {
                error!(
                    "{} transfer failed after {} records: {}",
                    direction, self.records, e
                );
                TransferResult::failed(self.records, self.destination, &e)
            }
        }
    }
}

/// Entry point for schema discovery and both transfer directions.
///
/// # Example
/// ```rust,no_run
/// use chbridge_core::adapters::ConnectionProfile;
/// use chbridge_core::transfer::Transfer;
/// use std::path::Path;
///
/// # async fn example() -> chbridge_core::Result<()> {
/// let profile = ConnectionProfile::new("localhost").with_database("analytics");
/// let transfer = Transfer::clickhouse();
///
/// let mut tables = transfer.discover_schema(&profile).await?;
/// let table = &mut tables[0];
/// table.select_all();
///
/// let result = transfer
///     .transfer_db_to_file(&profile, &table.name, &table.selected_columns(), Path::new("out.csv"))
///     .await;
/// println!("{} records", result.record_count);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transfer {
    connector: Arc<dyn DatabaseConnector>,
    options: TransferOptions,
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("engine", &self.connector.engine())
            .field("options", &self.options)
            .finish()
    }
}

impl Transfer {
    /// Creates a transfer over any connector.
    pub fn new(connector: Arc<dyn DatabaseConnector>) -> Self {
        Self {
            connector,
            options: TransferOptions::default(),
        }
    }

    /// Creates a transfer over the ClickHouse HTTP interface.
    pub fn clickhouse() -> Self {
        Self::new(Arc::new(ClickHouseConnector::new()))
    }

    /// Replaces the transfer options.
    #[must_use]
    pub const fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    /// Opens and immediately closes a connection.
    ///
    /// # Errors
    /// Returns a validation error for an unusable profile or a connection
    /// error if the database cannot be reached
    pub async fn test_connection(&self, profile: &ConnectionProfile) -> crate::Result<()> {
        profile.validate()?;
        let mut connection = self.connector.connect(profile).await?;
        close_connection(connection.as_mut()).await;
        info!("Connection to {} {} succeeded", self.connector.engine(), profile);
        Ok(())
    }

    /// Lists every table and column of the profile's database.
    ///
    /// # Errors
    /// Returns a single connection error on any failure
    pub async fn discover_schema(
        &self,
        profile: &ConnectionProfile,
    ) -> crate::Result<Vec<TableDescriptor>> {
        discovery::discover_schema(self.connector.as_ref(), profile).await
    }

    /// Exports the selected columns of `table` to `destination`.
    ///
    /// The file holds one header line and one line per row. An empty
    /// projection fails with a validation error before any connection is
    /// opened or file created.
    pub async fn transfer_db_to_file(
        &self,
        profile: &ConnectionProfile,
        table: &str,
        columns: &[String],
        destination: &Path,
    ) -> TransferResult {
        let started = Instant::now();
        info!(
            "Exporting {} columns of {} from {} to {}",
            columns.len(),
            table,
            profile,
            destination.display()
        );

        let mut progress = Progress::default();
        let outcome = self
            .db_to_file(profile, table, columns, destination, &mut progress)
            .await;
        info!("Export finished in {:?}", started.elapsed());
        progress.into_result(outcome, TransferDirection::DbToFile)
    }

    /// Imports delimited lines from `source` into a newly created table.
    ///
    /// The first line is the header; each later non-blank line becomes one
    /// row. Running this twice on the same input creates two tables.
    pub async fn transfer_file_to_db<R>(
        &self,
        profile: &ConnectionProfile,
        source: R,
        delimiter: char,
    ) -> TransferResult
    where
        R: AsyncBufRead + Unpin + Send,
    {
        self.import(profile, source, delimiter, PathBuf::from("<input>"))
            .await
    }

    /// Imports a staged file into a newly created table.
    ///
    /// A missing file is a validation error; an unreadable one is a file
    /// access error. The file itself is left in place.
    pub async fn transfer_file_path_to_db(
        &self,
        profile: &ConnectionProfile,
        path: &Path,
        delimiter: char,
    ) -> TransferResult {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                let error = if e.kind() == std::io::ErrorKind::NotFound {
                    BridgeError::validation(format!(
                        "source file {} does not exist",
                        path.display()
                    ))
                } else {
                    BridgeError::file_access(Stage::Read, path, e)
                };
                return Progress::default().into_result(Err(error), TransferDirection::FileToDb);
            }
        };

        self.import(profile, BufReader::new(file), delimiter, path.to_path_buf())
            .await
    }

    /// Runs a transfer request in its direction.
    pub async fn run(&self, request: TransferRequest) -> TransferResult {
        match request {
            TransferRequest::DbToFile {
                profile,
                table,
                columns,
                destination,
            } => {
                self.transfer_db_to_file(&profile, &table, &columns, &destination)
                    .await
            }
            TransferRequest::FileToDb {
                profile,
                source,
                delimiter,
            } => {
                self.transfer_file_path_to_db(&profile, &source, delimiter)
                    .await
            }
        }
    }

    async fn import<R>(
        &self,
        profile: &ConnectionProfile,
        source: R,
        delimiter: char,
        origin: PathBuf,
    ) -> TransferResult
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let started = Instant::now();
        info!("Importing {} into {}", origin.display(), profile);

        let mut progress = Progress::default();
        let outcome = self
            .file_to_db(profile, source, delimiter, origin, &mut progress)
            .await;
        info!("Import finished in {:?}", started.elapsed());
        progress.into_result(outcome, TransferDirection::FileToDb)
    }

    async fn db_to_file(
        &self,
        profile: &ConnectionProfile,
        table: &str,
        columns: &[String],
        destination: &Path,
        progress: &mut Progress,
    ) -> crate::Result<()> {
        if columns.is_empty() {
            return Err(BridgeError::validation("at least one column must be selected"));
        }
        profile.validate()?;

        let mut connection = self.connector.connect(profile).await?;
        let outcome =
            copy_db_to_file(connection.as_mut(), table, columns, destination, progress).await;
        close_connection(connection.as_mut()).await;
        outcome
    }

    async fn file_to_db<R>(
        &self,
        profile: &ConnectionProfile,
        source: R,
        delimiter: char,
        origin: PathBuf,
        progress: &mut Progress,
    ) -> crate::Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        if matches!(delimiter, '\n' | '\r') {
            return Err(BridgeError::validation("delimiter cannot be a line break"));
        }
        profile.validate()?;

        let mut reader = FileRecordReader::open(source, delimiter, origin).await?;

        let mut connection = self.connector.connect(profile).await?;
        let outcome = copy_file_to_db(
            connection.as_mut(),
            &mut reader,
            self.options.batch_size,
            progress,
        )
        .await;
        close_connection(connection.as_mut()).await;
        outcome
    }
}

async fn copy_db_to_file(
    connection: &mut dyn DatabaseConnection,
    table: &str,
    columns: &[String],
    destination: &Path,
    progress: &mut Progress,
) -> crate::Result<()> {
    let mut reader = DbRecordReader::open(connection, table, columns).await?;
    let mut writer = FileRecordWriter::create(destination, reader.columns()).await?;
    progress.destination = Some(destination.display().to_string());

    let pumped = pump_records(&mut reader, &mut writer, progress).await;
    let finished = writer.finish().await;

    match (pumped, finished) {
        (Ok(()), Ok(count)) => {
            progress.records = count;
            Ok(())
        }
        (Ok(()), Err(e)) => Err(e),
        (Err(e), finished) => {
            if let Err(close_error) = finished {
                warn!("Failed to close {}: {}", destination.display(), close_error);
            }
            Err(e)
        }
    }
}

async fn pump_records(
    reader: &mut DbRecordReader,
    writer: &mut FileRecordWriter,
    progress: &mut Progress,
) -> crate::Result<()> {
    while let Some(record) = reader.next_record().await? {
        writer.write_record(&record).await?;
        progress.records = writer.records_written();
    }
    Ok(())
}

async fn copy_file_to_db<R>(
    connection: &mut dyn DatabaseConnection,
    reader: &mut FileRecordReader<R>,
    batch_size: usize,
    progress: &mut Progress,
) -> crate::Result<()>
where
    R: AsyncBufRead + Unpin + Send,
{
    let table = sql::generate_import_table_name();
    let mut writer =
        DbRecordWriter::create(connection, table, reader.header(), batch_size).await?;
    progress.destination = Some(writer.table().to_string());
    tracing::debug!(
        "Streaming rows of {} into {}",
        reader.origin().display(),
        writer.table()
    );

    while let Some(row) = reader.next_row().await? {
        let line_number = row.line_number;
        writer.write_row(connection, row).await.inspect_err(|e| {
            tracing::debug!("Insert for line {} rejected: {}", line_number, e);
        })?;
        progress.records = writer.records_written();
    }

    progress.records = writer.finish(connection).await?;
    Ok(())
}
