//! Delimited file sink.
//!
//! Values are joined with [`OUTPUT_DELIMITER`] without any quoting. A value
//! that contains the delimiter or a line break therefore changes the line
//! structure of the output; this is a known limitation of the format.

use crate::error::{BridgeError, Stage};
use crate::models::DbRecord;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Delimiter between output fields.
pub const OUTPUT_DELIMITER: char = ',';

/// Deterministic output path for an export of `table`: `<dir>/<table>_export.csv`.
pub fn default_export_path(output_dir: &Path, table: &str) -> PathBuf {
    output_dir.join(format!("{table}_export.csv"))
}

/// Joins values into one output line, terminator included.
pub fn format_line<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut line = values
        .into_iter()
        .collect::<Vec<_>>()
        .join(&OUTPUT_DELIMITER.to_string());
    line.push('\n');
    line
}

/// Writes a header line and one line per record to a file.
#[derive(Debug)]
pub struct FileRecordWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    columns: Vec<String>,
    records_written: u64,
}

impl FileRecordWriter {
    /// Creates (or truncates) `path` and writes the header line.
    ///
    /// # Errors
    /// Returns a file access error (stage `write`) if the file cannot be
    /// created or written.
    pub async fn create(path: impl AsRef<Path>, columns: &[String]) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .await
            .map_err(|e| BridgeError::file_access(Stage::Write, &path, e))?;

        let mut writer = Self {
            writer: BufWriter::new(file),
            path,
            columns: columns.to_vec(),
            records_written: 0,
        };

        let header = format_line(writer.columns.iter().map(String::as_str));
        writer.write_raw(&header).await?;
        Ok(writer)
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far, header excluded.
    pub const fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Appends one record, its values in header order.
    ///
    /// # Errors
    /// Returns a file access error (stage `write`) if the write fails; the
    /// record is not counted in that case.
    pub async fn write_record(&mut self, record: &DbRecord) -> crate::Result<()> {
        let line = format_line(self.columns.iter().map(|c| record.get(c)));
        self.write_raw(&line).await?;
        self.records_written = self.records_written.saturating_add(1);
        Ok(())
    }

    /// Flushes and closes the file, returning the record count.
    ///
    /// Called on every exit path, including after a failed read, so that
    /// already-written lines reach the disk.
    ///
    /// # Errors
    /// Returns a file access error (stage `write`) if the final flush fails.
    pub async fn finish(mut self) -> crate::Result<u64> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| BridgeError::file_access(Stage::Write, &self.path, e))?;
        Ok(self.records_written)
    }

    async fn write_raw(&mut self, line: &str) -> crate::Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BridgeError::file_access(Stage::Write, &self.path, e))
    }
}
