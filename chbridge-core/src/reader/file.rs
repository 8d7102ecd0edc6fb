//! Record reader over delimited text lines.
//!
//! Line 1 is the header. Every later non-blank line is a data row split on
//! the same delimiter. Fields are kept raw: no quote handling, no trimming,
//! and no check that a row has as many fields as the header.

use crate::error::{BridgeError, Stage};
use crate::models::DelimitedRow;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Parses a delimiter argument into a single character.
///
/// Accepts any single character, plus the spellings `\t` and `tab` for a
/// tab.
///
/// # Errors
/// Returns a validation error for an empty or multi-character delimiter, or
/// for a line break.
pub fn parse_delimiter(raw: &str) -> crate::Result<char> {
    let delimiter = match raw {
        "\\t" | "tab" => '\t',
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => ch,
                _ => {
                    return Err(BridgeError::validation(format!(
                        "delimiter must be a single character, got '{raw}'"
                    )));
                }
            }
        }
    };

    if matches!(delimiter, '\n' | '\r') {
        return Err(BridgeError::validation("delimiter cannot be a line break"));
    }
    Ok(delimiter)
}

/// Splits one line on the delimiter, keeping every field verbatim.
pub fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(str::to_string).collect()
}

/// Parses the header line into trimmed column names.
///
/// # Errors
/// Returns a validation error if any column name is empty.
pub fn parse_header(line: &str, delimiter: char) -> crate::Result<Vec<String>> {
    let line = line.strip_prefix(BYTE_ORDER_MARK).unwrap_or(line);
    let header: Vec<String> = line
        .split(delimiter)
        .map(|name| name.trim().to_string())
        .collect();

    if let Some(position) = header.iter().position(String::is_empty) {
        return Err(BridgeError::validation(format!(
            "header column {} has an empty name",
            position.saturating_add(1)
        )));
    }
    Ok(header)
}

/// Streams data rows from a delimited source.
pub struct FileRecordReader<R> {
    lines: Lines<R>,
    delimiter: char,
    header: Vec<String>,
    origin: PathBuf,
    line_number: u64,
}

impl<R> std::fmt::Debug for FileRecordReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecordReader")
            .field("origin", &self.origin)
            .field("delimiter", &self.delimiter)
            .field("header", &self.header)
            .field("line_number", &self.line_number)
            .finish_non_exhaustive()
    }
}

impl<R: AsyncBufRead + Unpin + Send> FileRecordReader<R> {
    /// Reads the header line from `source`.
    ///
    /// `origin` names the source in error messages, typically its path.
    ///
    /// # Errors
    /// Returns a validation error if the source has no header line or the
    /// header has an empty column name, and a file access error if the
    /// source cannot be read.
    pub async fn open(
        source: R,
        delimiter: char,
        origin: impl Into<PathBuf>,
    ) -> crate::Result<Self> {
        let mut reader = Self {
            lines: source.lines(),
            delimiter,
            header: Vec::new(),
            origin: origin.into(),
            line_number: 0,
        };

        let first = reader.read_line().await?.ok_or_else(|| {
            BridgeError::validation(format!(
                "{} is empty: a header line is required",
                reader.origin.display()
            ))
        })?;
        reader.header = parse_header(&first, delimiter)?;

        tracing::debug!(
            "Header of {} has {} columns",
            reader.origin.display(),
            reader.header.len()
        );
        Ok(reader)
    }

    /// Column names from the header line.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Where this reader's lines come from.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Pulls the next data row, skipping blank lines.
    ///
    /// # Errors
    /// Returns a file access error (stage `read`) if the source cannot be
    /// read or is not valid UTF-8.
    pub async fn next_row(&mut self) -> crate::Result<Option<DelimitedRow>> {
        while let Some(line) = self.read_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(DelimitedRow {
                line_number: self.line_number,
                fields: split_fields(&line, self.delimiter),
            }));
        }
        Ok(None)
    }

    async fn read_line(&mut self) -> crate::Result<Option<String>> {
        let line = self
            .lines
            .next_line()
            .await
            .map_err(|e| BridgeError::file_access(Stage::Read, &self.origin, e))?;
        if line.is_some() {
            self.line_number = self.line_number.saturating_add(1);
        }
        Ok(line)
    }
}
