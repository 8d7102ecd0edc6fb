//! Record writers: the sink half of a transfer.
//!
//! - `file`: comma-delimited output file
//! - `db`: newly created all-text table

pub mod db;
pub mod file;

pub use db::DbRecordWriter;
pub use file::{FileRecordWriter, OUTPUT_DELIMITER, default_export_path};
