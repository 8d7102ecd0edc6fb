//! Record readers: the source half of a transfer.
//!
//! - `db`: projection query results from the database
//! - `file`: data lines of a delimited file

pub mod db;
pub mod file;

pub use db::DbRecordReader;
pub use file::{FileRecordReader, parse_delimiter, split_fields};
