//! Mapping between ClickHouse column types and the flat-file text type.
//!
//! The flat-file side has exactly one type, text. Every native type maps to
//! it, and text maps back to `String`, so a round trip through a file loses
//! the original type information by construction.

use serde_json::Value;

/// ClickHouse type used for every column created from a flat file.
pub const TEXT_COLUMN_TYPE: &str = "String";

/// The type system of a delimited file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlatFileType {
    /// Uninterpreted text
    Text,
}

/// A ClickHouse type name with its `Nullable`/`LowCardinality` wrappers
/// peeled off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeType {
    /// Innermost type, e.g. `String` for `LowCardinality(Nullable(String))`
    pub base: String,
    /// Wrapped in `Nullable(...)`
    pub nullable: bool,
    /// Wrapped in `LowCardinality(...)`
    pub low_cardinality: bool,
}

impl NativeType {
    /// Parses a type name as reported by `system.columns`.
    pub fn parse(type_name: &str) -> Self {
        let mut base = type_name.trim();
        let mut nullable = false;
        let mut low_cardinality = false;

        loop {
            if let Some(inner) = unwrap_call(base, "Nullable") {
                nullable = true;
                base = inner;
            } else if let Some(inner) = unwrap_call(base, "LowCardinality") {
                low_cardinality = true;
                base = inner;
            } else {
                break;
            }
        }

        Self {
            base: base.to_string(),
            nullable,
            low_cardinality,
        }
    }
}

fn unwrap_call<'a>(type_name: &'a str, wrapper: &str) -> Option<&'a str> {
    type_name
        .strip_prefix(wrapper)?
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

/// Maps a native column type to the flat-file type. Always text.
pub fn to_flat_file(_type_name: &str) -> FlatFileType {
    FlatFileType::Text
}

/// Maps a flat-file type to the ClickHouse type used when creating tables.
pub const fn to_native(flat: FlatFileType) -> &'static str {
    match flat {
        FlatFileType::Text => TEXT_COLUMN_TYPE,
    }
}

/// Renders a `JSONEachRow` value as flat-file text.
///
/// Nulls become the empty string, strings are taken verbatim, numbers and
/// booleans use their JSON spelling, and arrays, tuples and maps use compact
/// JSON.
pub fn json_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
