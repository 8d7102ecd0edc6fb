//! SQL statement builders.
//!
//! Table and column names are trusted identifiers: they come from schema
//! discovery or from a file header and are spliced in as-is. A name the
//! server cannot parse surfaces as a query error at execution time.

use crate::type_mapping::{FlatFileType, to_native};

/// Catalog listing for one database, ordered by table then physical position.
///
/// The database name is bound through the HTTP query parameter
/// [`CATALOG_DATABASE_PARAM`] rather than spliced into the text.
pub const CATALOG_QUERY: &str = "SELECT table, name, type FROM system.columns \
     WHERE database = {database:String} ORDER BY table, position";

/// URL parameter carrying the database name for [`CATALOG_QUERY`].
pub const CATALOG_DATABASE_PARAM: &str = "param_database";

/// Prefix of every table created by a file import.
pub const IMPORT_TABLE_PREFIX: &str = "import_";

/// `SELECT a, b FROM t`
pub fn select_projection<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    format!("SELECT {} FROM {}", columns.join(", "), table)
}

/// `CREATE TABLE t (a String, b String) ENGINE = MergeTree() ORDER BY tuple()`
///
/// Every column is declared as text and no sorting key is required.
pub fn create_text_table<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let text_type = to_native(FlatFileType::Text);
    let definitions: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", c.as_ref(), text_type))
        .collect();
    format!(
        "CREATE TABLE {} ({}) ENGINE = MergeTree() ORDER BY tuple()",
        table,
        definitions.join(", ")
    )
}

/// Quotes a raw field as a ClickHouse string literal.
///
/// Single quotes are doubled. Backslashes are doubled too, since ClickHouse
/// reads them as escape characters inside literals.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len().saturating_add(2));
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

/// `INSERT INTO t VALUES ('x', 'y'), ('z', 'w')`, one tuple per row.
pub fn insert_values<R: AsRef<[String]>>(table: &str, rows: &[R]) -> String {
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let literals: Vec<String> = row.as_ref().iter().map(|v| quote_literal(v)).collect();
            format!("({})", literals.join(", "))
        })
        .collect();
    format!("INSERT INTO {} VALUES {}", table, tuples.join(", "))
}

/// Generates a destination table name for one import run.
///
/// The name is `import_<unix millis>_<8 hex chars>`: timestamp-derived and
/// collision-resistant, but not collision-proof.
pub fn generate_import_table_name() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{IMPORT_TABLE_PREFIX}{millis}_{}", &suffix[..8])
}
