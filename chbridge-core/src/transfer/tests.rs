use super::*;
use crate::adapters::memory::MemoryDatabase;
use crate::error::ErrorKind;
use crate::models::TransferStatus;
use serde_json::json;
use tempfile::TempDir;

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

fn transfer_over(db: &MemoryDatabase) -> Transfer {
    Transfer::new(Arc::new(db.clone()))
}

fn profile() -> ConnectionProfile {
    ConnectionProfile::new("localhost").with_database("default")
}

fn numbers(count: u64) -> MemoryDatabase {
    let rows = (0..count)
        .map(|n| json!({"n": n, "label": format!("row-{n}")}))
        .collect();
    MemoryDatabase::new().with_table("numbers", &[("n", "UInt64"), ("label", "String")], rows)
}

fn created_tables(db: &MemoryDatabase) -> Vec<String> {
    db.executed_containing("CREATE TABLE")
        .iter()
        .filter_map(|sql| sql.split_whitespace().nth(2).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_export_writes_header_plus_one_line_per_row() {
    let db = numbers(3);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("numbers_export.csv");

    let result = transfer_over(&db)
        .transfer_db_to_file(&profile(), "numbers", &columns(&["label", "n"]), &path)
        .await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.record_count, 3);
    assert_eq!(result.destination.as_deref(), Some(path.to_str().unwrap()));

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content, "label,n\nrow-0,0\nrow-1,1\nrow-2,2\n");

    let state = db.state();
    assert_eq!(state.connects, 1);
    assert_eq!(state.closes, 1);
}

#[tokio::test]
async fn test_export_of_empty_table_writes_header_only() {
    let db = numbers(0);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.csv");

    let result = transfer_over(&db)
        .transfer_db_to_file(&profile(), "numbers", &columns(&["n"]), &path)
        .await;

    assert!(result.is_success());
    assert_eq!(result.record_count, 0);
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "n\n");
}

#[tokio::test]
async fn test_export_with_empty_projection_has_no_side_effects() {
    let db = numbers(2);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("never.csv");

    let result = transfer_over(&db)
        .transfer_db_to_file(&profile(), "numbers", &[], &path)
        .await;

    assert!(!result.is_success());
    assert_eq!(result.error_kind(), Some(ErrorKind::ValidationError));
    assert_eq!(result.record_count, 0);
    assert!(result.destination.is_none());
    assert!(!path.exists());
    assert_eq!(db.state().connects, 0);
}

#[tokio::test]
async fn test_export_of_unknown_table_creates_no_file() {
    let db = numbers(2);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ghosts.csv");

    let result = transfer_over(&db)
        .transfer_db_to_file(&profile(), "ghosts", &columns(&["n"]), &path)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::QueryError));
    assert!(result.error_message().unwrap().contains("UNKNOWN_TABLE"));
    assert!(!path.exists());

    let state = db.state();
    assert_eq!(state.connects, state.closes);
}

#[tokio::test]
async fn test_export_failure_mid_stream_keeps_partial_file() {
    let db = numbers(5);
    db.state().fail_stream_after = Some(2);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.csv");

    let result = transfer_over(&db)
        .transfer_db_to_file(&profile(), "numbers", &columns(&["n"]), &path)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ConnectionError));
    assert_eq!(result.record_count, 2);
    assert_eq!(
        tokio::fs::read_to_string(&path).await.unwrap(),
        "n\n0\n1\n",
        "rows written before the failure stay on disk"
    );

    let state = db.state();
    assert_eq!(state.connects, 1);
    assert_eq!(state.closes, 1);
}

#[tokio::test]
async fn test_export_to_unwritable_destination() {
    let db = numbers(2);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("out.csv");

    let result = transfer_over(&db)
        .transfer_db_to_file(&profile(), "numbers", &columns(&["n"]), &path)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::FileAccessError));
    assert_eq!(result.record_count, 0);
    assert_eq!(db.state().closes, 1);
}

#[tokio::test]
async fn test_export_connection_refused() {
    let db = numbers(2);
    db.state().refuse_connections = true;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("refused.csv");

    let result = transfer_over(&db)
        .transfer_db_to_file(&profile(), "numbers", &columns(&["n"]), &path)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ConnectionError));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_import_counts_data_lines() {
    let db = MemoryDatabase::new();

    let result = transfer_over(&db)
        .transfer_file_to_db(&profile(), "a\n1\n2\n".as_bytes(), ',')
        .await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.record_count, 2);

    let tables = created_tables(&db);
    assert_eq!(tables.len(), 1);
    assert!(tables[0].starts_with(sql::IMPORT_TABLE_PREFIX));
    assert_eq!(result.destination.as_deref(), Some(tables[0].as_str()));

    let inserts = db.executed_containing("INSERT INTO");
    assert_eq!(
        inserts,
        vec![
            format!("INSERT INTO {} VALUES ('1')", tables[0]),
            format!("INSERT INTO {} VALUES ('2')", tables[0]),
        ]
    );
    assert_eq!(db.state().closes, 1);
}

#[tokio::test]
async fn test_import_creates_one_text_column_per_header_name() {
    let db = MemoryDatabase::new();

    let result = transfer_over(&db)
        .transfer_file_to_db(&profile(), "id|name\n7|Ada\n".as_bytes(), '|')
        .await;
    assert!(result.is_success());

    let create = &db.executed_containing("CREATE TABLE")[0];
    assert!(create.contains("(id String, name String)"), "{create}");
}

#[tokio::test]
async fn test_import_escapes_single_quotes() {
    let db = MemoryDatabase::new();

    let result = transfer_over(&db)
        .transfer_file_to_db(&profile(), "name\nO'Brien\n".as_bytes(), ',')
        .await;
    assert!(result.is_success());

    let insert = &db.executed_containing("INSERT INTO")[0];
    assert!(insert.ends_with("VALUES ('O''Brien')"), "{insert}");
}

#[tokio::test]
async fn test_import_header_only_creates_empty_table() {
    let db = MemoryDatabase::new();

    let result = transfer_over(&db)
        .transfer_file_to_db(&profile(), "a,b\n".as_bytes(), ',')
        .await;

    assert!(result.is_success());
    assert_eq!(result.record_count, 0);
    assert_eq!(created_tables(&db).len(), 1);
    assert!(db.executed_containing("INSERT").is_empty());
}

#[tokio::test]
async fn test_import_of_empty_input_never_connects() {
    let db = MemoryDatabase::new();

    let result = transfer_over(&db)
        .transfer_file_to_db(&profile(), "".as_bytes(), ',')
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ValidationError));
    assert_eq!(db.state().connects, 0);
}

#[tokio::test]
async fn test_repeated_imports_create_distinct_tables() {
    let db = MemoryDatabase::new();
    let transfer = transfer_over(&db);

    let first = transfer
        .transfer_file_to_db(&profile(), "a\n1\n".as_bytes(), ',')
        .await;
    let second = transfer
        .transfer_file_to_db(&profile(), "a\n1\n".as_bytes(), ',')
        .await;

    assert!(first.is_success() && second.is_success());
    assert_ne!(first.destination, second.destination);
    assert_eq!(created_tables(&db).len(), 2);
}

#[tokio::test]
async fn test_import_stops_at_first_rejected_insert() {
    let db = MemoryDatabase::new();
    db.state().fail_execute = Some(("INSERT".to_string(), 3));

    let result = transfer_over(&db)
        .transfer_file_to_db(&profile(), "a\n1\n2\n3\n4\n".as_bytes(), ',')
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::QueryError));
    assert_eq!(result.record_count, 2);
    assert!(result.destination.is_some(), "the created table is not dropped");
    assert_eq!(db.executed_containing("INSERT").len(), 3);

    let state = db.state();
    assert_eq!(state.connects, 1);
    assert_eq!(state.closes, 1);
}

#[tokio::test]
async fn test_import_with_batches() {
    let db = MemoryDatabase::new();
    let transfer = transfer_over(&db).with_options(TransferOptions { batch_size: 2 });

    let result = transfer
        .transfer_file_to_db(&profile(), "a\n1\n2\n3\n".as_bytes(), ',')
        .await;

    assert!(result.is_success());
    assert_eq!(result.record_count, 3);
    assert_eq!(db.executed_containing("INSERT").len(), 2);
}

#[tokio::test]
async fn test_import_rejects_line_break_delimiter() {
    let db = MemoryDatabase::new();

    let result = transfer_over(&db)
        .transfer_file_to_db(&profile(), "a\n1\n".as_bytes(), '\n')
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ValidationError));
    assert_eq!(db.state().connects, 0);
}

#[tokio::test]
async fn test_import_missing_file_is_validation_error() {
    let db = MemoryDatabase::new();
    let dir = TempDir::new().unwrap();

    let result = transfer_over(&db)
        .transfer_file_path_to_db(&profile(), &dir.path().join("nope.csv"), ',')
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ValidationError));
    assert_eq!(db.state().connects, 0);
}

#[tokio::test]
async fn test_round_trip_preserves_row_count() {
    let source = numbers(4);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("numbers_export.csv");

    let exported = transfer_over(&source)
        .transfer_db_to_file(&profile(), "numbers", &columns(&["n", "label"]), &path)
        .await;
    assert!(exported.is_success());

    let sink = MemoryDatabase::new();
    let imported = transfer_over(&sink)
        .transfer_file_path_to_db(&profile(), &path, ',')
        .await;

    assert!(imported.is_success(), "{imported:?}");
    assert_eq!(imported.record_count, exported.record_count);

    let create = &sink.executed_containing("CREATE TABLE")[0];
    assert!(create.contains("(n String, label String)"));
}

#[tokio::test]
async fn test_run_dispatches_on_direction() {
    let db = numbers(1);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");

    let request = TransferRequest::DbToFile {
        profile: profile(),
        table: "numbers".to_string(),
        columns: columns(&["n"]),
        destination: path.clone(),
    };
    assert_eq!(request.direction(), TransferDirection::DbToFile);
    let exported = transfer_over(&db).run(request).await;
    assert_eq!(exported.status, TransferStatus::Succeeded);

    let request = TransferRequest::FileToDb {
        profile: profile(),
        source: path,
        delimiter: ',',
    };
    let imported = transfer_over(&db).run(request).await;
    assert_eq!(imported.record_count, 1);
}

#[tokio::test]
async fn test_connection_check_opens_and_closes() {
    let db = MemoryDatabase::new();
    transfer_over(&db).test_connection(&profile()).await.unwrap();

    let state = db.state();
    assert_eq!(state.connects, 1);
    assert_eq!(state.closes, 1);
}

#[tokio::test]
async fn test_discovery_through_transfer() {
    let db = MemoryDatabase::new().with_table("t", &[("a", "Int32"), ("b", "String")], vec![]);

    let tables = transfer_over(&db).discover_schema(&profile()).await.unwrap();

    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "t");
    assert_eq!(tables[0].columns[0].type_name, "Int32");
    assert!(tables[0].columns.iter().all(|c| !c.selected));
}
