//! Schema discovery: the database catalog as an ordered table/column model.
//!
//! Every call reads the catalog afresh; nothing is cached between calls.

use crate::adapters::{
    CatalogEntry, ConnectionProfile, DatabaseConnection, DatabaseConnector, close_connection,
};
use crate::error::{BridgeError, Stage};
use crate::models::{ColumnDescriptor, TableDescriptor};
use std::collections::HashMap;
use tracing::{debug, info};

/// Groups catalog rows into tables.
///
/// Tables keep the order in which they are first seen and columns keep
/// catalog order. Every column starts unselected.
pub fn group_catalog(entries: Vec<CatalogEntry>) -> Vec<TableDescriptor> {
    let mut tables: Vec<TableDescriptor> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let position = *index.entry(entry.table.clone()).or_insert_with(|| {
            tables.push(TableDescriptor::new(entry.table.clone()));
            tables.len().saturating_sub(1)
        });
        if let Some(table) = tables.get_mut(position) {
            table
                .columns
                .push(ColumnDescriptor::new(entry.name, entry.type_name));
        }
    }

    tables
}

/// Reads and groups the catalog on an already open connection.
///
/// # Errors
/// Any failure is reported as a connection error at the discovery stage.
pub async fn collect_tables(
    connection: &mut dyn DatabaseConnection,
    database: &str,
) -> crate::Result<Vec<TableDescriptor>> {
    let entries = connection
        .fetch_catalog(database)
        .await
        .map_err(|e| BridgeError::connection_failed(Stage::Discovery, e))?;

    debug!("Catalog returned {} columns", entries.len());
    Ok(group_catalog(entries))
}

/// Discovers every table and column of the profile's database.
///
/// The connection is closed before returning, on success and on failure.
///
/// # Errors
/// Returns a validation error for an unusable profile; any connection or
/// catalog failure is a single connection error with no partial result.
pub async fn discover_schema(
    connector: &dyn DatabaseConnector,
    profile: &ConnectionProfile,
) -> crate::Result<Vec<TableDescriptor>> {
    profile.validate()?;
    info!("Discovering schema of {}", profile);

    let mut connection = connector.connect(profile).await.map_err(|e| match e {
        BridgeError::Connection { .. } | BridgeError::Validation { .. } => e,
        other => BridgeError::Connection {
            stage: Stage::Discovery,
            context: other.to_string(),
            source: None,
        },
    })?;

    let outcome = collect_tables(connection.as_mut(), &profile.database).await;
    close_connection(connection.as_mut()).await;

    let tables = outcome?;
    info!("Discovered {} tables", tables.len());
    Ok(tables)
}
