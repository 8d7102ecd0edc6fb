//! In-memory database double for unit tests.
//!
//! Understands just enough SQL to serve the pipeline: catalog listing,
//! `SELECT <cols> FROM <table>` projections, and recording of every executed
//! statement. Failures can be injected per statement.

use super::{CatalogEntry, ConnectionProfile, DatabaseConnection, DatabaseConnector, RowStream};
use crate::error::{AdapterError, AdapterResult, BridgeError, Stage};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub(crate) struct MemoryTable {
    pub name: String,
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub tables: Vec<MemoryTable>,
    pub executed: Vec<String>,
    pub queries: Vec<String>,
    pub connects: u32,
    pub closes: u32,
    pub refuse_connections: bool,
    pub fail_catalog: bool,
    /// Fail the n-th (1-based) executed statement containing the needle
    pub fail_execute: Option<(String, usize)>,
    /// Yield this many rows, then fail the stream
    pub fail_stream_after: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn with_table(self, name: &str, columns: &[(&str, &str)], rows: Vec<Value>) -> Self {
        let table = MemoryTable {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, t)| ((*n).to_string(), (*t).to_string()))
                .collect(),
            rows: rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(map) => map,
                    other => panic!("memory rows must be JSON objects, got {other}"),
                })
                .collect(),
        };
        self.state().tables.push(table);
        self
    }

    pub fn executed_containing(&self, needle: &str) -> Vec<String> {
        self.state()
            .executed
            .iter()
            .filter(|sql| sql.contains(needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DatabaseConnector for MemoryDatabase {
    async fn connect(
        &self,
        _profile: &ConnectionProfile,
    ) -> crate::Result<Box<dyn DatabaseConnection>> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(BridgeError::connection_failed(
                Stage::Connect,
                AdapterError::Transport {
                    endpoint: "memory://".to_string(),
                    source: "connection refused".into(),
                },
            ));
        }
        state.connects = state.connects.saturating_add(1);
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }

    fn engine(&self) -> &'static str {
        "memory"
    }
}

struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    open: bool,
}

impl MemoryConnection {
    fn state(&self) -> AdapterResult<MutexGuard<'_, MemoryState>> {
        if !self.open {
            return Err(AdapterError::Transport {
                endpoint: "memory://".to_string(),
                source: "connection already closed".into(),
            });
        }
        Ok(self.state.lock().unwrap())
    }
}

fn unknown_table(name: &str) -> AdapterError {
    AdapterError::Server {
        code: Some(60),
        message: format!("Table {name} does not exist. (UNKNOWN_TABLE)"),
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn fetch_catalog(&mut self, _database: &str) -> AdapterResult<Vec<CatalogEntry>> {
        let state = self.state()?;
        if state.fail_catalog {
            return Err(AdapterError::Server {
                code: Some(497),
                message: "Not enough privileges. (ACCESS_DENIED)".to_string(),
            });
        }

        let mut tables: Vec<&MemoryTable> = state.tables.iter().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables
            .into_iter()
            .flat_map(|t| {
                t.columns
                    .iter()
                    .map(|(name, ty)| CatalogEntry::new(t.name.clone(), name.clone(), ty.clone()))
            })
            .collect())
    }

    async fn query_rows(&mut self, sql: &str) -> AdapterResult<Box<dyn RowStream>> {
        let mut state = self.state()?;
        state.queries.push(sql.to_string());

        let body = sql.strip_prefix("SELECT ").ok_or_else(|| AdapterError::Server {
            code: Some(62),
            message: format!("Syntax error: {sql}"),
        })?;
        let (columns, table) = body.split_once(" FROM ").ok_or_else(|| AdapterError::Server {
            code: Some(62),
            message: format!("Syntax error: {sql}"),
        })?;
        let table = state
            .tables
            .iter()
            .find(|t| t.name == table.trim())
            .ok_or_else(|| unknown_table(table))?;

        let columns: Vec<&str> = columns.split(", ").collect();
        for column in &columns {
            if !table.columns.iter().any(|(name, _)| name == column) {
                return Err(AdapterError::Server {
                    code: Some(47),
                    message: format!("Missing columns: '{column}'. (UNKNOWN_IDENTIFIER)"),
                });
            }
        }

        let rows: VecDeque<Map<String, Value>> = table
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| ((*c).to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();

        Ok(Box::new(MemoryRows {
            rows,
            yielded: 0,
            fail_after: state.fail_stream_after,
        }))
    }

    async fn execute(&mut self, sql: &str) -> AdapterResult<()> {
        let mut state = self.state()?;
        state.executed.push(sql.to_string());

        if let Some((needle, nth)) = state.fail_execute.clone() {
            let seen = state.executed.iter().filter(|s| s.contains(&needle)).count();
            if sql.contains(&needle) && seen == nth {
                return Err(AdapterError::Server {
                    code: Some(62),
                    message: format!("Syntax error near '{needle}'"),
                });
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> AdapterResult<()> {
        if self.open {
            self.open = false;
            let mut state = self.state.lock().unwrap();
            state.closes = state.closes.saturating_add(1);
        }
        Ok(())
    }
}

struct MemoryRows {
    rows: VecDeque<Map<String, Value>>,
    yielded: usize,
    fail_after: Option<usize>,
}

#[async_trait]
impl RowStream for MemoryRows {
    async fn next_row(&mut self) -> AdapterResult<Option<Map<String, Value>>> {
        if self.fail_after == Some(self.yielded) {
            return Err(AdapterError::Transport {
                endpoint: "memory://".to_string(),
                source: "connection reset by peer".into(),
            });
        }
        self.yielded = self.yielded.saturating_add(1);
        Ok(self.rows.pop_front())
    }
}
