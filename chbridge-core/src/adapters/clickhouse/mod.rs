//! ClickHouse adapter over the HTTP interface.
//!
//! Every statement is one POST to `http(s)://host:port/` with the SQL as the
//! request body. The database is selected with the `database` URL parameter
//! and credentials travel in the `X-ClickHouse-User` / `X-ClickHouse-Key`
//! headers, so they never appear in a URL that could end up in a log.
//!
//! # Module Structure
//! - `response`: status classification, line buffering and the
//!   `JSONEachRow` row stream

mod response;


use super::{CatalogEntry, ConnectionProfile, DatabaseConnection, DatabaseConnector, RowStream};
use crate::error::{AdapterError, AdapterResult, BridgeError, Stage};
use crate::sql;
use async_trait::async_trait;
use url::Url;
use zeroize::Zeroizing;

pub use response::{JsonEachRowStream, LineBuffer, classify_failure, parse_exception_code};

const USER_HEADER: &str = "X-ClickHouse-User";
const KEY_HEADER: &str = "X-ClickHouse-Key";
const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";

/// Settings sent with every row query.
///
/// Decimals and 64-bit integers come back as JSON strings so that their
/// text survives decoding without a detour through `f64`.
pub const ROW_QUERY_SETTINGS: &[(&str, &str)] = &[
    ("output_format_json_quote_decimals", "1"),
    ("output_format_json_quote_64bit_integers", "1"),
];

/// Opens [`ClickHouseConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouseConnector;

impl ClickHouseConnector {
    /// Creates a connector.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseConnector for ClickHouseConnector {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
    ) -> crate::Result<Box<dyn DatabaseConnection>> {
        let connection = ClickHouseConnection::open(profile).await?;
        Ok(Box::new(connection))
    }

    fn engine(&self) -> &'static str {
        "ClickHouse"
    }
}

/// One request-scoped session against the ClickHouse HTTP interface.
pub struct ClickHouseConnection {
    client: Option<reqwest::Client>,
    endpoint: Url,
    database: String,
    username: String,
    token: Zeroizing<String>,
}

impl std::fmt::Debug for ClickHouseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseConnection")
            .field("endpoint", &self.endpoint.as_str())
            .field("database", &self.database)
            .field("open", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl ClickHouseConnection {
    /// Builds the HTTP client and verifies the server with `SELECT 1`.
    ///
    /// # Errors
    /// Returns a validation error for an invalid profile and a connection
    /// error (stage `connect`) for any failure talking to the server
    pub async fn open(profile: &ConnectionProfile) -> crate::Result<Self> {
        profile.validate()?;
        let endpoint = profile.endpoint()?;

        let client = reqwest::Client::builder()
            .connect_timeout(profile.connect_timeout())
            .build()
            .map_err(|e| {
                BridgeError::connection_failed(
                    Stage::Connect,
                    AdapterError::Transport {
                        endpoint: endpoint.to_string(),
                        source: Box::new(e),
                    },
                )
            })?;

        let mut connection = Self {
            client: Some(client),
            endpoint,
            database: profile.database.clone(),
            username: profile.username.clone(),
            token: Zeroizing::new(profile.token().to_string()),
        };

        if let Err(e) = connection.execute("SELECT 1").await {
            connection.client = None;
            return Err(BridgeError::connection_failed(Stage::Connect, e));
        }

        tracing::debug!("Connected to ClickHouse at {}", profile);
        Ok(connection)
    }

    /// The base URL this connection talks to.
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn client(&self) -> AdapterResult<&reqwest::Client> {
        self.client.as_ref().ok_or_else(|| AdapterError::Transport {
            endpoint: self.endpoint.to_string(),
            source: "connection already closed".into(),
        })
    }

    /// Posts one statement and returns the successful response.
    async fn send(
        &self,
        sql: String,
        params: &[(&str, &str)],
    ) -> AdapterResult<reqwest::Response> {
        let client = self.client()?;

        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("database", &self.database);
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        tracing::trace!("ClickHouse statement: {}", sql);

        let response = client
            .post(url)
            .header(USER_HEADER, &self.username)
            .header(KEY_HEADER, self.token.as_str())
            .body(sql)
            .send()
            .await
            .map_err(|e| AdapterError::Transport {
                endpoint: self.endpoint.to_string(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = response.text().await.unwrap_or_default();

        Err(classify_failure(status.as_u16(), header_code, &body))
    }
}

#[async_trait]
impl DatabaseConnection for ClickHouseConnection {
    async fn fetch_catalog(&mut self, database: &str) -> AdapterResult<Vec<CatalogEntry>> {
        let sql = format!("{} FORMAT JSONEachRow", sql::CATALOG_QUERY);
        let response = self
            .send(
                sql,
                &[
                    (sql::CATALOG_DATABASE_PARAM, database),
                    ("wait_end_of_query", "1"),
                ],
            )
            .await?;

        let mut stream = JsonEachRowStream::new(response);
        let mut entries = Vec::new();
        while let Some(row) = stream.next_row().await? {
            let entry: CatalogEntry = serde_json::from_value(serde_json::Value::Object(row))
                .map_err(|e| AdapterError::Decode {
                    context: "catalog row".to_string(),
                    source: e,
                })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    async fn query_rows(&mut self, sql: &str) -> AdapterResult<Box<dyn RowStream>> {
        let sql = format!("{sql} FORMAT JSONEachRow");
        let response = self.send(sql, ROW_QUERY_SETTINGS).await?;
        Ok(Box::new(JsonEachRowStream::new(response)))
    }

    async fn execute(&mut self, sql: &str) -> AdapterResult<()> {
        let response = self
            .send(sql.to_string(), &[("wait_end_of_query", "1")])
            .await?;

        // Drain the body so the acknowledgment covers the whole statement.
        let body = response.text().await.map_err(|e| AdapterError::Transport {
            endpoint: self.endpoint.to_string(),
            source: Box::new(e),
        })?;

        match parse_exception_code(&body) {
            Some(code) => Err(classify_failure(200, Some(code), &body)),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> AdapterResult<()> {
        if self.client.take().is_some() {
            tracing::debug!("Closed ClickHouse connection to {}", self.endpoint);
        }
        Ok(())
    }
}
