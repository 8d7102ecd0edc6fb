//! Connection profile for a single request.
//!
//! A `ConnectionProfile` is built once per request, either from the JSON shape
//! `{"host", "port", "database", "username", "token"}` or through the builder
//! methods, and is never persisted.
//!
//! # Security
//! The credential token lives in a `Zeroizing` container, is skipped by
//! `Debug` and `Display`, and is never serialized.

use crate::error::BridgeError;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

/// Default ClickHouse HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8123;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one ClickHouse database.
///
/// # Example
/// ```rust
/// use chbridge_core::adapters::ConnectionProfile;
///
/// let profile = ConnectionProfile::new("localhost")
///     .with_port(8123)
///     .with_database("analytics")
///     .with_username("default")
///     .with_token("secret");
///
/// assert!(profile.validate().is_ok());
/// assert!(!format!("{profile:?}").contains("secret"));
/// ```
#[derive(Clone, Deserialize)]
pub struct ConnectionProfile {
    /// Database host name or address
    pub host: String,
    /// HTTP interface port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database whose tables are discovered and written
    pub database: String,
    /// Database user
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_token")]
    token: Zeroizing<String>,
    /// Use HTTPS instead of HTTP
    #[serde(default)]
    pub secure: bool,
    /// Seconds to wait for the TCP/TLS handshake
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

const fn default_port() -> u16 {
    DEFAULT_HTTP_PORT
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn deserialize_token<'de, D>(deserializer: D) -> Result<Zeroizing<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Zeroizing::new)
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_HTTP_PORT,
            database: "default".to_string(),
            username: "default".to_string(),
            token: Zeroizing::new(String::new()),
            secure: false,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("has_token", &self.has_token())
            .field("secure", &self.secure)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl std::fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Intentionally omit username and token
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

impl ConnectionProfile {
    /// Creates a profile for `host` with defaults for everything else.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Parses a profile from its JSON configuration shape.
    ///
    /// # Errors
    /// Returns a validation error if the JSON is malformed, misses a required
    /// field, or describes an invalid profile.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let profile: Self = serde_json::from_str(json).map_err(|e| {
            BridgeError::validation(format!("unparseable connection configuration: {e}"))
        })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Validates connection profile parameters.
    ///
    /// # Errors
    /// Returns a validation error if a required value is empty or out of range
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err(BridgeError::validation("host cannot be empty"));
        }

        if self.port == 0 {
            return Err(BridgeError::validation("port must be greater than 0"));
        }

        if self.database.trim().is_empty() {
            return Err(BridgeError::validation("database cannot be empty"));
        }

        if self.username.trim().is_empty() {
            return Err(BridgeError::validation("username cannot be empty"));
        }

        if self.connect_timeout_secs == 0 {
            return Err(BridgeError::validation("connect_timeout_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Builder method to set port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method to set database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Builder method to set username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Builder method to set the credential token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Zeroizing::new(token.into());
        self
    }

    /// Builder method to switch to HTTPS.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// The credential token. Callers must not log it.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Checks if a token is present without exposing it.
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Handshake timeout.
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Base URL of the HTTP interface, e.g. `http://localhost:8123/`.
    ///
    /// # Errors
    /// Returns a validation error if the host does not form a valid URL
    pub fn endpoint(&self) -> crate::Result<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let raw = format!("{scheme}://{}:{}/", self.host.trim(), self.port);
        let url = Url::parse(&raw).map_err(|e| {
            BridgeError::validation(format!("invalid host '{}': {e}", self.host))
        })?;
        if !url.username().is_empty() || url.password().is_some() {
            return Err(BridgeError::validation(
                "host must not embed credentials; use username and token",
            ));
        }
        Ok(url)
    }
}
