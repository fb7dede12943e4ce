//! Configuration management for formrelay.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. The
//! defaults reproduce the fixed addresses and paths the service has always
//! used, so running without any configuration file behaves identically.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name, looked up in the working directory.
const CONFIG_FILE_NAME: &str = "formrelay.toml";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "FORMRELAY_";

/// Largest payload a single UDP datagram can carry over IPv4.
const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FORMRELAY_`, sections separated
///    by `__`, e.g. `FORMRELAY_HTTP__PORT=8080`)
/// 2. TOML config file (`formrelay.toml` in the working directory)
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP front end configuration.
    pub http: HttpConfig,
    /// Datagram relay configuration.
    pub relay: RelayConfig,
    /// Record store configuration.
    pub storage: StorageConfig,
}

/// HTTP front end configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Host name or IP address to listen on.
    pub host: String,
    /// Port to listen on. Use 0 for an ephemeral port.
    pub port: u16,
    /// Directory that static files and documents are served from.
    pub site_root: PathBuf,
    /// Document served for `GET /`.
    pub index_document: String,
    /// Document served for `GET /message`.
    pub message_document: String,
    /// Document served with status 404.
    pub error_document: String,
}

/// Datagram relay configuration.
///
/// The message receiver listens on this address and the HTTP front end
/// forwards form bodies to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Host name or IP address of the message receiver.
    pub host: String,
    /// Port of the message receiver. Use 0 for an ephemeral port.
    pub port: u16,
    /// Receive buffer size. Longer datagrams are truncated.
    pub buffer_size: usize,
}

/// Record store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the JSON store file.
    pub path: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            site_root: PathBuf::from("."),
            index_document: "index.html".to_string(),
            message_document: "message.html".to_string(),
            error_document: "error.html".to_string(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5000,
            buffer_size: 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("storage").join("data.json"),
        }
    }
}

impl Config {
    /// Load configuration, reading the TOML file from `config_path` or the
    /// default location.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `FORMRELAY_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.http.host.trim().is_empty() {
            return Err(Error::config_validation("http.host must not be empty"));
        }

        if self.relay.host.trim().is_empty() {
            return Err(Error::config_validation("relay.host must not be empty"));
        }

        if self.relay.buffer_size == 0 || self.relay.buffer_size > MAX_DATAGRAM_SIZE {
            return Err(Error::config_validation(format!(
                "relay.buffer_size ({}) must be between 1 and {MAX_DATAGRAM_SIZE}",
                self.relay.buffer_size
            )));
        }

        for (field, name) in [
            ("http.index_document", &self.http.index_document),
            ("http.message_document", &self.http.message_document),
            ("http.error_document", &self.http.error_document),
        ] {
            if name.trim().is_empty() {
                return Err(Error::config_validation(format!(
                    "{field} must not be empty"
                )));
            }
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(Error::config_validation("storage.path must not be empty"));
        }

        Ok(())
    }

    /// The `host:port` address the HTTP front end listens on.
    #[must_use]
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    /// The `host:port` address of the message receiver.
    #[must_use]
    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.relay.host, self.relay.port)
    }

    /// Path to the JSON store file.
    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.storage.path
    }
}
