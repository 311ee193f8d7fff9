//! # Configuration
//!
//! Layered service configuration.
//!
//! Values are resolved in this order, later sources winning:
//!
//! 1. built-in defaults
//! 2. `config/default.toml`, if present
//! 3. the file passed explicitly (e.g. `--config`), if any
//! 4. environment variables prefixed `PORTFOLIO_INGEST`, with `__` between
//!    section and key (`PORTFOLIO_INGEST__BATCH__PAGE_SIZE=50`)
//!
//! A `.env` file in the working directory is loaded into the environment
//! first.
//!
//! # Examples
//!
//! ```
//! use portfolio_ingest::infrastructure::config::AppConfig;
//!
//! let config = AppConfig::default();
//! assert_eq!(config.batch.page_size, 10);
//! assert!(config.database.url.is_none());
//! ```

use crate::infrastructure::notification::SmtpSettings;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PORTFOLIO_INGEST";

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Parses `host:port` into a socket address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the host is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server address: {e}")))
    }
}

/// Database connection. The in-memory store is used when `url` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string.
    pub url: Option<String>,
    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

/// Batch job tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Job name used by the run guard.
    pub job_name: String,
    /// Chunk and reader page size.
    pub page_size: usize,
    /// Launch attempts before escalation.
    pub max_attempts: u32,
    /// Pause between attempts, in seconds.
    pub backoff_secs: u64,
    /// Recurring trigger interval; no recurring trigger when absent.
    pub schedule_interval_secs: Option<u64>,
    /// Whether a failed token may run again.
    pub restartable: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            job_name: "operation-consolidation".to_string(),
            page_size: 10,
            max_attempts: 3,
            backoff_secs: 5,
            schedule_interval_secs: Some(3600),
            restartable: true,
        }
    }
}

impl BatchConfig {
    /// Pause between attempts.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    /// Recurring trigger interval.
    #[must_use]
    pub fn schedule_interval(&self) -> Option<Duration> {
        self.schedule_interval_secs.map(Duration::from_secs)
    }
}

/// Upload limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Whole-upload deadline, in seconds.
    pub timeout_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

impl ImportConfig {
    /// Whole-upload deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Operator alerts. Alerts are only logged when `smtp` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// SMTP relay.
    pub smtp: Option<SmtpSettings>,
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: "info,sqlx=warn".to_string(),
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Database connection.
    pub database: DatabaseConfig,
    /// Batch job tuning.
    pub batch: BatchConfig,
    /// Upload limits.
    pub import: ImportConfig,
    /// Operator alerts.
    pub notifier: NotifierConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads the configuration from the default file, `path` and the
    /// environment, after loading `.env`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if `path` is missing or any source is
    /// malformed, and `ConfigError::Invalid` if a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.page_size == 0 {
            return Err(ConfigError::Invalid("batch.page_size must be positive".into()));
        }
        if self.batch.max_attempts == 0 {
            return Err(ConfigError::Invalid("batch.max_attempts must be positive".into()));
        }
        if self.batch.schedule_interval_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "batch.schedule_interval_secs must be positive".into(),
            ));
        }
        if self.import.timeout_secs == 0 {
            return Err(ConfigError::Invalid("import.timeout_secs must be positive".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be positive".into(),
            ));
        }
        self.server.socket_addr().map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn from_toml(text: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch.max_attempts, 3);
        assert_eq!(config.batch.backoff(), Duration::from_secs(5));
        assert_eq!(config.import.timeout(), Duration::from_secs(300));
        assert!(config.batch.restartable);
        assert!(config.notifier.smtp.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = from_toml(
            r#"
            [batch]
            page_size = 50

            [database]
            url = "postgres://localhost/ingest"
            "#,
        );
        assert_eq!(config.batch.page_size, 50);
        assert_eq!(config.batch.max_attempts, 3);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/ingest")
        );
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn smtp_section_is_read() {
        let config = from_toml(
            r#"
            [notifier.smtp]
            host = "smtp.example.com"
            port = 587
            from = "batch@example.com"
            to = ["ops@example.com"]
            "#,
        );
        let smtp = config.notifier.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert!(smtp.username.is_none());
        assert_eq!(smtp.to, vec!["ops@example.com".to_string()]);
    }

    #[test]
    fn zero_page_size_is_invalid() {
        let mut config = AppConfig::default();
        config.batch.page_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_host_is_invalid() {
        let mut config = AppConfig::default();
        config.server.host = "not an address".to_string();
        assert!(config.validate().is_err());
    }
}
