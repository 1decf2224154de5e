//! Application configuration module
//!
//! Provides configuration types for the sync layer. Configuration can be
//! assembled with [`AppConfigBuilder`] or read from a TOML document:
//!
//! ```toml
//! server_url = "https://api.example.com"
//! graphql_path = "/graphql"
//!
//! [sync]
//! max_attempts = 5
//! terminal_failure = "block"
//!
//! [auth]
//! check_interval_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server URL
    pub server_url: Option<String>,
    /// GraphQL endpoint path
    pub graphql_path: String,
    /// Token refresh endpoint path
    pub refresh_path: String,
    /// Where the UI sends the user after a forced logout
    pub login_path: String,
    /// Endpoint polled by the connectivity probe
    pub health_path: String,
    /// SQLite file backing the local store
    pub database_path: Option<PathBuf>,
    /// Replay policy
    pub sync: SyncPolicy,
    /// Token refresh policy
    pub auth: AuthPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            graphql_path: "/graphql".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            login_path: "/auth/login".to_string(),
            health_path: "/health".to_string(),
            database_path: None,
            sync: SyncPolicy::default(),
            auth: AuthPolicy::default(),
        }
    }
}

/// What a `FAILED_TERMINAL` item does to the items queued behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalFailurePolicy {
    /// Stop replay at the failed item until the user retries or discards it
    Block,
    /// Leave the failed item in place and continue with the next one
    Skip,
}

/// Mutation replay policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Attempts before an item becomes `FAILED_TERMINAL`
    pub max_attempts: u32,
    /// First backoff delay
    pub base_backoff_ms: u64,
    /// Backoff ceiling
    pub max_backoff_ms: u64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
    /// Bounded wait for each replay call
    pub request_timeout_ms: u64,
    /// Scheduled retry pass interval while online
    pub retry_interval_secs: u64,
    /// Blocking behaviour of terminal failures
    pub terminal_failure: TerminalFailurePolicy,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 1_000,
            max_backoff_ms: 300_000,
            jitter: 0.1,
            request_timeout_ms: 10_000,
            retry_interval_secs: 30,
            terminal_failure: TerminalFailurePolicy::Block,
        }
    }
}

impl SyncPolicy {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

/// Token refresh policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthPolicy {
    /// Periodic token check interval
    pub check_interval_secs: u64,
    /// Refresh proactively when expiry is this close
    pub refresh_threshold_secs: u64,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            refresh_threshold_secs: 300,
        }
    }
}

impl AuthPolicy {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        for path in [
            &self.graphql_path,
            &self.refresh_path,
            &self.login_path,
            &self.health_path,
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidPath(path.clone()));
            }
        }
        if self.sync.max_attempts == 0 {
            return Err(ConfigError::MissingValue("sync.max_attempts"));
        }
        if !(0.0..=1.0).contains(&self.sync.jitter) {
            return Err(ConfigError::OutOfRange("sync.jitter"));
        }
        if self.sync.base_backoff_ms > self.sync.max_backoff_ms {
            return Err(ConfigError::OutOfRange("sync.base_backoff_ms"));
        }
        if self.sync.request_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange("sync.request_timeout_ms"));
        }
        if self.sync.retry_interval_secs == 0 {
            return Err(ConfigError::MissingValue("sync.retry_interval_secs"));
        }
        if self.auth.check_interval_secs == 0 {
            return Err(ConfigError::MissingValue("auth.check_interval_secs"));
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = Some(url.into());
        self
    }

    /// Set the GraphQL path
    pub fn graphql_path(mut self, path: impl Into<String>) -> Self {
        self.config.graphql_path = path.into();
        self
    }

    /// Set the refresh endpoint path
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    /// Set the local database file
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Replace the replay policy
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.config.sync = policy;
        self
    }

    /// Replace the auth policy
    pub fn auth_policy(mut self, policy: AuthPolicy) -> Self {
        self.config.auth = policy;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("endpoint path must start with '/': {0}")]
    InvalidPath(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
    #[error("failed to read config: {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}
