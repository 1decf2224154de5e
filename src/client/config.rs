//! Client Configuration
//!
//! Resolves backend URLs and the local database path from [`AppConfig`]
//! plus environment overrides.

use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use std::path::PathBuf;

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Client configuration wrapper.
///
/// Layers environment overrides on top of an [`AppConfig`]:
/// `EVENTSYNC_CONFIG` (TOML file), `EVENTSYNC_API_URL`, `EVENTSYNC_DB_PATH`.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        let app = builder.build()?;
        Ok(Self { app })
    }

    pub fn from_app(app: AppConfig) -> Result<Self, ConfigError> {
        app.validate()?;
        Ok(Self { app })
    }

    /// Load configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut app = match std::env::var("EVENTSYNC_CONFIG") {
            Ok(path) => AppConfig::load(path)?,
            Err(_) => AppConfig::default(),
        };
        if let Ok(url) = std::env::var("EVENTSYNC_API_URL") {
            app.server_url = Some(url);
        }
        if let Ok(path) = std::env::var("EVENTSYNC_DB_PATH") {
            app.database_path = Some(PathBuf::from(path));
        }
        Self::from_app(app)
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url().trim_end_matches('/'), path)
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn graphql_url(&self) -> String {
        self.api_url(&self.app.graphql_path)
    }

    pub fn refresh_url(&self) -> String {
        self.api_url(&self.app.refresh_path)
    }

    pub fn health_url(&self) -> String {
        self.api_url(&self.app.health_path)
    }

    /// Route the UI navigates to after a forced logout
    pub fn login_redirect(&self) -> &str {
        &self.app.login_path
    }

    /// Local database file, defaulting to the platform data directory
    pub fn db_path(&self) -> PathBuf {
        if let Some(path) = &self.app.database_path {
            return path.clone();
        }
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("eventsync");
        path.push("offline.db");
        path
    }
}
