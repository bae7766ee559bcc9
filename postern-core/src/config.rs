//! Configuration management

use crate::error::{ErrorContext, PosternError, PosternResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PosternConfig {
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub access: AccessConfig,
}

/// Read-model connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx connection string, e.g. `sqlite://postern.db`
    pub database_url: String,
    pub max_connections: u32,
    /// Create tables and indexes on connect
    pub run_migrations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://postern.db".to_string(),
            max_connections: 5,
            run_migrations: true,
        }
    }
}

/// Policy engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Upper bound for a single ownership lookup. An expired lookup is a denial.
    pub resolver_timeout_ms: u64,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            resolver_timeout_ms: 2000,
            default_page_size: 25,
            max_page_size: 200,
        }
    }
}

impl PosternConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PosternResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PosternError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: PosternConfig = toml::from_str(&content).map_err(|e| PosternError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> PosternResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| PosternError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| PosternError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> PosternResult<()> {
        if self.store.database_url.trim().is_empty() {
            return Err(invalid(
                "store.database_url must be non-empty",
                "Set store.database_url to a sqlite connection string",
            ));
        }

        if self.store.max_connections == 0 {
            return Err(invalid(
                "store.max_connections must be greater than 0",
                "Set store.max_connections to a positive value",
            ));
        }

        if self.access.resolver_timeout_ms == 0 {
            return Err(invalid(
                "access.resolver_timeout_ms must be greater than 0",
                "Set access.resolver_timeout_ms to a positive value",
            ));
        }

        if self.access.max_page_size == 0 {
            return Err(invalid(
                "access.max_page_size must be greater than 0",
                "Set access.max_page_size to a positive value",
            ));
        }

        if self.access.default_page_size == 0
            || self.access.default_page_size > self.access.max_page_size
        {
            return Err(invalid(
                "access.default_page_size must be between 1 and access.max_page_size",
                "Lower access.default_page_size or raise access.max_page_size",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str, suggestion: &str) -> PosternError {
    PosternError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion(suggestion),
    }
}
