//! Configuration management for glottocat

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::services::import::ImportMode;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

/// Run parameters for a batch import.
#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// `insert` skips records whose key is already known, `update` diffs them.
    pub mode: ImportMode,
    /// Corpus version identifier selecting which source batch to read.
    pub version: String,
    /// Directory holding one subdirectory per corpus version.
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub import: ImportConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (with prefix GLOTTOCAT_)
            .add_source(
                Environment::with_prefix("GLOTTOCAT")
                    .separator("_")
                    .try_parsing(true),
            )
            // Override database URL from DATABASE_URL env var if present
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
