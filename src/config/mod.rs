//! Configuration management for mediabox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mediabox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `MEDIABOX__<section>__<key>`
//!
//! Examples:
//! - `MEDIABOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `MEDIABOX__WORKER__NUM_WORKERS=8`
//! - `MEDIABOX__ENGINES__YTDLP__TIMEOUT=45m`
//!
//! API keys are read from `MEDIABOX_API_KEYS` (comma separated) only.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/mediabox.toml`.
//! This can be overridden using the `MEDIABOX_CONFIG` environment variable
//! or the `--config` CLI flag.

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{
    ApiLimits, Config, CorsConfig, EngineRoute, EnginesConfig, HttpEngineConfig, LogFormat,
    ProcessEngineConfig, RetentionConfig, SecurityConfig, ServerConfig, StorageConfig,
    TelemetryConfig, WorkerConfig,
};
pub use validation::ValidationError;

use crate::engines::{EngineRegistry, RegistryError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`MEDIABOX__*`)
    /// 2. TOML file (default: `config/mediabox.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], with an explicit file taking precedence over `MEDIABOX_CONFIG`
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Engine selector for this configuration
    pub fn engine_registry(&self) -> Result<EngineRegistry, RegistryError> {
        EngineRegistry::from_config(&self.engines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[engines]
default_engines = ["http"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.engines.default_engines, vec!["http"]);
        assert_eq!(config.engines.routes.len(), 3);
    }

    #[test]
    fn test_validation_catches_unsupported_route() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[engines]
supported = ["yt-dlp"]
default_engines = ["yt-dlp"]

[[engines.routes]]
domain = "imgur.com"
engines = ["gallery-dl"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::UnsupportedEngineReference { .. })
        ));
    }

    #[test]
    fn test_engine_registry_integration() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[engines]
supported = ["yt-dlp", "gallery-dl", "http"]
default_engines = ["http", "yt-dlp"]

[[engines.routes]]
domain = "www.Instagram.com"
engines = ["gallery-dl", "yt-dlp"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        let registry = config.engine_registry().unwrap();

        let routed = registry.select_engines("https://instagram.com/p/xyz", None, None);
        let routed: Vec<&str> = routed.iter().map(|e| e.as_str()).collect();
        assert_eq!(routed, vec!["gallery-dl", "yt-dlp"]);

        let hinted = registry.select_engines("https://instagram.com/p/xyz", Some("http"), None);
        let hinted: Vec<&str> = hinted.iter().map(|e| e.as_str()).collect();
        assert_eq!(hinted, vec!["http"]);

        let fallback = registry.select_engines("https://example.com/a.mp4", None, None);
        let fallback: Vec<&str> = fallback.iter().map(|e| e.as_str()).collect();
        assert_eq!(fallback, vec!["http", "yt-dlp"]);
    }
}
