//! Configuration management for taskrelay
//!
//! Layered configuration loading:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `TASKRELAY__<section>__<key>`, e.g.
//! `TASKRELAY__ENGINE__BASE_URL=http://engine:8080/external-job-api`.
//! Engine credentials come only from `TASKRELAY_ENGINE_USER` /
//! `TASKRELAY_ENGINE_PASS`.
//!
//! # Configuration File
//!
//! By default the configuration is loaded from `config/taskrelay.toml`;
//! override with the `TASKRELAY_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, DaySchedule, EngineConfig, PauseConfig, TimeWindow, WorkerConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
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
[[workers]]
topic = "httpTask"
worker_id = "relay-1"
target_url = "http://svc:9000/task"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.workers.len(), 1);
        assert_eq!(config.workers[0].topic, "httpTask");
    }

    #[test]
    fn test_validation_catches_missing_workers() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[engine]\nbase_url = \"http://engine\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::NoWorkers)
        ));
    }

    #[test]
    fn test_validation_catches_bad_pause_window() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[[workers]]
topic = "httpTask"
worker_id = "relay-1"
target_url = "http://svc:9000/task"

[workers.pause]
time_zone = "UTC"
from_hour = 22
to_hour_exclusive = 22
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidHourRange { .. })
        ));
    }
}
