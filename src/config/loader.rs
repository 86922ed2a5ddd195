//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::CallerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `downstream.base_url`.
pub const DOWNSTREAM_URL_ENV: &str = "DOWNSTREAM_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<CallerConfig, ConfigError> {
    let mut config: CallerConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CallerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Defaults plus environment overrides, validated.
pub fn default_config() -> Result<CallerConfig, ConfigError> {
    let mut config = CallerConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut CallerConfig) {
    if let Ok(url) = std::env::var(DOWNSTREAM_URL_ENV) {
        if !url.is_empty() {
            config.downstream.base_url = url;
        }
    }
}
