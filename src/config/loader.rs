//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid PORT override `{0}`")]
    InvalidPort(String),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    finalize(read_config(path)?)
}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides, then validate.
pub fn finalize(mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    override_port(&mut config, std::env::var("PORT").ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn override_port(config: &mut ProxyConfig, port: Option<String>) -> Result<(), ConfigError> {
    if let Some(raw) = port.filter(|p| !p.trim().is_empty()) {
        config.listener.port = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort(raw.clone()))?;
    }
    Ok(())
}
