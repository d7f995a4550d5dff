//! Configuration loading from disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::interpolate::interpolate_env;
use crate::config::schema::RouterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// `--env` value meaning "no interpolation".
pub const NO_ENV_FILE: &str = "NONE";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("reading env file {path:?} failed: {source}")]
    EnvFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("env file {path:?} is not a flat JSON object of strings: {source}")]
    EnvMap {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config file is not valid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, interpolate and validate configuration.
///
/// `env_path` of `None` skips placeholder interpolation.
pub fn load_config(path: &Path, env_path: Option<&Path>) -> Result<RouterConfig, ConfigError> {
    let mut content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(env_path) = env_path {
        let mapping = load_env_mapping(env_path)?;
        tracing::debug!(placeholders = mapping.len(), "Interpolating config placeholders");
        content = interpolate_env(&content, &mapping);
    }

    parse_config(&content)
}

/// Parse and validate an already-interpolated config document.
pub fn parse_config(content: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = serde_json::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Read the placeholder → environment variable mapping.
pub fn load_env_mapping(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::EnvMap {
        path: path.to_path_buf(),
        source,
    })
}
