//! Configuration management for cogauth.

pub mod paths;
pub mod settings;

pub use paths::config_file;
pub use settings::{
    BrokerConfig, CacheConfig, CognitoConfig, ConsoleConfig, HttpConfig, LoginFlow, OidcConfig,
    StoreKind,
};

use std::path::Path;

use crate::error::{BrokerError, Result};

/// Load configuration from `path`, or from the default config file.
///
/// If the config file doesn't exist, returns default configuration.
pub fn load_config(path: Option<&Path>) -> Result<BrokerConfig> {
    match path {
        Some(path) => load_config_from(path),
        None => load_config_from(&config_file()?),
    }
}

/// Load configuration from a specific path.
///
/// If the file doesn't exist, returns default configuration.
pub fn load_config_from(path: &Path) -> Result<BrokerConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(BrokerConfig::default().with_env_overrides());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: BrokerConfig = toml::from_str(&contents)
        .map_err(|e| BrokerError::ConfigRead(format!("{}: {e}", path.display())))?;

    Ok(config.with_env_overrides())
}
