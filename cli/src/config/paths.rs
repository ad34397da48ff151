//! Platform-specific path utilities for cogauth.

use std::path::PathBuf;

use crate::error::{BrokerError, Result};

/// Get the configuration directory for cogauth.
///
/// - Linux: `~/.config/cogauth`
/// - macOS: `~/Library/Application Support/cogauth`
/// - Windows: `%APPDATA%\cogauth`
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| BrokerError::Config("Cannot determine config directory".to_string()))?;
    Ok(base.join("cogauth"))
}

/// Get the cache directory holding token and credential files.
///
/// - Linux: `~/.cache/cogauth`
/// - macOS: `~/Library/Caches/cogauth`
/// - Windows: `%LOCALAPPDATA%\cogauth`
pub fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .ok_or_else(|| BrokerError::Config("Cannot determine cache directory".to_string()))?;
    Ok(base.join("cogauth"))
}

/// Get the main configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}
