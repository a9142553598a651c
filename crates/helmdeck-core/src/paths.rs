//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = ".helmdeck";

/// Get the helmdeck config directory (~/.helmdeck)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the logs directory (~/.helmdeck/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Default settings document (~/.helmdeck/config.toml)
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default authorized operators file (~/.helmdeck/operators.toml)
pub fn default_keys_path() -> PathBuf {
    config_dir().join("operators.toml")
}
