//! Settings document loading.
//!
//! The console consumes one TOML document. The `[auth]` block is required;
//! `[modules.<id>]` tables are optional and handed to modules as read-only
//! views. Unknown keys anywhere are ignored so a newer config keeps working
//! with an older binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    /// Raw per-module sections, keyed by module id.
    #[serde(default)]
    pub modules: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Seconds a session stays valid after login.
    pub session_timeout: u64,
    /// Consecutive failures before a source is locked out.
    pub max_failed_attempts: u32,
    /// Seconds a locked source stays locked.
    pub lockout_duration: u64,
    /// Path to the authorized operators file.
    pub authorized_key_source: PathBuf,
}

impl Config {
    /// Load and parse the settings document. Any failure here is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
            .map_err(|e| Error::Configuration(format!("invalid {}: {}", path.display(), e)))
    }

    /// Parse a settings document. TOML is the native format; JSON is accepted
    /// for generated configs.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        match toml::from_str(raw) {
            Ok(config) => Ok(config),
            Err(toml_err) => serde_json::from_str(raw).map_err(|_| toml_err.to_string()),
        }
    }

    /// The read-only view handed to module `<id>`.
    ///
    /// A missing section is an empty view. A section that exists but is not a
    /// table marks the candidate malformed; discovery records it and moves on.
    pub fn module_section(&self, id: &str) -> std::result::Result<ModuleConfig, String> {
        match self.modules.get(id) {
            None => Ok(ModuleConfig::default()),
            Some(toml::Value::Table(table)) => Ok(ModuleConfig {
                table: table.clone(),
            }),
            Some(other) => Err(format!(
                "[modules.{}] must be a table, found {}",
                id,
                other.type_str()
            )),
        }
    }
}

/// Read-only typed view over one module's config section.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    table: toml::value::Table,
}

impl ModuleConfig {
    /// Typed lookup. Missing keys and type mismatches both yield `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.table.get(key).cloned().and_then(|v| v.try_into().ok())
    }

    /// Typed lookup with a fallback.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Modules default to enabled; `enabled = false` disables discovery.
    pub fn enabled(&self) -> bool {
        self.get_or("enabled", true)
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
