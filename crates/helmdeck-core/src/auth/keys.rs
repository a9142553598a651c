//! Authorized operator key file.
//!
//! A TOML allowlist mapping key fingerprints to principals. Only the SHA-256
//! fingerprint of each key is stored on disk; the presented key itself never
//! leaves memory.
//!
//! ```toml
//! [[operators]]
//! name = "kevin"
//! key_sha256 = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! privilege = "admin"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::auth::PrivilegeLevel;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorKey {
    pub name: String,
    /// Lowercase hex SHA-256 over the presented key bytes.
    pub key_sha256: String,
    pub privilege: PrivilegeLevel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizedKeys {
    #[serde(default)]
    pub operators: Vec<OperatorKey>,
}

impl AuthorizedKeys {
    /// Load the operator allowlist. An unreadable or invalid file is fatal at
    /// startup.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "failed to read authorized keys {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("invalid authorized keys {}: {}", path.display(), e))
        })
    }

    /// Resolve a presented key to its operator record, if any.
    pub fn lookup(&self, presented_key: &str) -> Option<&OperatorKey> {
        let fp = fingerprint(presented_key);
        self.operators
            .iter()
            .find(|op| op.key_sha256.eq_ignore_ascii_case(&fp))
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Lowercase hex SHA-256 fingerprint of a presented key. Surrounding
/// whitespace is not part of the key material.
pub fn fingerprint(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.trim().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_with(name: &str, key: &str, privilege: PrivilegeLevel) -> AuthorizedKeys {
        AuthorizedKeys {
            operators: vec![OperatorKey {
                name: name.to_string(),
                key_sha256: fingerprint(key),
                privilege,
            }],
        }
    }

    #[test]
    fn lookup_matches_by_fingerprint() {
        let keys = keys_with("kevin", "hunter2", PrivilegeLevel::Admin);

        let op = keys.lookup("hunter2").expect("match");
        assert_eq!(op.name, "kevin");
        assert_eq!(op.privilege, PrivilegeLevel::Admin);

        assert!(keys.lookup("hunter3").is_none());
    }

    #[test]
    fn lookup_ignores_surrounding_whitespace() {
        let keys = keys_with("kevin", "hunter2", PrivilegeLevel::Operator);
        assert!(keys.lookup("  hunter2\n").is_some());
    }

    #[test]
    fn load_round_trips_through_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("operators.toml");
        let keys = keys_with("ada", "correct horse", PrivilegeLevel::Observer);
        std::fs::write(&path, toml::to_string_pretty(&keys).expect("encode")).expect("write");

        let loaded = AuthorizedKeys::load(&path).expect("load");
        assert_eq!(loaded.operators.len(), 1);
        assert!(loaded.lookup("correct horse").is_some());
    }

    #[test]
    fn load_missing_file_is_fatal() {
        let err = AuthorizedKeys::load(Path::new("/nonexistent/operators.toml")).unwrap_err();
        assert!(err.is_fatal());
    }
}
