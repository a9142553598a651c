//! Unified error taxonomy for the console core.
//!
//! Only `Configuration` and `Discovery` are fatal, and only at startup.
//! Everything else is recoverable and maps to a specific remediation in the
//! console layer: re-prompt, wait, show "not allowed", or report a module
//! failure and carry on.

use std::time::Duration;

use thiserror::Error;

use crate::auth::PrivilegeLevel;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The settings document is missing, unreadable, or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The module catalog itself could not be scanned.
    #[error("module discovery failed: {0}")]
    Discovery(String),

    /// Key rejected, or the session is expired/revoked. Re-authenticate.
    #[error("authentication failed")]
    Authentication,

    /// The source is locked out after too many failed attempts.
    #[error("too many failed attempts, retry in {}s", remaining.as_secs())]
    RateLimited { remaining: Duration },

    /// The session is valid but under-privileged for the operation.
    #[error("requires {required} privilege, session holds {held}")]
    Authorization {
        required: PrivilegeLevel,
        held: PrivilegeLevel,
    },

    /// A module-level failure surfaced through the registry boundary.
    /// The module stays loaded; the invocation is simply reported as failed.
    #[error("module '{module}' failed: {reason}")]
    ModuleExecution { module: String, reason: String },
}

impl Error {
    /// Fatal errors abort startup; everything else is reported and survived.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Discovery(_))
    }
}
