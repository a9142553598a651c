//! Session issuance, validation, and failed-attempt lockout.
//!
//! Two independent stores live here. The session table holds authenticated
//! contexts; the attempt ledger throttles credential guessing per source.
//! Their lifecycles are deliberately separate: a locked-out source does not
//! invalidate an operator's existing session, and repeated bad attempts are
//! throttled before any session exists.
//!
//! Lockout state machine per source bucket:
//!
//! ```text
//! Normal --failure--> Normal            (while failure_count < max)
//!        --failure--> Locked            (on reaching max)
//! Locked --now >= locked_until--> Normal
//! ```
//!
//! Success resets the bucket; success is not possible while locked because a
//! locked bucket short-circuits before any key comparison.

mod keys;

pub use keys::{fingerprint, AuthorizedKeys, OperatorKey};

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Ordinal privilege rank. Ordering is the authorization check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PrivilegeLevel {
    Observer,
    Operator,
    Admin,
}

impl PrivilegeLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PrivilegeLevel::Observer => "observer",
            PrivilegeLevel::Operator => "operator",
            PrivilegeLevel::Admin => "admin",
        }
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The opaque token surfaced to the console layer. Immutable; revocation
/// state lives in the authenticator's session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub identity: String,
    pub privilege: PrivilegeLevel,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

struct SessionRecord {
    session: Session,
    revoked: bool,
}

#[derive(Debug, Clone, Default)]
struct AttemptBucket {
    failure_count: u32,
    first_failure_at: Option<DateTime<Utc>>,
    locked_until: Option<DateTime<Utc>>,
}

/// Failed-attempt state for one source, for display.
#[derive(Debug, Clone, Default)]
pub struct LockoutStatus {
    pub failure_count: u32,
    /// Remaining lockout, `None` when the source is not locked.
    pub locked_remaining: Option<std::time::Duration>,
}

/// Gate for all privileged operations. Owns the session table and the
/// attempt ledger; no other component writes to either.
pub struct SessionAuthenticator {
    authorized: AuthorizedKeys,
    session_timeout: Duration,
    max_failed_attempts: u32,
    lockout_duration: Duration,
    sessions: RwLock<HashMap<Uuid, SessionRecord>>,
    ledger: RwLock<HashMap<String, AttemptBucket>>,
}

impl SessionAuthenticator {
    pub fn new(config: &AuthConfig, authorized: AuthorizedKeys) -> Self {
        if authorized.is_empty() {
            warn!("authorized key file lists no operators; every login will fail");
        }
        Self {
            authorized,
            session_timeout: Duration::seconds(config.session_timeout as i64),
            max_failed_attempts: config.max_failed_attempts.max(1),
            lockout_duration: Duration::seconds(config.lockout_duration as i64),
            sessions: RwLock::new(HashMap::new()),
            ledger: RwLock::new(HashMap::new()),
        }
    }

    /// Authenticate a presented key for a source (tty/user bucket).
    ///
    /// Locked sources are rejected before any key comparison; this ordering
    /// is load-bearing, do not move the lookup ahead of the lockout check.
    pub fn authenticate(&self, presented_key: &str, source: &str) -> Result<Session> {
        self.authenticate_at(Utc::now(), presented_key, source)
    }

    pub(crate) fn authenticate_at(
        &self,
        now: DateTime<Utc>,
        presented_key: &str,
        source: &str,
    ) -> Result<Session> {
        {
            let mut ledger = self.ledger.write();
            if let Some(bucket) = ledger.get_mut(source) {
                if let Some(locked_until) = bucket.locked_until {
                    if now < locked_until {
                        let remaining = (locked_until - now).to_std().unwrap_or_default();
                        return Err(Error::RateLimited { remaining });
                    }
                    // Lockout elapsed; the bucket returns to Normal.
                    *bucket = AttemptBucket::default();
                }
            }
        }

        let Some(operator) = self.authorized.lookup(presented_key) else {
            return Err(self.record_failure(now, source));
        };

        self.ledger.write().remove(source);

        let session = Session {
            id: Uuid::new_v4(),
            identity: operator.name.clone(),
            privilege: operator.privilege,
            created_at: now,
            expires_at: now + self.session_timeout,
        };
        self.sessions.write().insert(
            session.id,
            SessionRecord {
                session: session.clone(),
                revoked: false,
            },
        );
        info!(
            identity = %session.identity,
            privilege = %session.privilege,
            expires_at = %session.expires_at,
            "session established"
        );
        Ok(session)
    }

    fn record_failure(&self, now: DateTime<Utc>, source: &str) -> Error {
        let mut ledger = self.ledger.write();
        let bucket = ledger.entry(source.to_string()).or_default();
        bucket.failure_count += 1;
        bucket.first_failure_at.get_or_insert(now);
        if bucket.failure_count >= self.max_failed_attempts {
            bucket.locked_until = Some(now + self.lockout_duration);
            warn!(
                source,
                failures = bucket.failure_count,
                "source locked out after repeated failures"
            );
        } else {
            info!(source, failures = bucket.failure_count, "authentication failed");
        }
        Error::Authentication
    }

    /// Whether the session is currently usable. Non-mutating; callers treat
    /// an invalid session as requiring re-authentication.
    pub fn validate(&self, session: &Session) -> bool {
        self.validate_at(Utc::now(), session)
    }

    pub(crate) fn validate_at(&self, now: DateTime<Utc>, session: &Session) -> bool {
        match self.sessions.read().get(&session.id) {
            Some(record) => !record.revoked && now < record.session.expires_at,
            None => false,
        }
    }

    /// Revoke a session. Idempotent; unknown ids are a no-op.
    pub fn revoke(&self, session: &Session) {
        if let Some(record) = self.sessions.write().get_mut(&session.id) {
            if !record.revoked {
                record.revoked = true;
                info!(identity = %record.session.identity, "session revoked");
            }
        }
    }

    /// Validity plus an ordinal privilege check. An invalid session reads as
    /// an authentication failure; a valid but under-privileged one as an
    /// authorization failure; the console messages the two differently.
    pub fn require_privilege(&self, session: &Session, required: PrivilegeLevel) -> Result<()> {
        self.require_privilege_at(Utc::now(), session, required)
    }

    pub(crate) fn require_privilege_at(
        &self,
        now: DateTime<Utc>,
        session: &Session,
        required: PrivilegeLevel,
    ) -> Result<()> {
        if !self.validate_at(now, session) {
            return Err(Error::Authentication);
        }
        if session.privilege < required {
            return Err(Error::Authorization {
                required,
                held: session.privilege,
            });
        }
        Ok(())
    }

    /// Failed-attempt state for a source, for lockout-aware prompts.
    pub fn lockout_status(&self, source: &str) -> LockoutStatus {
        self.lockout_status_at(Utc::now(), source)
    }

    pub(crate) fn lockout_status_at(&self, now: DateTime<Utc>, source: &str) -> LockoutStatus {
        match self.ledger.read().get(source) {
            Some(bucket) => LockoutStatus {
                failure_count: bucket.failure_count,
                locked_remaining: bucket
                    .locked_until
                    .filter(|until| now < *until)
                    .map(|until| (until - now).to_std().unwrap_or_default()),
            },
            None => LockoutStatus::default(),
        }
    }

    /// Drop expired/revoked sessions and stale ledger buckets.
    pub fn prune(&self) {
        self.prune_at(Utc::now());
    }

    pub(crate) fn prune_at(&self, now: DateTime<Utc>) {
        self.sessions
            .write()
            .retain(|_, record| !record.revoked && now < record.session.expires_at);
        self.ledger.write().retain(|_, bucket| match bucket.locked_until {
            Some(until) => now < until,
            None => bucket.failure_count > 0,
        });
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const KEY: &str = "hunter2";
    const SOURCE: &str = "tty1";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn authenticator(max_attempts: u32, lockout_secs: u64, timeout_secs: u64) -> SessionAuthenticator {
        let config = AuthConfig {
            session_timeout: timeout_secs,
            max_failed_attempts: max_attempts,
            lockout_duration: lockout_secs,
            authorized_key_source: "/dev/null".into(),
        };
        let authorized = AuthorizedKeys {
            operators: vec![
                OperatorKey {
                    name: "kevin".into(),
                    key_sha256: fingerprint(KEY),
                    privilege: PrivilegeLevel::Admin,
                },
                OperatorKey {
                    name: "watcher".into(),
                    key_sha256: fingerprint("lookonly"),
                    privilege: PrivilegeLevel::Observer,
                },
            ],
        };
        SessionAuthenticator::new(&config, authorized)
    }

    #[test]
    fn failures_below_max_then_success_resets_bucket() {
        let auth = authenticator(3, 300, 3600);

        for t in 0..2 {
            let err = auth.authenticate_at(at(t), "wrong", SOURCE).unwrap_err();
            assert!(matches!(err, Error::Authentication));
        }
        let session = auth.authenticate_at(at(2), KEY, SOURCE).expect("login");
        assert_eq!(session.identity, "kevin");
        assert_eq!(auth.lockout_status_at(at(2), SOURCE).failure_count, 0);
    }

    #[test]
    fn lockout_engages_at_max_and_rejects_correct_key() {
        let auth = authenticator(3, 300, 3600);

        for t in 0..3 {
            let _ = auth.authenticate_at(at(t), "wrong", SOURCE);
        }

        // Correct key at t=3: still locked. The bucket locked at t=2, so
        // nearly the whole 300s window remains.
        let err = auth.authenticate_at(at(3), KEY, SOURCE).unwrap_err();
        match err {
            Error::RateLimited { remaining } => {
                assert_eq!(remaining.as_secs(), 299);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }

        // Once the lockout window has elapsed, login succeeds and the
        // session expiry is anchored at the successful attempt.
        let session = auth.authenticate_at(at(302), KEY, SOURCE).expect("login");
        assert_eq!(session.expires_at, at(302) + Duration::seconds(3600));
    }

    #[test]
    fn lockout_remaining_matches_scenario_timing() {
        // max=3, lockout=300s, failures at t=0,1,2. The bucket locks at t=2,
        // so a correct-key attempt at t=3 sees 299s remaining and one at
        // t=301 still sees the tail of the lockout.
        let auth = authenticator(3, 300, 3600);
        for t in 0..3 {
            let _ = auth.authenticate_at(at(t), "wrong", SOURCE);
        }
        assert!(matches!(
            auth.authenticate_at(at(3), KEY, SOURCE),
            Err(Error::RateLimited { .. })
        ));
        assert!(matches!(
            auth.authenticate_at(at(250), KEY, SOURCE),
            Err(Error::RateLimited { .. })
        ));
        assert!(auth.authenticate_at(at(303), KEY, SOURCE).is_ok());
    }

    #[test]
    fn buckets_are_per_source() {
        let auth = authenticator(2, 300, 3600);
        let _ = auth.authenticate_at(at(0), "wrong", "tty1");
        let _ = auth.authenticate_at(at(1), "wrong", "tty1");

        assert!(matches!(
            auth.authenticate_at(at(2), KEY, "tty1"),
            Err(Error::RateLimited { .. })
        ));
        // A different source is unaffected.
        assert!(auth.authenticate_at(at(2), KEY, "tty2").is_ok());
    }

    #[test]
    fn existing_session_survives_concurrent_lockout() {
        let auth = authenticator(2, 300, 3600);
        let session = auth.authenticate_at(at(0), KEY, "tty1").expect("login");

        let _ = auth.authenticate_at(at(1), "wrong", "tty1");
        let _ = auth.authenticate_at(at(2), "wrong", "tty1");
        assert!(matches!(
            auth.authenticate_at(at(3), KEY, "tty1"),
            Err(Error::RateLimited { .. })
        ));

        // The legitimate session keeps working while the bucket is locked.
        assert!(auth.validate_at(at(10), &session));
    }

    #[test]
    fn session_valid_iff_unexpired_and_unrevoked() {
        let auth = authenticator(3, 300, 100);
        let session = auth.authenticate_at(at(0), KEY, SOURCE).expect("login");

        assert!(auth.validate_at(at(0), &session));
        assert!(auth.validate_at(at(99), &session));
        assert!(!auth.validate_at(at(100), &session));
        assert!(!auth.validate_at(at(101), &session));
        // Validity is re-checked per call, not cached.
        assert!(auth.validate_at(at(50), &session));

        auth.revoke(&session);
        assert!(!auth.validate_at(at(50), &session));
    }

    #[test]
    fn revoke_is_idempotent_and_unknown_sessions_are_invalid() {
        let auth = authenticator(3, 300, 3600);
        let session = auth.authenticate_at(at(0), KEY, SOURCE).expect("login");

        auth.revoke(&session);
        auth.revoke(&session);
        assert!(!auth.validate_at(at(1), &session));

        let stranger = Session {
            id: Uuid::new_v4(),
            identity: "nobody".into(),
            privilege: PrivilegeLevel::Admin,
            created_at: at(0),
            expires_at: at(1000),
        };
        assert!(!auth.validate_at(at(1), &stranger));
        auth.revoke(&stranger);
    }

    #[test]
    fn require_privilege_distinguishes_authn_from_authz() {
        let auth = authenticator(3, 300, 100);
        let observer = auth
            .authenticate_at(at(0), "lookonly", SOURCE)
            .expect("login");

        assert!(auth
            .require_privilege_at(at(1), &observer, PrivilegeLevel::Observer)
            .is_ok());
        assert!(matches!(
            auth.require_privilege_at(at(1), &observer, PrivilegeLevel::Admin),
            Err(Error::Authorization {
                required: PrivilegeLevel::Admin,
                held: PrivilegeLevel::Observer,
            })
        ));
        // Expired: authentication, not authorization.
        assert!(matches!(
            auth.require_privilege_at(at(200), &observer, PrivilegeLevel::Observer),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn prune_drops_expired_sessions_and_elapsed_buckets() {
        let auth = authenticator(3, 300, 100);
        let session = auth.authenticate_at(at(0), KEY, SOURCE).expect("login");
        let _ = auth.authenticate_at(at(0), "wrong", "tty9");
        assert_eq!(auth.active_session_count(), 1);

        auth.prune_at(at(50));
        assert_eq!(auth.active_session_count(), 1);
        assert_eq!(auth.lockout_status_at(at(50), "tty9").failure_count, 1);

        auth.prune_at(at(1000));
        assert_eq!(auth.active_session_count(), 0);
        assert!(!auth.validate_at(at(1000), &session));
    }

    #[test]
    fn lockout_status_reports_remaining() {
        let auth = authenticator(2, 300, 3600);
        let _ = auth.authenticate_at(at(0), "wrong", SOURCE);
        let _ = auth.authenticate_at(at(1), "wrong", SOURCE);

        let status = auth.lockout_status_at(at(2), SOURCE);
        assert_eq!(status.failure_count, 2);
        assert_eq!(status.locked_remaining.map(|d| d.as_secs()), Some(299));

        let status = auth.lockout_status_at(at(400), SOURCE);
        assert!(status.locked_remaining.is_none());
    }
}
