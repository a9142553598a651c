//! Host capability model.
//!
//! Modules declare the capabilities they need; the registry checks the
//! declaration against what the host actually provides before a module is
//! allowed to load. The set is closed: one capability per external surface
//! the stack touches.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A named precondition a module requires from its host environment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Docker engine reachable (socket or CLI).
    DockerApi,
    /// Host can resolve names (stub resolver configured).
    DnsResolver,
    /// Outbound SMTP is possible from this process.
    SmtpClient,
    /// CPU/memory/disk sampling is available.
    SystemMetrics,
    /// Certificate inspection tooling present.
    TlsInspection,
}

impl Capability {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::DockerApi => "docker-api",
            Capability::DnsResolver => "dns-resolver",
            Capability::SmtpClient => "smtp-client",
            Capability::SystemMetrics => "system-metrics",
            Capability::TlsInspection => "tls-inspection",
        }
    }

    pub const fn all() -> [Capability; 5] {
        [
            Capability::DockerApi,
            Capability::DnsResolver,
            Capability::SmtpClient,
            Capability::SystemMetrics,
            Capability::TlsInspection,
        ]
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of capabilities the host environment reports as available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostCapabilities {
    available: BTreeSet<Capability>,
}

impl HostCapabilities {
    /// Probe the live host. Probes are cheap existence checks only, never
    /// network calls.
    pub fn detect() -> Self {
        let mut available = BTreeSet::new();

        if Path::new("/var/run/docker.sock").exists() || which::which("docker").is_ok() {
            available.insert(Capability::DockerApi);
        }
        if Path::new("/etc/resolv.conf").exists() {
            available.insert(Capability::DnsResolver);
        }
        if which::which("openssl").is_ok() {
            available.insert(Capability::TlsInspection);
        }
        // Compiled into the binary; always present.
        available.insert(Capability::SmtpClient);
        available.insert(Capability::SystemMetrics);

        Self { available }
    }

    /// Build an explicit set (tests, constrained deployments).
    pub fn with(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            available: capabilities.into_iter().collect(),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.available.contains(&capability)
    }

    /// The required capabilities this host does not provide, in stable order.
    pub fn missing_from(&self, required: &BTreeSet<Capability>) -> Vec<Capability> {
        required
            .iter()
            .copied()
            .filter(|c| !self.available.contains(c))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.available.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_from_reports_only_absent_capabilities() {
        let host = HostCapabilities::with([Capability::DnsResolver, Capability::SystemMetrics]);
        let required: BTreeSet<_> = [
            Capability::DockerApi,
            Capability::DnsResolver,
            Capability::TlsInspection,
        ]
        .into_iter()
        .collect();

        assert_eq!(
            host.missing_from(&required),
            vec![Capability::DockerApi, Capability::TlsInspection]
        );
    }

    #[test]
    fn kebab_case_names_round_trip() {
        for capability in Capability::all() {
            let encoded = toml::Value::try_from(capability).expect("encode");
            assert_eq!(encoded.as_str(), Some(capability.as_str()));
            let decoded: Capability = encoded.try_into().expect("decode");
            assert_eq!(decoded, capability);
        }
    }

    #[test]
    fn detect_reports_compiled_in_capabilities() {
        let host = HostCapabilities::detect();
        assert!(host.supports(Capability::SystemMetrics));
        assert!(host.supports(Capability::SmtpClient));
    }
}
