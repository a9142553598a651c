//! Virtual hosts / TLS module.
//!
//! Reports the configured web domains and the state of the certificate
//! directory. Issuance and renewal stay with the ACME tooling.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::PrivilegeLevel;
use crate::config::ModuleConfig;
use crate::modules::{Module, ModuleContext, ModuleFactory, ModuleReport, ModuleSpec};
use crate::registry::capability::Capability;

const SPEC: ModuleSpec = ModuleSpec {
    id: "V",
    display_name: "VHosts & TLS",
    capabilities_required: &[Capability::DnsResolver, Capability::TlsInspection],
    min_privilege: PrivilegeLevel::Operator,
};

pub(super) fn factory() -> ModuleFactory {
    ModuleFactory {
        spec: SPEC,
        build: |_config| Ok(Arc::new(VHosts)),
    }
}

pub struct VHosts;

#[async_trait]
impl Module for VHosts {
    fn spec(&self) -> &ModuleSpec {
        &SPEC
    }

    async fn run(&self, ctx: &ModuleContext) -> anyhow::Result<ModuleReport> {
        let mut report = ModuleReport::default();

        let domains: Vec<String> = ctx.config.get_or("domains", Vec::new());
        if domains.is_empty() {
            report.warn("no vhost domains configured".to_string());
        } else {
            for domain in &domains {
                report.line(format!("vhost            {domain}"));
            }
        }

        if let Some(cert_dir) = ctx.config.get::<PathBuf>("cert_dir") {
            if cert_dir.is_dir() {
                let certs = count_certificates(&cert_dir);
                report.line(format!(
                    "cert dir         {} ({} certificates)",
                    cert_dir.display(),
                    certs
                ));
                if certs == 0 {
                    report.warn(format!("no certificates found in {}", cert_dir.display()));
                }
            } else {
                report.warn(format!("cert dir {} does not exist", cert_dir.display()));
            }
        }

        Ok(report)
    }
}

fn count_certificates(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| {
                    matches!(
                        e.path().extension().and_then(|ext| ext.to_str()),
                        Some("pem" | "crt")
                    )
                })
                .count()
        })
        .unwrap_or(0)
}
