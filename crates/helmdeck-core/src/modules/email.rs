//! Email Management module.
//!
//! Thin status surface over the mail stack configuration. Mailbox
//! administration itself happens against the mail stack's own API; this
//! module reports what the console is wired up to.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::PrivilegeLevel;
use crate::config::ModuleConfig;
use crate::modules::{Module, ModuleContext, ModuleFactory, ModuleReport, ModuleSpec};
use crate::registry::capability::Capability;

const SPEC: ModuleSpec = ModuleSpec {
    id: "E",
    display_name: "Email Management",
    capabilities_required: &[Capability::SmtpClient, Capability::DnsResolver],
    min_privilege: PrivilegeLevel::Admin,
};

pub(super) fn factory() -> ModuleFactory {
    ModuleFactory {
        spec: SPEC,
        build: |_config| Ok(Arc::new(EmailManagement)),
    }
}

pub struct EmailManagement;

#[async_trait]
impl Module for EmailManagement {
    fn spec(&self) -> &ModuleSpec {
        &SPEC
    }

    async fn run(&self, ctx: &ModuleContext) -> anyhow::Result<ModuleReport> {
        let mut report = ModuleReport::default();

        match ctx.config.get::<String>("admin_api_url") {
            Some(url) => report.line(format!("mail admin api   {url}")),
            None => report.warn("admin_api_url not configured; account management unavailable".to_string()),
        }

        let smtp_host = ctx.config.get_or("smtp_host", "localhost".to_string());
        let smtp_port: u16 = ctx.config.get_or("smtp_port", 25);
        report.line(format!("smtp endpoint    {smtp_host}:{smtp_port}"));

        let domains: Vec<String> = ctx.config.get_or("domains", Vec::new());
        if domains.is_empty() {
            report.warn("no mail domains configured".to_string());
        } else {
            report.line(format!("mail domains     {}", domains.join(", ")));
        }

        Ok(report)
    }
}
