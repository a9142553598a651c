//! Module contract and the built-in catalog.
//!
//! A module is a pluggable feature unit: static metadata ([`ModuleSpec`])
//! plus an entry point. Modules are instantiated by named factories, never by
//! runtime code loading; discovery is enumeration of the catalog. Entry
//! points must tolerate being rebuilt and re-invoked, because reload does
//! exactly that.

mod containers;
mod email;
mod system_health;
mod vhosts;

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{PrivilegeLevel, Session};
use crate::config::ModuleConfig;
use crate::registry::capability::Capability;

/// Static metadata a module declares about itself.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSpec {
    /// Unique short code; single letter per the menu convention.
    pub id: &'static str,
    pub display_name: &'static str,
    pub capabilities_required: &'static [Capability],
    pub min_privilege: PrivilegeLevel,
}

/// Everything an entry point receives per invocation.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    pub session: Session,
    pub config: ModuleConfig,
}

/// Structured output relayed back to the display layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleReport {
    pub lines: Vec<String>,
    pub warnings: Vec<String>,
}

impl ModuleReport {
    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[async_trait]
pub trait Module: Send + Sync {
    fn spec(&self) -> &ModuleSpec;

    /// Run the module. Errors are caught at the registry boundary and never
    /// reach the interactive loop as anything but a module-level failure.
    async fn run(&self, ctx: &ModuleContext) -> anyhow::Result<ModuleReport>;
}

/// A named constructor the registry can re-run on reload.
#[derive(Clone)]
pub struct ModuleFactory {
    pub spec: ModuleSpec,
    pub build: fn(&ModuleConfig) -> anyhow::Result<Arc<dyn Module>>,
}

/// The built-in catalog, in menu order.
pub fn builtin_catalog() -> Vec<ModuleFactory> {
    vec![
        email::factory(),
        containers::factory(),
        vhosts::factory(),
        system_health::factory(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_unique_menu_ids() {
        let catalog = builtin_catalog();
        let ids: Vec<_> = catalog.iter().map(|f| f.spec.id).collect();
        assert_eq!(ids, vec!["E", "P", "V", "S"]);

        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
    }

    #[test]
    fn health_is_the_least_privileged_entry() {
        let catalog = builtin_catalog();
        let health = catalog.iter().find(|f| f.spec.id == "S").expect("health");
        assert_eq!(health.spec.min_privilege, PrivilegeLevel::Observer);
    }
}
