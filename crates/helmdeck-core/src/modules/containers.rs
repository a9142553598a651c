//! Container stack module.
//!
//! Reports how the console reaches the Docker engine and the container
//! management UI. Orchestration itself stays with the engine.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::PrivilegeLevel;
use crate::config::ModuleConfig;
use crate::modules::{Module, ModuleContext, ModuleFactory, ModuleReport, ModuleSpec};
use crate::registry::capability::Capability;

const SPEC: ModuleSpec = ModuleSpec {
    id: "P",
    display_name: "Containers",
    capabilities_required: &[Capability::DockerApi],
    min_privilege: PrivilegeLevel::Operator,
};

const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

pub(super) fn factory() -> ModuleFactory {
    ModuleFactory {
        spec: SPEC,
        build: |config| {
            Ok(Arc::new(Containers {
                socket: config
                    .get::<PathBuf>("docker_socket")
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCKER_SOCKET)),
            }))
        },
    }
}

pub struct Containers {
    socket: PathBuf,
}

#[async_trait]
impl Module for Containers {
    fn spec(&self) -> &ModuleSpec {
        &SPEC
    }

    async fn run(&self, ctx: &ModuleContext) -> anyhow::Result<ModuleReport> {
        let mut report = ModuleReport::default();

        report.line(format!("docker socket    {}", self.socket.display()));
        if !self.socket.exists() {
            report.warn(format!(
                "docker socket {} not present; engine unreachable",
                self.socket.display()
            ));
        }

        match ctx.config.get::<String>("management_url") {
            Some(url) => report.line(format!("management ui    {url}")),
            None => report.line("management ui    not configured".to_string()),
        }

        Ok(report)
    }
}
