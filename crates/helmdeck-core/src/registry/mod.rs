//! Module catalog lifecycle and mediated invocation.
//!
//! The registry owns the descriptor table. It is built from the module
//! factory catalog (discovery is enumeration, never runtime code loading),
//! walks each entry through dependency validation and load, and fronts every
//! invocation with session re-validation. One broken module never takes the
//! whole console down with it.

pub mod capability;
pub mod descriptor;

pub use capability::{Capability, HostCapabilities};
pub use descriptor::{ModuleDescriptor, ModuleStatus};

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::auth::{Session, SessionAuthenticator};
use crate::config::{Config, ModuleConfig};
use crate::error::{Error, Result};
use crate::modules::{Module, ModuleContext, ModuleFactory, ModuleReport};

struct Slot {
    descriptor: ModuleDescriptor,
    /// `None` for malformed catalog entries; they can never load or reload.
    factory: Option<ModuleFactory>,
    config_view: ModuleConfig,
    instance: Option<Arc<dyn Module>>,
}

/// Process-wide module table. Mutated only here; readers get snapshots.
pub struct ModuleRegistry {
    auth: Arc<SessionAuthenticator>,
    host: HostCapabilities,
    config: Arc<Config>,
    slots: RwLock<Vec<Slot>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("slots", &self.slots.read().len())
            .finish_non_exhaustive()
    }
}

impl ModuleRegistry {
    /// Scan the catalog and build the descriptor table, all entries in
    /// `Discovered` (or `Disabled`/`LoadFailed` where the entry warrants it).
    ///
    /// Malformed candidates (empty or duplicate ids, a non-table config
    /// section) are recorded as `LoadFailed` and skipped, never fatal. An
    /// empty catalog means the module source itself is broken and is the one
    /// fatal discovery failure.
    pub fn discover(
        auth: Arc<SessionAuthenticator>,
        host: HostCapabilities,
        config: Arc<Config>,
        catalog: Vec<ModuleFactory>,
    ) -> Result<Self> {
        if catalog.is_empty() {
            return Err(Error::Discovery("module catalog is empty".to_string()));
        }

        let mut slots: Vec<Slot> = Vec::with_capacity(catalog.len());
        for factory in catalog {
            let mut descriptor = ModuleDescriptor::from_spec(&factory.spec);

            if descriptor.id.trim().is_empty() {
                warn!("skipping module with empty id");
                descriptor.status = ModuleStatus::LoadFailed {
                    reason: "module id is empty".to_string(),
                };
                slots.push(Slot {
                    descriptor,
                    factory: None,
                    config_view: ModuleConfig::default(),
                    instance: None,
                });
                continue;
            }

            if slots.iter().any(|s| s.descriptor.id == descriptor.id) {
                warn!(module = %descriptor.id, "duplicate module id in catalog");
                descriptor.status = ModuleStatus::LoadFailed {
                    reason: format!("duplicate module id '{}'", descriptor.id),
                };
                slots.push(Slot {
                    descriptor,
                    factory: None,
                    config_view: ModuleConfig::default(),
                    instance: None,
                });
                continue;
            }

            let slot = Self::discovered_slot(&config, factory);
            info!(module = %slot.descriptor.id, "discovered module");
            slots.push(slot);
        }

        Ok(Self {
            auth,
            host,
            config,
            slots: RwLock::new(slots),
        })
    }

    fn discovered_slot(config: &Config, factory: ModuleFactory) -> Slot {
        let mut descriptor = ModuleDescriptor::from_spec(&factory.spec);
        match config.module_section(&descriptor.id) {
            Err(reason) => {
                descriptor.status = ModuleStatus::LoadFailed { reason };
                Slot {
                    descriptor,
                    factory: Some(factory),
                    config_view: ModuleConfig::default(),
                    instance: None,
                }
            }
            Ok(view) => {
                if !view.enabled() {
                    descriptor.status = ModuleStatus::Disabled;
                }
                Slot {
                    descriptor,
                    factory: Some(factory),
                    config_view: view,
                    instance: None,
                }
            }
        }
    }

    /// Check a module's declared capabilities against the host. Idempotent;
    /// terminal states (`Loaded`, `LoadFailed`, `Disabled`) are untouched.
    pub fn validate_dependencies(&self, id: &str) -> Result<ModuleStatus> {
        let mut slots = self.slots.write();
        let slot = find_slot_mut(&mut slots, id)?;

        if matches!(
            slot.descriptor.status,
            ModuleStatus::Discovered
                | ModuleStatus::DependenciesOk
                | ModuleStatus::DependenciesMissing { .. }
        ) {
            let missing = self.host.missing_from(&slot.descriptor.capabilities_required);
            slot.descriptor.status = if missing.is_empty() {
                ModuleStatus::DependenciesOk
            } else {
                warn!(module = id, ?missing, "module dependencies missing");
                ModuleStatus::DependenciesMissing { missing }
            };
        }
        Ok(slot.descriptor.status.clone())
    }

    /// Instantiate a validated module. A factory failure is recorded as
    /// `LoadFailed` (a status, not an error); calling `load` on an entry that
    /// has not passed validation is a caller error and is rejected without
    /// touching the factory.
    pub fn load(&self, id: &str) -> Result<ModuleStatus> {
        let mut slots = self.slots.write();
        let slot = find_slot_mut(&mut slots, id)?;

        match slot.descriptor.status {
            ModuleStatus::Loaded => return Ok(ModuleStatus::Loaded),
            ModuleStatus::DependenciesOk => {}
            ref status => {
                return Err(Error::ModuleExecution {
                    module: id.to_string(),
                    reason: format!("not in a loadable state ({})", status.label()),
                });
            }
        }

        let Some(factory) = slot.factory.as_ref() else {
            return Err(Error::ModuleExecution {
                module: id.to_string(),
                reason: "malformed catalog entry cannot be loaded".to_string(),
            });
        };
        match (factory.build)(&slot.config_view) {
            Ok(instance) => {
                slot.instance = Some(instance);
                slot.descriptor.status = ModuleStatus::Loaded;
                info!(module = id, "module loaded");
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(module = id, %reason, "module failed to load");
                slot.descriptor.status = ModuleStatus::LoadFailed { reason };
            }
        }
        Ok(slot.descriptor.status.clone())
    }

    /// Validate every discovered entry. Per-module failures are recorded in
    /// the table, never returned.
    pub fn validate_all(&self) {
        for id in self.ids() {
            let _ = self.validate_dependencies(&id);
        }
    }

    /// Load every validated entry.
    pub fn load_all(&self) {
        for id in self.ids() {
            let loadable = {
                let slots = self.slots.read();
                slots
                    .iter()
                    .find(|s| s.descriptor.id == id)
                    .is_some_and(|s| s.descriptor.status == ModuleStatus::DependenciesOk)
            };
            if loadable {
                let _ = self.load(&id);
            }
        }
    }

    /// Loaded modules this session may invoke, in discovery order.
    pub fn list_available(&self, session: &Session) -> Vec<ModuleDescriptor> {
        self.slots
            .read()
            .iter()
            .filter(|s| {
                s.descriptor.status.is_loaded() && s.descriptor.min_privilege <= session.privilege
            })
            .map(|s| s.descriptor.clone())
            .collect()
    }

    /// Snapshot of the whole table, in discovery order.
    pub fn status_table(&self) -> Vec<ModuleDescriptor> {
        self.slots
            .read()
            .iter()
            .map(|s| s.descriptor.clone())
            .collect()
    }

    /// Run a module's entry point on behalf of a session.
    ///
    /// The session is re-validated here, not trusted from login time. The
    /// entry point runs on its own task so even a panic surfaces as a
    /// recoverable module failure; the module stays `Loaded` either way.
    pub async fn invoke(&self, id: &str, session: &Session) -> Result<ModuleReport> {
        let (min_privilege, instance, ctx) = {
            let slots = self.slots.read();
            let slot = slots
                .iter()
                .find(|s| s.descriptor.id == id)
                .ok_or_else(|| unknown_module(id))?;
            (
                slot.descriptor.min_privilege,
                match (&slot.descriptor.status, &slot.instance) {
                    (ModuleStatus::Loaded, Some(instance)) => Some(instance.clone()),
                    _ => None,
                },
                ModuleContext {
                    session: session.clone(),
                    config: slot.config_view.clone(),
                },
            )
        };

        self.auth.require_privilege(session, min_privilege)?;

        let Some(instance) = instance else {
            return Err(Error::ModuleExecution {
                module: id.to_string(),
                reason: "module is not loaded".to_string(),
            });
        };

        let start = Instant::now();
        let handle = tokio::spawn(async move { instance.run(&ctx).await });
        let outcome = handle.await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(report)) => {
                info!(module = id, duration_ms, "module invocation completed");
                Ok(report)
            }
            Ok(Err(e)) => {
                let reason = format!("{e:#}");
                warn!(module = id, duration_ms, %reason, "module invocation failed");
                Err(Error::ModuleExecution {
                    module: id.to_string(),
                    reason,
                })
            }
            Err(join) => {
                let reason = if join.is_panic() {
                    "entry point panicked".to_string()
                } else {
                    "entry point task was cancelled".to_string()
                };
                warn!(module = id, duration_ms, %reason, "module invocation failed");
                Err(Error::ModuleExecution {
                    module: id.to_string(),
                    reason,
                })
            }
        }
    }

    /// Rebuild one module from its factory: reset to `Discovered`, re-run
    /// validation and load, then swap the finished slot in. Readers never
    /// observe a half-updated descriptor.
    pub fn reload(&self, id: &str) -> Result<ModuleStatus> {
        let factory = {
            let slots = self.slots.read();
            let slot = slots
                .iter()
                .find(|s| s.descriptor.id == id)
                .ok_or_else(|| unknown_module(id))?;
            slot.factory.clone().ok_or_else(|| Error::ModuleExecution {
                module: id.to_string(),
                reason: "malformed catalog entry cannot be reloaded".to_string(),
            })?
        };

        let mut replacement = Self::discovered_slot(&self.config, factory);
        self.advance(&mut replacement);
        let status = replacement.descriptor.status.clone();
        info!(module = id, status = %status.label(), "module reloaded");

        let mut slots = self.slots.write();
        if let Some(pos) = slots.iter().position(|s| s.descriptor.id == id) {
            slots[pos] = replacement;
        }
        Ok(status)
    }

    /// Walk a detached slot through validation and load.
    fn advance(&self, slot: &mut Slot) {
        if slot.descriptor.status == ModuleStatus::Discovered {
            let missing = self.host.missing_from(&slot.descriptor.capabilities_required);
            slot.descriptor.status = if missing.is_empty() {
                ModuleStatus::DependenciesOk
            } else {
                ModuleStatus::DependenciesMissing { missing }
            };
        }
        if slot.descriptor.status == ModuleStatus::DependenciesOk {
            if let Some(factory) = &slot.factory {
                match (factory.build)(&slot.config_view) {
                    Ok(instance) => {
                        slot.instance = Some(instance);
                        slot.descriptor.status = ModuleStatus::Loaded;
                    }
                    Err(e) => {
                        slot.descriptor.status = ModuleStatus::LoadFailed {
                            reason: format!("{e:#}"),
                        };
                    }
                }
            }
        }
    }

    fn ids(&self) -> Vec<String> {
        self.slots
            .read()
            .iter()
            .map(|s| s.descriptor.id.clone())
            .collect()
    }
}

fn find_slot_mut<'a>(slots: &'a mut [Slot], id: &str) -> Result<&'a mut Slot> {
    slots
        .iter_mut()
        .find(|s| s.descriptor.id == id)
        .ok_or_else(|| unknown_module(id))
}

fn unknown_module(id: &str) -> Error {
    Error::ModuleExecution {
        module: id.to_string(),
        reason: "unknown module id".to_string(),
    }
}
