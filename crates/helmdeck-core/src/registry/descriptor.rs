//! Catalog entry metadata and lifecycle state.

use std::collections::BTreeSet;
use std::fmt;

use crate::auth::PrivilegeLevel;
use crate::modules::ModuleSpec;
use crate::registry::capability::Capability;

/// Lifecycle state of a catalog entry. Transitions are monotonic forward;
/// only an explicit reload resets an entry to `Discovered`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    Discovered,
    DependenciesOk,
    DependenciesMissing { missing: Vec<Capability> },
    Loaded,
    LoadFailed { reason: String },
    Disabled,
}

impl ModuleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ModuleStatus::Discovered => "discovered",
            ModuleStatus::DependenciesOk => "deps-ok",
            ModuleStatus::DependenciesMissing { .. } => "deps-missing",
            ModuleStatus::Loaded => "loaded",
            ModuleStatus::LoadFailed { .. } => "load-failed",
            ModuleStatus::Disabled => "disabled",
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ModuleStatus::Loaded)
    }

    /// Detail worth showing next to the label, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            ModuleStatus::DependenciesMissing { missing } => Some(format!(
                "missing: {}",
                missing
                    .iter()
                    .map(Capability::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            ModuleStatus::LoadFailed { reason } => Some(reason.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{} ({})", self.label(), detail),
            None => f.write_str(self.label()),
        }
    }
}

/// One pluggable feature unit as the registry tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Unique short code; single letter per the menu convention.
    pub id: String,
    pub display_name: String,
    pub capabilities_required: BTreeSet<Capability>,
    pub min_privilege: PrivilegeLevel,
    pub status: ModuleStatus,
}

impl ModuleDescriptor {
    pub fn from_spec(spec: &ModuleSpec) -> Self {
        Self {
            id: spec.id.to_string(),
            display_name: spec.display_name.to_string(),
            capabilities_required: spec.capabilities_required.iter().copied().collect(),
            min_privilege: spec.min_privilege,
            status: ModuleStatus::Discovered,
        }
    }
}
