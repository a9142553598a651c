//! System Health module: CPU, memory, swap, disks, uptime.
//!
//! The one built-in that does real work on every invocation. Sampling is
//! blocking, so it runs on the blocking pool rather than a runtime worker.

use std::sync::Arc;

use async_trait::async_trait;
use sysinfo::{Disks, System};

use crate::auth::PrivilegeLevel;
use crate::config::ModuleConfig;
use crate::modules::{Module, ModuleContext, ModuleFactory, ModuleReport, ModuleSpec};
use crate::registry::capability::Capability;

const SPEC: ModuleSpec = ModuleSpec {
    id: "S",
    display_name: "System Health",
    capabilities_required: &[Capability::SystemMetrics],
    min_privilege: PrivilegeLevel::Observer,
};

pub(super) fn factory() -> ModuleFactory {
    ModuleFactory {
        spec: SPEC,
        build: |config| Ok(Arc::new(SystemHealth::from_config(config))),
    }
}

pub struct SystemHealth {
    cpu_warn_percent: f32,
    memory_warn_percent: f32,
    disk_warn_percent: f32,
}

impl SystemHealth {
    fn from_config(config: &ModuleConfig) -> Self {
        Self {
            cpu_warn_percent: config.get_or("cpu_warn_percent", 90.0),
            memory_warn_percent: config.get_or("memory_warn_percent", 90.0),
            disk_warn_percent: config.get_or("disk_warn_percent", 85.0),
        }
    }
}

#[async_trait]
impl Module for SystemHealth {
    fn spec(&self) -> &ModuleSpec {
        &SPEC
    }

    async fn run(&self, _ctx: &ModuleContext) -> anyhow::Result<ModuleReport> {
        let (cpu_warn, memory_warn, disk_warn) = (
            self.cpu_warn_percent,
            self.memory_warn_percent,
            self.disk_warn_percent,
        );
        let report =
            tokio::task::spawn_blocking(move || sample(cpu_warn, memory_warn, disk_warn)).await?;
        Ok(report)
    }
}

fn sample(cpu_warn: f32, memory_warn: f32, disk_warn: f32) -> ModuleReport {
    let mut report = ModuleReport::default();

    let mut sys = System::new_all();
    // CPU usage needs two samples a short interval apart.
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    report.line(format!(
        "host      {}",
        System::host_name().unwrap_or_else(|| "unknown".into())
    ));
    report.line(format!(
        "os        {}",
        System::long_os_version().unwrap_or_else(|| "unknown".into())
    ));
    report.line(format!("uptime    {}", format_uptime(System::uptime())));

    let cpu = sys.global_cpu_usage();
    report.line(format!("cpu       {:.1}%", cpu));
    if cpu >= cpu_warn {
        report.warn(format!("cpu usage {:.1}% above {:.0}% threshold", cpu, cpu_warn));
    }

    let memory_pct = percent(sys.used_memory(), sys.total_memory());
    report.line(format!(
        "memory    {} / {} ({:.1}%)",
        format_bytes(sys.used_memory()),
        format_bytes(sys.total_memory()),
        memory_pct
    ));
    if memory_pct >= memory_warn as f64 {
        report.warn(format!(
            "memory usage {:.1}% above {:.0}% threshold",
            memory_pct, memory_warn
        ));
    }

    if sys.total_swap() > 0 {
        report.line(format!(
            "swap      {} / {}",
            format_bytes(sys.used_swap()),
            format_bytes(sys.total_swap())
        ));
    }

    for disk in Disks::new_with_refreshed_list().list() {
        let total = disk.total_space();
        if total == 0 {
            continue;
        }
        let used = total - disk.available_space();
        let used_pct = percent(used, total);
        report.line(format!(
            "disk      {}  {} / {} ({:.1}%)",
            disk.mount_point().display(),
            format_bytes(used),
            format_bytes(total),
            used_pct
        ));
        if used_pct >= disk_warn as f64 {
            report.warn(format!(
                "disk {} at {:.1}%, above {:.0}% threshold",
                disk.mount_point().display(),
                used_pct,
                disk_warn
            ));
        }
    }

    report
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
