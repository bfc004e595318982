//! Host metrics for the system-info surface, via `sysinfo`.
//!
//! Values the host cannot report come back as `None` rather than failing
//! the request.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{ComponentExt, DiskExt, ProcessorExt, System, SystemExt};

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
    /// Degrees Celsius from the hottest sensor; on a Raspberry Pi this is
    /// the SoC.
    pub temperature: Option<f64>,
    pub uptime: Option<String>,
    pub platform: &'static str,
}

/// Collect a snapshot. Sleeps ~250 ms between cpu refreshes so usage is
/// measured over an interval instead of reading as zero.
pub async fn collect(data_dir: &Path) -> SystemInfo {
    let mut system = System::new();
    system.refresh_cpu();
    tokio::time::sleep(Duration::from_millis(250)).await;
    system.refresh_cpu();
    system.refresh_memory();
    system.refresh_disks_list();
    system.refresh_components_list();

    SystemInfo {
        cpu_percent: cpu_percent(&system),
        memory_percent: memory_percent(&system),
        disk_percent: disk_percent(&system, data_dir),
        temperature: temperature(&system),
        uptime: Some(format_uptime(system.uptime())),
        platform: std::env::consts::OS,
    }
}

fn cpu_percent(system: &System) -> Option<f64> {
    let usage = f64::from(system.global_processor_info().cpu_usage());
    usage.is_finite().then(|| round1(usage))
}

fn memory_percent(system: &System) -> Option<f64> {
    let total = system.total_memory();
    if total == 0 {
        return None;
    }
    let available = system.available_memory();
    Some(round1((1.0 - available as f64 / total as f64) * 100.0))
}

/// Usage of the disk holding the data directory: the mounted disk with the
/// longest mount point that is a prefix of the (canonicalized) path.
fn disk_percent(system: &System, data_dir: &Path) -> Option<f64> {
    let data_dir: PathBuf = data_dir
        .canonicalize()
        .unwrap_or_else(|_| data_dir.to_path_buf());

    let disk = system
        .disks()
        .iter()
        .filter(|disk| data_dir.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())?;

    let total = disk.total_space();
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(disk.available_space());
    Some(round1(used as f64 / total as f64 * 100.0))
}

fn temperature(system: &System) -> Option<f64> {
    let mut hottest: Option<f32> = None;
    for component in system.components() {
        let reading = component.temperature();
        if reading.is_finite() && hottest.map_or(true, |h| reading > h) {
            hottest = Some(reading);
        }
    }
    hottest.map(|t| round1(f64::from(t)))
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
