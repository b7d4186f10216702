//! get_system_status — instantaneous aggregate metrics
//!
//! Recomputed on every call; nothing is persisted between calls.

use serde::Serialize;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::collector::round2;
use crate::error::EngineResult;
use crate::executor::BoxedOpFuture;
use crate::schema;
use crate::OpContext;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub process_count: usize,
    pub monitoring_active: bool,
    pub cpu_cores: usize,
    pub load_average: [f64; 3],
    pub uptime_seconds: u64,
}

/// Collect the aggregate. Global CPU needs its own two-sample window; the
/// library minimum keeps it short.
pub async fn gather(monitoring_active: bool) -> EngineResult<SystemStatus> {
    let mut sys = System::new();
    sys.refresh_cpu();
    tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu();
    sys.refresh_memory();
    sys.refresh_processes();

    let memory_percent = if sys.total_memory() > 0 {
        round2(sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0)
    } else {
        0.0
    };

    let disks = Disks::new_with_refreshed_list();
    let entries: Vec<(String, u64, u64)> = disks
        .iter()
        .map(|d| {
            (
                d.mount_point().to_string_lossy().to_string(),
                d.total_space(),
                d.available_space(),
            )
        })
        .collect();

    let load = System::load_average();

    Ok(SystemStatus {
        cpu_percent: round2(sys.global_cpu_info().cpu_usage() as f64),
        memory_percent,
        disk_percent: disk_usage_percent(&entries),
        process_count: sys.processes().len(),
        monitoring_active,
        cpu_cores: sys.cpus().len(),
        load_average: [load.one, load.five, load.fifteen],
        uptime_seconds: System::uptime(),
    })
}

/// Usage of the root filesystem; when no root mount is visible (unusual
/// container setups), fall back to the fullest disk.
pub(crate) fn disk_usage_percent(entries: &[(String, u64, u64)]) -> f64 {
    let percent = |total: u64, available: u64| {
        if total == 0 {
            0.0
        } else {
            round2((total - available) as f64 / total as f64 * 100.0)
        }
    };

    if let Some((_, total, available)) = entries.iter().find(|(mount, _, _)| mount == "/") {
        return percent(*total, *available);
    }

    entries
        .iter()
        .map(|(_, total, available)| percent(*total, *available))
        .fold(0.0, f64::max)
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    schema::parse_input(input)?;
    let status = gather(ctx.monitor.is_active()).await?;
    schema::serialize_output(&status)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_usage_prefers_root_mount() {
        let entries = vec![
            ("/data".to_string(), 100, 10),
            ("/".to_string(), 100, 75),
        ];
        assert_eq!(disk_usage_percent(&entries), 25.0);
    }

    #[test]
    fn test_disk_usage_falls_back_to_fullest() {
        let entries = vec![
            ("/a".to_string(), 100, 80),
            ("/b".to_string(), 100, 40),
        ];
        assert_eq!(disk_usage_percent(&entries), 60.0);
    }

    #[test]
    fn test_disk_usage_empty_and_zero_sized() {
        assert_eq!(disk_usage_percent(&[]), 0.0);
        assert_eq!(disk_usage_percent(&[("/".to_string(), 0, 0)]), 0.0);
    }

    #[tokio::test]
    async fn test_gather_produces_sane_ranges() {
        let status = gather(false).await.unwrap();
        assert!(status.cpu_percent >= 0.0);
        assert!(status.memory_percent >= 0.0 && status.memory_percent <= 100.0);
        assert!(status.disk_percent >= 0.0 && status.disk_percent <= 100.0);
        assert!(status.process_count > 0);
        assert!(status.cpu_cores > 0);
        assert!(!status.monitoring_active);
    }
}
