//! CPU sampling coordinator
//!
//! A CPU percentage is only meaningful as a delta between two counter
//! reads. The coordinator takes the baseline read, suspends the calling
//! task once for the whole population, then takes the second read — total
//! wall time for N processes at interval I is ≈ I, not N×I.

use std::time::Duration;
use sysinfo::{ProcessRefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::config::SamplingConfig;

/// Clamp a requested interval into the configured safe range. Non-finite,
/// zero, or negative requests fall back to the default interval instead of
/// failing the call.
pub fn clamp_interval(requested_secs: Option<f64>, cfg: &SamplingConfig) -> Duration {
    let secs = match requested_secs {
        Some(s) if s.is_finite() && s > 0.0 => s,
        _ => cfg.default_interval_secs,
    };
    Duration::from_secs_f64(secs.clamp(cfg.min_interval_secs, cfg.max_interval_secs))
}

/// Two-phase sample: baseline refresh, one shared suspension, second
/// refresh. After this returns, `Process::cpu_usage` is the rate over
/// `interval` and global CPU/memory counters are current.
pub async fn sample(sys: &mut System, interval: Duration) {
    sys.refresh_processes_specifics(ProcessRefreshKind::everything());
    sys.refresh_cpu();
    sys.refresh_memory();

    // Below the library's minimum the second read would produce garbage
    let wait = interval.max(MINIMUM_CPU_UPDATE_INTERVAL);
    tokio::time::sleep(wait).await;

    sys.refresh_cpu();
    sys.refresh_processes_specifics(ProcessRefreshKind::new().with_cpu().with_memory());
}

/// Re-classify a literal zero CPU reading for processes that are obviously
/// live: multiple threads, many open handles, or a large resident set get
/// reported at a small positive floor instead of "perfectly idle".
pub fn effective_cpu(
    raw: f64,
    thread_count: Option<u32>,
    open_handles: Option<u32>,
    resident_bytes: u64,
    cfg: &SamplingConfig,
) -> f64 {
    if raw > 0.0 {
        return raw;
    }

    let busy_threads = thread_count.is_some_and(|t| t >= cfg.busy_thread_count);
    let busy_handles = open_handles.is_some_and(|h| h > cfg.busy_handle_count);
    let busy_resident = resident_bytes >= cfg.busy_resident_bytes;

    if busy_threads || busy_handles || busy_resident {
        cfg.activity_floor_percent
    } else {
        0.0
    }
}
