//! Process snapshot collector
//!
//! One [`Snapshot`] is one synchronous enumeration of every process
//! visible at the caller's privilege level, with per-process CPU rates
//! derived by the sampling coordinator. Records are value objects owned by
//! the operation that captured them; nothing here survives the call.
//!
//! Per-process reads are best-effort: a process that disappears mid-walk
//! or denies access yields `None` and is skipped, never an error.

pub mod sampling;

use chrono::DateTime;
use serde::Serialize;
use std::time::Duration;
use sysinfo::{Pid, Process, ProcessStatus, System, Users};

use crate::config::SamplingConfig;

/// One process's attributes at the sampling instant.
///
/// `cpu_percent` is a rate over the snapshot's sampling window, not an
/// instantaneous value; the same process sampled with a different interval
/// yields a different, equally valid number.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    /// Joined argument vector; empty when the OS denies visibility
    pub command_line: String,
    pub owner: String,
    pub parent_pid: Option<u32>,
    pub status: String,
    pub creation_time: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_handle_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_memory_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_memory_bytes: Option<u64>,
}

/// Which optional fields to read per process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    Basic,
    Enriched,
}

/// A captured process population with resolved user names.
pub struct Snapshot {
    sys: System,
    users: Users,
}

impl Snapshot {
    /// Enumerate all processes, deriving CPU rates over `interval`.
    /// The interval is one shared suspension across the whole capture:
    /// total wall time is ≈ `interval` regardless of process count.
    pub async fn capture(interval: Duration) -> Self {
        let mut sys = System::new();
        sampling::sample(&mut sys, interval).await;
        let users = Users::new_with_refreshed_list();
        Self { sys, users }
    }

    pub fn system(&self) -> &System {
        &self.sys
    }

    pub fn process_count(&self) -> usize {
        self.sys.processes().len()
    }

    /// Build records for the whole population, in enumeration order
    /// (unspecified and not stable; consumers re-sort).
    pub fn records(&self, detail: Detail, cfg: &SamplingConfig) -> Vec<ProcessRecord> {
        self.sys
            .processes()
            .values()
            .filter_map(|p| self.build_record(p, detail, cfg))
            .collect()
    }

    /// Build the record for one pid, if it is still present.
    pub fn record(&self, pid: u32, detail: Detail, cfg: &SamplingConfig) -> Option<ProcessRecord> {
        self.sys
            .process(Pid::from_u32(pid))
            .and_then(|p| self.build_record(p, detail, cfg))
    }

    fn build_record(
        &self,
        p: &Process,
        detail: Detail,
        cfg: &SamplingConfig,
    ) -> Option<ProcessRecord> {
        let pid = p.pid().as_u32();
        if pid == 0 {
            // Kernel idle placeholder on some platforms, not a real process
            return None;
        }

        let resident = p.memory();
        let raw_cpu = p.cpu_usage() as f64;

        // The activity heuristic needs thread/handle data even in basic
        // detail, but only for processes reading a literal zero.
        let (thread_count, open_handle_count) = if detail == Detail::Enriched || raw_cpu == 0.0 {
            (read_thread_count(pid), read_open_handle_count(pid))
        } else {
            (None, None)
        };

        let cpu_percent = round2(sampling::effective_cpu(
            raw_cpu,
            thread_count,
            open_handle_count,
            resident,
            cfg,
        ));

        let total_memory = self.sys.total_memory();
        let memory_percent = if total_memory > 0 {
            round2(resident as f64 / total_memory as f64 * 100.0)
        } else {
            0.0
        };

        let owner = p
            .user_id()
            .and_then(|uid| self.users.get_user_by_id(uid))
            .map(|u| u.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let creation_time = DateTime::from_timestamp(p.start_time() as i64, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();

        let mut record = ProcessRecord {
            pid,
            name: p.name().to_string(),
            command_line: p.cmd().join(" "),
            owner,
            parent_pid: p.parent().map(|pp| pp.as_u32()),
            status: status_label(p.status()),
            creation_time,
            cpu_percent,
            memory_percent,
            thread_count: None,
            open_handle_count: None,
            resident_memory_bytes: None,
            virtual_memory_bytes: None,
        };

        if detail == Detail::Enriched {
            record.thread_count = thread_count;
            record.open_handle_count = open_handle_count;
            record.resident_memory_bytes = Some(resident);
            record.virtual_memory_bytes = Some(p.virtual_memory());
        }

        Some(record)
    }
}

/// Map the OS process state to a lowercase label
fn status_label(status: ProcessStatus) -> String {
    match status {
        ProcessStatus::Run => "running".to_string(),
        ProcessStatus::Sleep => "sleeping".to_string(),
        ProcessStatus::Idle => "idle".to_string(),
        ProcessStatus::Stop => "stopped".to_string(),
        ProcessStatus::Zombie => "zombie".to_string(),
        ProcessStatus::Tracing => "tracing".to_string(),
        ProcessStatus::Dead => "dead".to_string(),
        ProcessStatus::Parked => "parked".to_string(),
        ProcessStatus::Waking => "waking".to_string(),
        ProcessStatus::Wakekill => "wakekill".to_string(),
        ProcessStatus::LockBlocked => "lock_blocked".to_string(),
        ProcessStatus::UninterruptibleDiskSleep => "uninterruptible".to_string(),
        other => other.to_string().to_lowercase(),
    }
}

#[cfg(target_os = "linux")]
fn read_thread_count(pid: u32) -> Option<u32> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    status
        .lines()
        .find(|l| l.starts_with("Threads:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
}

#[cfg(not(target_os = "linux"))]
fn read_thread_count(_pid: u32) -> Option<u32> {
    None
}

#[cfg(target_os = "linux")]
fn read_open_handle_count(pid: u32) -> Option<u32> {
    std::fs::read_dir(format!("/proc/{pid}/fd"))
        .ok()
        .map(|entries| entries.count() as u32)
}

#[cfg(not(target_os = "linux"))]
fn read_open_handle_count(_pid: u32) -> Option<u32> {
    None
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(0.004), 0.0);
        assert_eq!(round2(99.999), 100.0);
    }

    #[tokio::test]
    async fn test_capture_sees_own_process() {
        let cfg = SamplingConfig::default();
        let snapshot = Snapshot::capture(Duration::from_millis(200)).await;
        let me = std::process::id();

        let record = snapshot.record(me, Detail::Enriched, &cfg);
        assert!(record.is_some(), "own pid must be visible");
        let record = record.unwrap();
        assert_eq!(record.pid, me);
        assert!(!record.name.is_empty());
        assert!(record.resident_memory_bytes.is_some());
    }

    #[tokio::test]
    async fn test_records_skip_nothing_visible() {
        let cfg = SamplingConfig::default();
        let snapshot = Snapshot::capture(Duration::from_millis(150)).await;
        let records = snapshot.records(Detail::Basic, &cfg);
        assert_eq!(records.len(), snapshot.records(Detail::Basic, &cfg).len());
        assert!(!records.is_empty());
        // Basic detail leaves enrichment fields unset
        assert!(records.iter().all(|r| r.resident_memory_bytes.is_none()));
    }

    #[tokio::test]
    async fn test_record_for_missing_pid_is_none() {
        let cfg = SamplingConfig::default();
        let snapshot = Snapshot::capture(Duration::from_millis(150)).await;
        assert!(snapshot.record(u32::MAX - 1, Detail::Basic, &cfg).is_none());
    }
}
