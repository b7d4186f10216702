//! analyze_process_behavior — per-second profiling of one target pid
//!
//! Samples CPU, memory, thread count, and immediate child spawns for a
//! bounded window, then derives heuristic flags from the series. The
//! flags are classifiers, not diagnoses; their thresholds come from
//! configuration.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::debug;

use crate::collector::round2;
use crate::config::BehaviorConfig;
use crate::error::{EngineError, EngineResult};
use crate::executor::BoxedOpFuture;
use crate::schema;
use crate::OpContext;

const MIN_DURATION_SECS: u64 = 1;
const MAX_DURATION_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
pub struct BehaviorParams {
    pub pid: u32,
    #[serde(default = "default_duration")]
    pub duration_seconds: u64,
}

fn default_duration() -> u64 {
    10
}

/// One per-second observation of the target
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorSample {
    pub second: u64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub resident_memory_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<u32>,
    /// Immediate children first seen at this tick
    pub new_children: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct CpuProfile {
    pub average_percent: f64,
    pub max_percent: f64,
    /// "increasing" when the final sample exceeds the first, else "stable"
    pub trend: String,
}

#[derive(Debug, Serialize)]
pub struct MemoryProfile {
    pub average_percent: f64,
    pub max_percent: f64,
    /// Last sample minus first, in percentage points
    pub growth_points: f64,
}

#[derive(Debug, Serialize)]
pub struct SpawnProfile {
    pub total_children: usize,
    pub rate_per_sample: f64,
}

#[derive(Debug, Serialize)]
pub struct BehaviorReport {
    pub pid: u32,
    pub name: String,
    pub started_at: String,
    pub requested_duration_seconds: u64,
    pub samples_taken: usize,
    /// False when the target exited mid-profile; the partial series is
    /// still returned
    pub completed: bool,
    pub samples: Vec<BehaviorSample>,
    pub cpu: CpuProfile,
    pub memory: MemoryProfile,
    pub spawn: SpawnProfile,
    pub flags: Vec<String>,
}

pub async fn run(ctx: &OpContext, params: BehaviorParams) -> EngineResult<BehaviorReport> {
    let duration = params
        .duration_seconds
        .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS);
    let pid = Pid::from_u32(params.pid);

    let mut sys = System::new();
    sys.refresh_processes();
    sys.refresh_memory();

    // NotFound before any sampling tick is spent
    let name = match sys.process(pid) {
        Some(p) => p.name().to_string(),
        None => return Err(EngineError::NotFound(params.pid)),
    };

    let started_at = Utc::now().to_rfc3339();
    let total_memory = sys.total_memory();
    let mut known_children = immediate_children(&sys, params.pid);
    let mut samples: Vec<BehaviorSample> = Vec::with_capacity(duration as usize);
    let mut spawned_total = 0usize;
    let mut completed = true;

    for second in 1..=duration {
        tokio::time::sleep(Duration::from_secs(1)).await;
        sys.refresh_processes_specifics(ProcessRefreshKind::new().with_cpu().with_memory());

        let Some(p) = sys.process(pid) else {
            // Target exited mid-profile: truncate, do not fail
            debug!("pid {} exited at tick {}, returning partial data", params.pid, second);
            completed = false;
            break;
        };

        let current_children = immediate_children(&sys, params.pid);
        let mut new_children: Vec<u32> = current_children
            .difference(&known_children)
            .copied()
            .collect();
        new_children.sort_unstable();
        spawned_total += new_children.len();
        known_children = current_children;

        let resident = p.memory();
        let memory_percent = if total_memory > 0 {
            round2(resident as f64 / total_memory as f64 * 100.0)
        } else {
            0.0
        };

        samples.push(BehaviorSample {
            second,
            cpu_percent: round2(p.cpu_usage() as f64),
            memory_percent,
            resident_memory_bytes: resident,
            thread_count: read_thread_count(params.pid),
            new_children,
        });
    }

    let (cpu, memory, spawn, flags) = summarize(&samples, spawned_total, &ctx.config.behavior);

    Ok(BehaviorReport {
        pid: params.pid,
        name,
        started_at,
        requested_duration_seconds: duration,
        samples_taken: samples.len(),
        completed,
        samples,
        cpu,
        memory,
        spawn,
        flags,
    })
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    let params: BehaviorParams = schema::parse_params(input)?;
    let result = run(ctx, params).await?;
    schema::serialize_output(&result)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}

/// Immediate (non-recursive) children of `pid`
fn immediate_children(sys: &System, pid: u32) -> HashSet<u32> {
    sys.processes()
        .values()
        .filter(|p| p.parent().map(|pp| pp.as_u32()) == Some(pid))
        .map(|p| p.pid().as_u32())
        .collect()
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

/// Post-process the collected series into profiles and threshold flags.
pub(crate) fn summarize(
    samples: &[BehaviorSample],
    spawned_total: usize,
    cfg: &BehaviorConfig,
) -> (CpuProfile, MemoryProfile, SpawnProfile, Vec<String>) {
    let count = samples.len() as f64;

    let (cpu, memory) = if samples.is_empty() {
        (
            CpuProfile {
                average_percent: 0.0,
                max_percent: 0.0,
                trend: "stable".to_string(),
            },
            MemoryProfile {
                average_percent: 0.0,
                max_percent: 0.0,
                growth_points: 0.0,
            },
        )
    } else {
        let cpu_sum: f64 = samples.iter().map(|s| s.cpu_percent).sum();
        let cpu_max = samples.iter().map(|s| s.cpu_percent).fold(0.0, f64::max);
        let first = &samples[0];
        let last = &samples[samples.len() - 1];
        let trend = if last.cpu_percent > first.cpu_percent {
            "increasing"
        } else {
            "stable"
        };

        let mem_sum: f64 = samples.iter().map(|s| s.memory_percent).sum();
        let mem_max = samples
            .iter()
            .map(|s| s.memory_percent)
            .fold(0.0, f64::max);

        (
            CpuProfile {
                average_percent: round2(cpu_sum / count),
                max_percent: cpu_max,
                trend: trend.to_string(),
            },
            MemoryProfile {
                average_percent: round2(mem_sum / count),
                max_percent: mem_max,
                growth_points: round2(last.memory_percent - first.memory_percent),
            },
        )
    };

    let spawn = SpawnProfile {
        total_children: spawned_total,
        rate_per_sample: if samples.is_empty() {
            0.0
        } else {
            round2(spawned_total as f64 / count)
        },
    };

    let mut flags = Vec::new();
    if cpu.average_percent > cfg.high_cpu_percent {
        flags.push("high_cpu_usage".to_string());
    }
    if memory.growth_points > cfg.memory_growth_points {
        flags.push("memory_leak_potential".to_string());
    }
    if spawned_total > cfg.spawned_children as usize {
        flags.push("frequent_process_spawning".to_string());
    }

    (cpu, memory, spawn, flags)
}
