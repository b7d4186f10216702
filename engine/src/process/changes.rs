//! monitor_process_changes — births and deaths over an observation window
//!
//! Snapshot-to-snapshot diffing, not continuous event capture: a process
//! that starts and fully exits between two checks is invisible. Detection
//! resolution is therefore proportional to the check interval.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::debug;

use crate::error::EngineResult;
use crate::executor::BoxedOpFuture;
use crate::schema;
use crate::OpContext;

const MIN_DURATION_SECS: f64 = 1.0;
const MAX_DURATION_SECS: f64 = 300.0;
const MIN_CHECK_INTERVAL_SECS: f64 = 0.5;
const MAX_CHECK_INTERVAL_SECS: f64 = 30.0;
const CMDLINE_TRUNCATE: usize = 120;

#[derive(Debug, Deserialize)]
pub struct ChangeParams {
    #[serde(default = "default_duration")]
    pub duration_seconds: f64,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: f64,
}

fn default_duration() -> f64 {
    10.0
}

fn default_check_interval() -> f64 {
    1.0
}

/// One observed appearance or disappearance
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub timestamp: String,
    pub pid: u32,
    pub name: String,
    pub command_line: String,
}

#[derive(Debug, Serialize)]
pub struct ChangeReport {
    pub duration_seconds: f64,
    pub check_interval_seconds: f64,
    /// Snapshots taken after the initial baseline
    pub checks: usize,
    pub births: Vec<ChangeEvent>,
    pub deaths: Vec<ChangeEvent>,
    pub total_started: usize,
    pub total_terminated: usize,
}

/// Minimal per-process identity retained between snapshots
type Population = HashMap<u32, (String, String)>;

pub async fn run(_ctx: &OpContext, params: ChangeParams) -> EngineResult<ChangeReport> {
    let duration = clamp(
        params.duration_seconds,
        MIN_DURATION_SECS,
        MAX_DURATION_SECS,
    );
    let mut interval = clamp(
        params.check_interval_seconds,
        MIN_CHECK_INTERVAL_SECS,
        MAX_CHECK_INTERVAL_SECS,
    );
    if interval > duration {
        interval = duration;
    }

    let deadline = Instant::now() + Duration::from_secs_f64(duration);
    let mut sys = System::new();
    sys.refresh_processes();
    let mut previous = population(&sys);

    let mut births = Vec::new();
    let mut deaths = Vec::new();
    let mut checks = 0;

    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(Duration::from_secs_f64(interval).min(remaining)).await;

        sys.refresh_processes();
        let current = population(&sys);
        checks += 1;

        let (born, died) = diff_populations(&previous, &current);
        let now = Utc::now().to_rfc3339();

        for pid in born {
            if let Some((name, cmd)) = current.get(&pid) {
                births.push(ChangeEvent {
                    timestamp: now.clone(),
                    pid,
                    name: name.clone(),
                    command_line: cmd.clone(),
                });
            }
        }
        for pid in died {
            if let Some((name, cmd)) = previous.get(&pid) {
                deaths.push(ChangeEvent {
                    timestamp: now.clone(),
                    pid,
                    name: name.clone(),
                    command_line: cmd.clone(),
                });
            }
        }

        previous = current;
    }

    debug!(
        "change monitor finished: {} checks, {} births, {} deaths",
        checks,
        births.len(),
        deaths.len()
    );

    let total_started = births.len();
    let total_terminated = deaths.len();

    Ok(ChangeReport {
        duration_seconds: duration,
        check_interval_seconds: interval,
        checks,
        births,
        deaths,
        total_started,
        total_terminated,
    })
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    let params: ChangeParams = schema::parse_params(input)?;
    let result = run(ctx, params).await?;
    schema::serialize_output(&result)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

fn population(sys: &System) -> Population {
    sys.processes()
        .iter()
        .map(|(pid, p)| {
            (
                pid.as_u32(),
                (p.name().to_string(), truncate(&p.cmd().join(" "))),
            )
        })
        .collect()
}

fn truncate(s: &str) -> String {
    if s.len() <= CMDLINE_TRUNCATE {
        s.to_string()
    } else {
        let mut end = CMDLINE_TRUNCATE;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

/// A pid in `current` but not `previous` is a birth; the converse is a
/// death. Both lists come back pid-sorted for determinism.
pub(crate) fn diff_populations(previous: &Population, current: &Population) -> (Vec<u32>, Vec<u32>) {
    let mut born: Vec<u32> = current
        .keys()
        .filter(|pid| !previous.contains_key(pid))
        .copied()
        .collect();
    let mut died: Vec<u32> = previous
        .keys()
        .filter(|pid| !current.contains_key(pid))
        .copied()
        .collect();
    born.sort_unstable();
    died.sort_unstable();
    (born, died)
}
