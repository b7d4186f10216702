//! Compliance check execution
//!
//! Verification commands run under a hard timeout and, on Linux, rlimits,
//! so a wedged check can never block the caller indefinitely. A timeout or
//! spawn failure is an `error` status — counted as failed for scoring,
//! reported separately.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

use crate::compliance::catalog::ControlSpec;

const MAX_OPEN_FILES: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Error,
}

/// One executed control with its classification
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceCheck {
    pub id: String,
    pub title: String,
    pub command: String,
    pub expected: String,
    pub status: CheckStatus,
    pub output: String,
    pub timestamp: String,
}

/// How a verification command ended
#[derive(Debug)]
pub(crate) enum CommandOutcome {
    Completed { exit_code: i32, output: String },
    TimedOut(Duration),
    Failed(String),
}

/// Run one control to a classified check.
pub async fn run_check(spec: &ControlSpec, timeout: Duration, output_limit: usize) -> ComplianceCheck {
    let outcome = match execute_command(spec.command, timeout).await {
        Ok(outcome) => outcome,
        Err(e) => CommandOutcome::Failed(e.to_string()),
    };
    classify(spec, outcome, output_limit)
}

/// Exit 0 ⇒ pass, nonzero ⇒ fail, timeout or execution failure ⇒ error.
pub(crate) fn classify(
    spec: &ControlSpec,
    outcome: CommandOutcome,
    output_limit: usize,
) -> ComplianceCheck {
    let (status, output) = match outcome {
        CommandOutcome::Completed { exit_code: 0, output } => (CheckStatus::Pass, output),
        CommandOutcome::Completed { exit_code, output } => (
            CheckStatus::Fail,
            if output.is_empty() {
                format!("exit code {exit_code}")
            } else {
                output
            },
        ),
        CommandOutcome::TimedOut(bound) => {
            warn!("check {} timed out after {:?}", spec.id, bound);
            (
                CheckStatus::Error,
                format!("timed out after {}s", bound.as_secs()),
            )
        }
        CommandOutcome::Failed(message) => {
            warn!("check {} failed to execute: {}", spec.id, message);
            (CheckStatus::Error, message)
        }
    };

    ComplianceCheck {
        id: spec.id.to_string(),
        title: spec.title.to_string(),
        command: spec.command.to_string(),
        expected: spec.expected.to_string(),
        status,
        output: truncate(&output, output_limit),
        timestamp: Utc::now().to_rfc3339(),
    }
}

async fn execute_command(command: &str, timeout: Duration) -> Result<CommandOutcome> {
    use tokio::process::Command;

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    #[cfg(target_os = "linux")]
    {
        use std::os::unix::process::CommandExt;
        let cpu_secs = timeout.as_secs().max(1);
        unsafe {
            cmd.as_std_mut().pre_exec(move || {
                let cpu_limit = libc::rlimit {
                    rlim_cur: cpu_secs,
                    rlim_max: cpu_secs,
                };
                libc::setrlimit(libc::RLIMIT_CPU, &cpu_limit);

                let fd_limit = libc::rlimit {
                    rlim_cur: MAX_OPEN_FILES,
                    rlim_max: MAX_OPEN_FILES,
                };
                libc::setrlimit(libc::RLIMIT_NOFILE, &fd_limit);

                Ok(())
            });
        }
    }

    let child = cmd.spawn().context("Failed to spawn verification command")?;

    let result = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => return Ok(CommandOutcome::TimedOut(timeout)),
        Ok(r) => r.context("Failed to wait for verification command")?,
    };

    let mut output = String::from_utf8_lossy(&result.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&result.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(stderr);
    }

    Ok(CommandOutcome::Completed {
        exit_code: result.status.code().unwrap_or(-1),
        output,
    })
}

/// Aggregate score: 100 × passed / total, rounded to 2 decimals. Checks in
/// `error` state are part of `total`, so they weigh as failures.
pub fn score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (100.0 * passed as f64 / total as f64 * 100.0).round() / 100.0
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
