//! Engine configuration loading and parsing
//!
//! All heuristic thresholds live here rather than as literals in the
//! detection logic, so sensitivity is tunable without a rebuild.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "/etc/sysmon/config.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            behavior: BehaviorConfig::default(),
            compliance: ComplianceConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

/// CPU sampling policy knobs
#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    /// Interval used when the caller does not supply one
    #[serde(default = "default_interval")]
    pub default_interval_secs: f64,
    /// Requested intervals are clamped into [min, max] rather than rejected
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: f64,
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: f64,
    /// Short interval used by snapshot mode (responsiveness over precision)
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: f64,
    /// Floor enforced by cpu_focus mode (precision over responsiveness)
    #[serde(default = "default_cpu_focus_interval")]
    pub cpu_focus_min_interval_secs: f64,
    /// Value reported instead of a literal zero for processes that look live
    #[serde(default = "default_activity_floor")]
    pub activity_floor_percent: f64,
    /// A zero-CPU process holding at least this many threads is "some activity"
    #[serde(default = "default_busy_threads")]
    pub busy_thread_count: u32,
    /// ... or more than this many open handles
    #[serde(default = "default_busy_handles")]
    pub busy_handle_count: u32,
    /// ... or at least this much resident memory
    #[serde(default = "default_busy_resident")]
    pub busy_resident_bytes: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: default_interval(),
            min_interval_secs: default_min_interval(),
            max_interval_secs: default_max_interval(),
            snapshot_interval_secs: default_snapshot_interval(),
            cpu_focus_min_interval_secs: default_cpu_focus_interval(),
            activity_floor_percent: default_activity_floor(),
            busy_thread_count: default_busy_threads(),
            busy_handle_count: default_busy_handles(),
            busy_resident_bytes: default_busy_resident(),
        }
    }
}

/// Thresholds for behavioral flags. These are heuristic classifiers, not
/// proven detectors.
#[derive(Debug, Clone, Deserialize)]
pub struct BehaviorConfig {
    /// Average CPU above this raises `high_cpu_usage`
    #[serde(default = "default_high_cpu")]
    pub high_cpu_percent: f64,
    /// Memory growth (last − first, percentage points) above this raises
    /// `memory_leak_potential`
    #[serde(default = "default_memory_growth")]
    pub memory_growth_points: f64,
    /// More children than this spawned during the window raises
    /// `frequent_process_spawning`
    #[serde(default = "default_spawned_children")]
    pub spawned_children: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            high_cpu_percent: default_high_cpu(),
            memory_growth_points: default_memory_growth(),
            spawned_children: default_spawned_children(),
        }
    }
}

/// Compliance check execution bounds
#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceConfig {
    #[serde(default = "default_check_timeout")]
    pub command_timeout_secs: u64,
    /// Check output is truncated to this many bytes in the report
    #[serde(default = "default_output_limit")]
    pub output_limit_bytes: usize,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_check_timeout(),
            output_limit_bytes: default_output_limit(),
        }
    }
}

/// Background monitoring loop cadence and report thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_cadence")]
    pub cadence_secs: u64,
    /// Wait after an internal failure before the next attempt
    #[serde(default = "default_backoff")]
    pub failure_backoff_secs: u64,
    /// Report health is "Concerning" at or above this overall CPU
    #[serde(default = "default_health_cpu")]
    pub health_cpu_percent: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            cadence_secs: default_cadence(),
            failure_backoff_secs: default_backoff(),
            health_cpu_percent: default_health_cpu(),
        }
    }
}

// Default value functions
fn default_interval() -> f64 { 1.0 }
fn default_min_interval() -> f64 { 0.1 }
fn default_max_interval() -> f64 { 5.0 }
fn default_snapshot_interval() -> f64 { 0.2 }
fn default_cpu_focus_interval() -> f64 { 2.0 }
fn default_activity_floor() -> f64 { 0.1 }
fn default_busy_threads() -> u32 { 2 }
fn default_busy_handles() -> u32 { 100 }
fn default_busy_resident() -> u64 { 100 * 1024 * 1024 }
fn default_high_cpu() -> f64 { 30.0 }
fn default_memory_growth() -> f64 { 10.0 }
fn default_spawned_children() -> u32 { 3 }
fn default_check_timeout() -> u64 { 10 }
fn default_output_limit() -> usize { 2048 }
fn default_cadence() -> u64 { 30 }
fn default_backoff() -> u64 { 60 }
fn default_health_cpu() -> f64 { 80.0 }

/// Load configuration from `SYSMON_CONFIG` or the default path, falling
/// back to defaults when no file exists.
pub fn load_config() -> Result<MonitorConfig> {
    let config_path =
        std::env::var("SYSMON_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&config_path).exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {config_path}"))?;
        let config: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {config_path}"))?;
        Ok(config)
    } else {
        tracing::warn!("Config file not found at {config_path}, using defaults");
        Ok(MonitorConfig::default())
    }
}
