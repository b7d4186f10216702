//! list_processes — sorted, paginated, mode-dependent process listings
//!
//! Analysis modes are additive views over the same base collection, not
//! different data sources: they select the sampling interval, which
//! optional fields are read, and which context blocks are attached.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;

use crate::collector::{sampling, Detail, ProcessRecord, Snapshot};
use crate::error::EngineResult;
use crate::executor::BoxedOpFuture;
use crate::schema;
use crate::OpContext;

/// cpu_focus drops rows at or below this sampled percentage
const CPU_FOCUS_MIN_PERCENT: f64 = 0.01;
/// Population counts in the summary use this threshold
const SUMMARY_HOT_PERCENT: f64 = 5.0;
const TOP_CONSUMER_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    Standard,
    Comprehensive,
    Snapshot,
    CpuFocus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Cpu,
    Memory,
    Pid,
    Name,
    MemoryRss,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub mode: AnalysisMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub offset: usize,
    /// Sampling interval in seconds; clamped, mode may override
    #[serde(default)]
    pub cpu_interval: Option<f64>,
    /// Bypass offset and limit entirely
    #[serde(default)]
    pub include_all: bool,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub offset: usize,
    pub returned: usize,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    /// Processes above 5% CPU
    pub high_cpu: usize,
    /// Processes above 5% memory
    pub high_memory: usize,
    /// CPU above zero or more than one thread
    pub active: usize,
}

#[derive(Debug, Serialize)]
pub struct MachineContext {
    pub cpu_percent: f64,
    pub cpu_cores: usize,
    pub load_average: [f64; 3],
}

#[derive(Debug, Serialize)]
pub struct ConsumerRef {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct TopConsumers {
    pub by_cpu: Vec<ConsumerRef>,
    pub by_memory: Vec<ConsumerRef>,
}

#[derive(Debug, Serialize)]
pub struct ListingResult {
    pub mode: AnalysisMode,
    pub records: Vec<ProcessRecord>,
    pub pagination: Pagination,
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<MachineContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_consumers: Option<TopConsumers>,
}

pub async fn run(ctx: &OpContext, params: ListParams) -> EngineResult<ListingResult> {
    let scfg = &ctx.config.sampling;

    let interval = match params.mode {
        // Responsiveness over precision
        AnalysisMode::Snapshot => Duration::from_secs_f64(scfg.snapshot_interval_secs),
        // Precision over responsiveness
        AnalysisMode::CpuFocus => sampling::clamp_interval(params.cpu_interval, scfg)
            .max(Duration::from_secs_f64(scfg.cpu_focus_min_interval_secs)),
        _ => sampling::clamp_interval(params.cpu_interval, scfg),
    };

    let detail = if params.mode == AnalysisMode::Comprehensive {
        Detail::Enriched
    } else {
        Detail::Basic
    };

    let snapshot = Snapshot::capture(interval).await;
    let mut records = snapshot.records(detail, scfg);

    if params.mode == AnalysisMode::CpuFocus {
        records.retain(|r| r.cpu_percent > CPU_FOCUS_MIN_PERCENT);
    }

    let summary = summarize(&records);
    sort_records(&mut records, params.sort_by);

    let top_consumers = (params.mode == AnalysisMode::Comprehensive).then(|| top_consumers(&records));
    let machine = (params.mode == AnalysisMode::CpuFocus).then(|| {
        let sys = snapshot.system();
        let load = sysinfo::System::load_average();
        MachineContext {
            cpu_percent: crate::collector::round2(sys.global_cpu_info().cpu_usage() as f64),
            cpu_cores: sys.cpus().len(),
            load_average: [load.one, load.five, load.fifteen],
        }
    });

    let (page, pagination) = paginate(records, params.offset, params.limit, params.include_all);

    Ok(ListingResult {
        mode: params.mode,
        records: page,
        pagination,
        summary,
        machine,
        top_consumers,
    })
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    let params: ListParams = schema::parse_params(input)?;
    let result = run(ctx, params).await?;
    schema::serialize_output(&result)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}

/// cpu/memory/memory_rss sort descending (heaviest first), pid/name ascending.
pub(crate) fn sort_records(records: &mut [ProcessRecord], sort_by: SortBy) {
    match sort_by {
        SortBy::Cpu => records.sort_by(|a, b| {
            b.cpu_percent
                .partial_cmp(&a.cpu_percent)
                .unwrap_or(Ordering::Equal)
        }),
        SortBy::Memory => records.sort_by(|a, b| {
            b.memory_percent
                .partial_cmp(&a.memory_percent)
                .unwrap_or(Ordering::Equal)
        }),
        SortBy::MemoryRss => records.sort_by(|a, b| {
            b.resident_memory_bytes.cmp(&a.resident_memory_bytes).then(
                b.memory_percent
                    .partial_cmp(&a.memory_percent)
                    .unwrap_or(Ordering::Equal),
            )
        }),
        SortBy::Pid => records.sort_by_key(|r| r.pid),
        SortBy::Name => {
            records.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        }
    }
}

/// Offset then limit, applied after sorting; limit 0 means unlimited and
/// include_all bypasses both.
pub(crate) fn paginate(
    records: Vec<ProcessRecord>,
    offset: usize,
    limit: usize,
    include_all: bool,
) -> (Vec<ProcessRecord>, Pagination) {
    let total = records.len();

    if include_all {
        return (
            records,
            Pagination {
                total,
                offset: 0,
                returned: total,
                has_more: false,
            },
        );
    }

    let start = offset.min(total);
    let end = if limit == 0 {
        total
    } else {
        (start + limit).min(total)
    };

    let page = records[start..end].to_vec();
    let returned = page.len();
    let has_more = offset + returned < total;

    (
        page,
        Pagination {
            total,
            offset,
            returned,
            has_more,
        },
    )
}

pub(crate) fn summarize(records: &[ProcessRecord]) -> Summary {
    Summary {
        high_cpu: records
            .iter()
            .filter(|r| r.cpu_percent > SUMMARY_HOT_PERCENT)
            .count(),
        high_memory: records
            .iter()
            .filter(|r| r.memory_percent > SUMMARY_HOT_PERCENT)
            .count(),
        active: records
            .iter()
            .filter(|r| r.cpu_percent > 0.0 || r.thread_count.is_some_and(|t| t > 1))
            .count(),
    }
}

/// Top-5 CPU and memory consumers, computed from the same collection as a
/// cross-reference, not separately sampled.
pub(crate) fn top_consumers(records: &[ProcessRecord]) -> TopConsumers {
    let consumer = |r: &ProcessRecord| ConsumerRef {
        pid: r.pid,
        name: r.name.clone(),
        cpu_percent: r.cpu_percent,
        memory_percent: r.memory_percent,
    };

    let mut by_cpu: Vec<&ProcessRecord> = records.iter().collect();
    by_cpu.sort_by(|a, b| {
        b.cpu_percent
            .partial_cmp(&a.cpu_percent)
            .unwrap_or(Ordering::Equal)
    });

    let mut by_memory: Vec<&ProcessRecord> = records.iter().collect();
    by_memory.sort_by(|a, b| {
        b.memory_percent
            .partial_cmp(&a.memory_percent)
            .unwrap_or(Ordering::Equal)
    });

    TopConsumers {
        by_cpu: by_cpu.iter().take(TOP_CONSUMER_COUNT).map(|r| consumer(r)).collect(),
        by_memory: by_memory
            .iter()
            .take(TOP_CONSUMER_COUNT)
            .map(|r| consumer(r))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pid: u32, name: &str, cpu: f64, mem: f64) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.to_string(),
            command_line: format!("/usr/bin/{name}"),
            owner: "root".to_string(),
            parent_pid: Some(1),
            status: "sleeping".to_string(),
            creation_time: String::new(),
            cpu_percent: cpu,
            memory_percent: mem,
            thread_count: None,
            open_handle_count: None,
            resident_memory_bytes: None,
            virtual_memory_bytes: None,
        }
    }

    fn fixture() -> Vec<ProcessRecord> {
        vec![
            rec(30, "cron", 0.0, 0.1),
            rec(10, "postgres", 12.0, 8.0),
            rec(20, "nginx", 3.0, 1.5),
            rec(40, "Backup", 7.5, 2.0),
        ]
    }

    #[test]
    fn test_sort_cpu_descending() {
        let mut records = fixture();
        sort_records(&mut records, SortBy::Cpu);
        let pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![10, 40, 20, 30]);
    }

    #[test]
    fn test_sort_pid_ascending() {
        let mut records = fixture();
        sort_records(&mut records, SortBy::Pid);
        let pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_sort_name_is_case_insensitive() {
        let mut records = fixture();
        sort_records(&mut records, SortBy::Name);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Backup", "cron", "nginx", "postgres"]);
    }

    #[test]
    fn test_sort_memory_rss_prefers_resident_bytes() {
        let mut a = rec(1, "a", 0.0, 1.0);
        a.resident_memory_bytes = Some(10);
        let mut b = rec(2, "b", 0.0, 0.5);
        b.resident_memory_bytes = Some(500);
        let mut records = vec![a, b];
        sort_records(&mut records, SortBy::MemoryRss);
        assert_eq!(records[0].pid, 2);
    }

    #[test]
    fn test_paginate_offset_then_limit() {
        let records: Vec<ProcessRecord> =
            (1..=25).map(|i| rec(i, "p", 0.0, 0.0)).collect();
        let (page, meta) = paginate(records, 10, 10, false);
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].pid, 11);
        assert_eq!(meta.total, 25);
        assert!(meta.has_more);
    }

    #[test]
    fn test_paginate_pages_are_disjoint_and_cover() {
        let mut records: Vec<ProcessRecord> =
            (1..=30).map(|i| rec(i, "p", i as f64, 0.0)).collect();
        sort_records(&mut records, SortBy::Cpu);

        let (first, _) = paginate(records.clone(), 0, 10, false);
        let (second, _) = paginate(records.clone(), 10, 10, false);
        let (all, meta) = paginate(records, 0, 0, true);

        assert!(first.iter().all(|a| second.iter().all(|b| a.pid != b.pid)));
        let concatenated: Vec<u32> = first
            .iter()
            .chain(second.iter())
            .map(|r| r.pid)
            .collect();
        let expected: Vec<u32> = all.iter().take(20).map(|r| r.pid).collect();
        assert_eq!(concatenated, expected);
        assert!(!meta.has_more);
    }

    #[test]
    fn test_paginate_limit_zero_is_unlimited() {
        let records: Vec<ProcessRecord> = (1..=7).map(|i| rec(i, "p", 0.0, 0.0)).collect();
        let (page, meta) = paginate(records, 0, 0, false);
        assert_eq!(page.len(), 7);
        assert!(!meta.has_more);
    }

    #[test]
    fn test_paginate_offset_past_end() {
        let records: Vec<ProcessRecord> = (1..=5).map(|i| rec(i, "p", 0.0, 0.0)).collect();
        let (page, meta) = paginate(records, 50, 10, false);
        assert!(page.is_empty());
        assert_eq!(meta.returned, 0);
        assert!(!meta.has_more);
    }

    #[test]
    fn test_summary_counts() {
        let mut records = fixture();
        records[0].thread_count = Some(4); // zero CPU but multi-threaded => active
        let summary = summarize(&records);
        assert_eq!(summary.high_cpu, 2); // 12.0 and 7.5
        assert_eq!(summary.high_memory, 1); // 8.0
        assert_eq!(summary.active, 4);
    }

    #[test]
    fn test_top_consumers_takes_five() {
        let records: Vec<ProcessRecord> =
            (1..=8).map(|i| rec(i, "p", i as f64, (9 - i) as f64)).collect();
        let top = top_consumers(&records);
        assert_eq!(top.by_cpu.len(), 5);
        assert_eq!(top.by_cpu[0].pid, 8);
        assert_eq!(top.by_memory[0].pid, 1);
    }

    #[test]
    fn test_mode_and_sort_parse_from_snake_case() {
        let params: ListParams =
            serde_json::from_str(r#"{"mode": "cpu_focus", "sort_by": "memory_rss"}"#).unwrap();
        assert_eq!(params.mode, AnalysisMode::CpuFocus);
        assert_eq!(params.sort_by, SortBy::MemoryRss);
        assert_eq!(params.limit, 20);
        assert!(!params.include_all);
    }
}
