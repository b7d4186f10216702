//! filter_processes — conjunction of optional predicates over one snapshot
//!
//! Scanning stops as soon as `limit` matches are collected, so the result
//! is "first N matches in enumeration order", not "best N by any metric";
//! the collected matches are then re-sorted by CPU descending.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::collector::{sampling, Detail, ProcessRecord, Snapshot};
use crate::error::{EngineError, EngineResult};
use crate::executor::BoxedOpFuture;
use crate::schema;
use crate::OpContext;

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    /// Glob pattern matched against the process name, case-insensitive
    #[serde(default)]
    pub name_pattern: Option<String>,
    /// Exact owner name, case-insensitive
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub cpu_min: Option<f64>,
    #[serde(default)]
    pub cpu_max: Option<f64>,
    #[serde(default)]
    pub memory_min: Option<f64>,
    #[serde(default)]
    pub memory_max: Option<f64>,
    /// Exact OS state label, case-insensitive
    #[serde(default)]
    pub status: Option<String>,
    /// Substring of the command line, case-insensitive
    #[serde(default)]
    pub cmdline_contains: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub cpu_interval: Option<f64>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
pub struct FilterStats {
    /// Processes examined before the limit stopped the scan
    pub scanned: usize,
    pub filters_applied: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FilterResult {
    pub matches: Vec<ProcessRecord>,
    pub stats: FilterStats,
}

/// Compiled form of the caller's criteria. All supplied predicates are
/// ANDed; an empty criteria set matches everything.
pub(crate) struct FilterSet {
    name: Option<Regex>,
    owner: Option<String>,
    cpu_min: Option<f64>,
    cpu_max: Option<f64>,
    memory_min: Option<f64>,
    memory_max: Option<f64>,
    status: Option<String>,
    cmdline: Option<String>,
    descriptions: Vec<String>,
}

impl FilterSet {
    pub(crate) fn compile(params: &FilterParams) -> EngineResult<Self> {
        let mut descriptions = Vec::new();

        let name = match &params.name_pattern {
            Some(pattern) => {
                descriptions.push(format!("name matches '{pattern}'"));
                Some(
                    RegexBuilder::new(&glob_to_regex(pattern))
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| {
                            EngineError::InvalidArgument(format!(
                                "bad name pattern '{pattern}': {e}"
                            ))
                        })?,
                )
            }
            None => None,
        };

        let owner = params.owner.as_ref().map(|o| {
            descriptions.push(format!("owner == '{o}'"));
            o.to_lowercase()
        });
        if let Some(min) = params.cpu_min {
            descriptions.push(format!("cpu >= {min}%"));
        }
        if let Some(max) = params.cpu_max {
            descriptions.push(format!("cpu <= {max}%"));
        }
        if let Some(min) = params.memory_min {
            descriptions.push(format!("memory >= {min}%"));
        }
        if let Some(max) = params.memory_max {
            descriptions.push(format!("memory <= {max}%"));
        }
        let status = params.status.as_ref().map(|s| {
            descriptions.push(format!("status == '{s}'"));
            s.to_lowercase()
        });
        let cmdline = params.cmdline_contains.as_ref().map(|c| {
            descriptions.push(format!("cmdline contains '{c}'"));
            c.to_lowercase()
        });

        Ok(Self {
            name,
            owner,
            cpu_min: params.cpu_min,
            cpu_max: params.cpu_max,
            memory_min: params.memory_min,
            memory_max: params.memory_max,
            status,
            cmdline,
            descriptions,
        })
    }

    pub(crate) fn matches(&self, record: &ProcessRecord) -> bool {
        if let Some(re) = &self.name {
            if !re.is_match(&record.name) {
                return false;
            }
        }
        if let Some(owner) = &self.owner {
            if record.owner.to_lowercase() != *owner {
                return false;
            }
        }
        if let Some(min) = self.cpu_min {
            if record.cpu_percent < min {
                return false;
            }
        }
        if let Some(max) = self.cpu_max {
            if record.cpu_percent > max {
                return false;
            }
        }
        if let Some(min) = self.memory_min {
            if record.memory_percent < min {
                return false;
            }
        }
        if let Some(max) = self.memory_max {
            if record.memory_percent > max {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if record.status.to_lowercase() != *status {
                return false;
            }
        }
        if let Some(needle) = &self.cmdline {
            if !record.command_line.to_lowercase().contains(needle) {
                return false;
            }
        }
        true
    }

    pub(crate) fn descriptions(&self) -> &[String] {
        &self.descriptions
    }
}

/// Translate a glob (`*`, `?`) into an anchored regex, escaping everything
/// else.
pub(crate) fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

/// Scan in enumeration order, stopping at `limit` matches.
pub(crate) fn scan(
    records: &[ProcessRecord],
    filters: &FilterSet,
    limit: usize,
) -> (Vec<ProcessRecord>, usize) {
    let mut matches = Vec::new();
    let mut scanned = 0;

    for record in records {
        scanned += 1;
        if filters.matches(record) {
            matches.push(record.clone());
            if limit > 0 && matches.len() >= limit {
                break;
            }
        }
    }

    (matches, scanned)
}

pub async fn run(ctx: &OpContext, params: FilterParams) -> EngineResult<FilterResult> {
    let scfg = &ctx.config.sampling;
    let filters = FilterSet::compile(&params)?;

    let interval = sampling::clamp_interval(params.cpu_interval, scfg);
    let snapshot = Snapshot::capture(interval).await;
    let records = snapshot.records(Detail::Basic, scfg);

    let (mut matches, scanned) = scan(&records, &filters, params.limit);

    matches.sort_by(|a, b| {
        b.cpu_percent
            .partial_cmp(&a.cpu_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(FilterResult {
        matches,
        stats: FilterStats {
            scanned,
            filters_applied: filters.descriptions().to_vec(),
        },
    })
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    let params: FilterParams = schema::parse_params(input)?;
    let result = run(ctx, params).await?;
    schema::serialize_output(&result)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pid: u32, name: &str, owner: &str, cpu: f64, mem: f64, status: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.to_string(),
            command_line: format!("/usr/bin/{name} --daemon"),
            owner: owner.to_string(),
            parent_pid: Some(1),
            status: status.to_string(),
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
            rec(1, "systemd", "root", 0.1, 0.2, "sleeping"),
            rec(2, "nginx", "www-data", 4.0, 1.0, "running"),
            rec(3, "nginx-worker", "www-data", 9.0, 2.0, "running"),
            rec(4, "postgres", "postgres", 22.0, 11.0, "sleeping"),
            rec(5, "bash", "alice", 0.0, 0.1, "sleeping"),
        ]
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("nginx*"), "^nginx.*$");
        assert_eq!(glob_to_regex("a?c"), "^a.c$");
        // Regex metacharacters in the glob are escaped
        assert_eq!(glob_to_regex("a.b"), "^a\\.b$");
    }

    #[test]
    fn test_name_glob_matches_prefix() {
        let params = FilterParams {
            name_pattern: Some("nginx*".to_string()),
            ..Default::default()
        };
        let filters = FilterSet::compile(&params).unwrap();
        let (matches, _) = scan(&fixture(), &filters, 0);
        let pids: Vec<u32> = matches.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![2, 3]);
    }

    #[test]
    fn test_name_glob_is_anchored() {
        let params = FilterParams {
            name_pattern: Some("nginx".to_string()),
            ..Default::default()
        };
        let filters = FilterSet::compile(&params).unwrap();
        let (matches, _) = scan(&fixture(), &filters, 0);
        // "nginx-worker" must not match the exact glob "nginx"
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pid, 2);
    }

    #[test]
    fn test_bad_pattern_is_invalid_argument() {
        // '*' expands to '.*' so globs themselves cannot produce a bad
        // regex; force one through an oversized repetition after escape
        let params = FilterParams {
            name_pattern: Some("a".repeat(100_000)),
            ..Default::default()
        };
        // Either compiles or reports invalid_argument; must not panic
        match FilterSet::compile(&params) {
            Ok(_) => {}
            Err(e) => assert_eq!(e.kind(), "invalid_argument"),
        }
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let params = FilterParams {
            owner: Some("WWW-DATA".to_string()),
            cpu_min: Some(5.0),
            ..Default::default()
        };
        let filters = FilterSet::compile(&params).unwrap();
        let (matches, _) = scan(&fixture(), &filters, 0);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pid, 3);
    }

    #[test]
    fn test_cpu_range_is_inclusive() {
        let params = FilterParams {
            cpu_min: Some(4.0),
            cpu_max: Some(9.0),
            ..Default::default()
        };
        let filters = FilterSet::compile(&params).unwrap();
        let (matches, _) = scan(&fixture(), &filters, 0);
        let pids: Vec<u32> = matches.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![2, 3]);
    }

    #[test]
    fn test_status_and_cmdline_predicates() {
        let params = FilterParams {
            status: Some("SLEEPING".to_string()),
            cmdline_contains: Some("POSTGRES".to_string()),
            ..Default::default()
        };
        let filters = FilterSet::compile(&params).unwrap();
        let (matches, _) = scan(&fixture(), &filters, 0);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pid, 4);
    }

    #[test]
    fn test_scan_stops_early_at_limit() {
        let params = FilterParams::default();
        let filters = FilterSet::compile(&params).unwrap();
        let (matches, scanned) = scan(&fixture(), &filters, 2);
        assert_eq!(matches.len(), 2);
        assert_eq!(scanned, 2); // stopped before examining the rest
    }

    #[test]
    fn test_empty_criteria_matches_everything() {
        let params = FilterParams::default();
        let filters = FilterSet::compile(&params).unwrap();
        assert!(filters.descriptions().is_empty());
        let records = fixture();
        let (matches, scanned) = scan(&records, &filters, 0);
        assert_eq!(matches.len(), records.len());
        assert_eq!(scanned, records.len());
    }

    #[test]
    fn test_matches_are_subset_of_population() {
        let params = FilterParams {
            cpu_min: Some(1.0),
            ..Default::default()
        };
        let filters = FilterSet::compile(&params).unwrap();
        let records = fixture();
        let (matches, _) = scan(&records, &filters, 0);
        for m in &matches {
            assert!(records.iter().any(|r| r.pid == m.pid));
            assert!(filters.matches(m));
        }
    }

    #[test]
    fn test_descriptions_reflect_active_filters() {
        let params = FilterParams {
            name_pattern: Some("ng*".to_string()),
            memory_max: Some(50.0),
            ..Default::default()
        };
        let filters = FilterSet::compile(&params).unwrap();
        assert_eq!(filters.descriptions().len(), 2);
    }
}
