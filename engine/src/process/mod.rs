//! Process operations — listing, investigation, tree, filter, change
//! monitoring, and behavior profiling.
//!
//! Each submodule exposes `pub async fn execute(ctx, input) -> Result<Vec<u8>>`
//! which deserialises JSON input, performs the operation, and returns JSON
//! output, plus a typed `run` used by the report aggregator and tests.

pub mod behavior;
pub mod changes;
pub mod filter;
pub mod investigate;
pub mod list;
pub mod tree;

use serde_json::json;

use crate::registry::{make_operation, Registry};

/// Register every process operation with the registry.
pub fn register_operations(reg: &mut Registry) {
    reg.register(make_operation(
        "list_processes",
        "Sorted, paginated process listing with standard, comprehensive, snapshot, and cpu_focus analysis modes",
        json!({
            "type": "object",
            "properties": {
                "mode": {
                    "type": "string",
                    "enum": ["standard", "comprehensive", "snapshot", "cpu_focus"]
                },
                "limit": {"type": "integer", "minimum": 0},
                "sort_by": {
                    "type": "string",
                    "enum": ["cpu", "memory", "pid", "name", "memory_rss"]
                },
                "offset": {"type": "integer", "minimum": 0},
                "cpu_interval": {"type": "number"},
                "include_all": {"type": "boolean"}
            },
            "additionalProperties": false
        }),
        true,
        30_000,
    ));

    reg.register(make_operation(
        "investigate_process",
        "Enriched detail for one process: full record, thread and handle counts, immediate children",
        json!({
            "type": "object",
            "properties": {
                "pid": {"type": "integer", "minimum": 1},
                "cpu_interval": {"type": "number"}
            },
            "required": ["pid"],
            "additionalProperties": false
        }),
        true,
        30_000,
    ));

    reg.register(make_operation(
        "get_process_tree",
        "Hierarchical parent/child process tree, bounded by depth",
        json!({
            "type": "object",
            "properties": {
                "root_pid": {"type": "integer", "minimum": 1},
                "max_depth": {"type": "integer", "minimum": 0},
                "include_threads": {"type": "boolean"}
            },
            "additionalProperties": false
        }),
        true,
        30_000,
    ));

    reg.register(make_operation(
        "filter_processes",
        "Filter the process population by name glob, owner, CPU/memory ranges, status, and command-line substring",
        json!({
            "type": "object",
            "properties": {
                "name_pattern": {"type": "string"},
                "owner": {"type": "string"},
                "cpu_min": {"type": "number"},
                "cpu_max": {"type": "number"},
                "memory_min": {"type": "number"},
                "memory_max": {"type": "number"},
                "status": {"type": "string"},
                "cmdline_contains": {"type": "string"},
                "limit": {"type": "integer", "minimum": 0},
                "cpu_interval": {"type": "number"}
            },
            "additionalProperties": false
        }),
        true,
        30_000,
    ));

    reg.register(make_operation(
        "monitor_process_changes",
        "Watch the process population over a window, reporting births and deaths between snapshots",
        json!({
            "type": "object",
            "properties": {
                "duration_seconds": {"type": "number", "minimum": 0},
                "check_interval_seconds": {"type": "number", "minimum": 0}
            },
            "additionalProperties": false
        }),
        true,
        330_000,
    ));

    reg.register(make_operation(
        "analyze_process_behavior",
        "Profile one process per-second: CPU, memory, threads, child spawns, and heuristic behavioral flags",
        json!({
            "type": "object",
            "properties": {
                "pid": {"type": "integer", "minimum": 1},
                "duration_seconds": {"type": "integer", "minimum": 0}
            },
            "required": ["pid"],
            "additionalProperties": false
        }),
        true,
        150_000,
    ));
}
