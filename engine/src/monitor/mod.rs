//! System-level operations — status, report composition, and the
//! background monitoring lifecycle.

pub mod report;
pub mod status;
pub mod watch;

use serde_json::json;

use crate::registry::{make_operation, Registry};

/// Register every system-level operation with the registry.
pub fn register_operations(reg: &mut Registry) {
    reg.register(make_operation(
        "get_system_status",
        "Instantaneous aggregate metrics: CPU, memory, disk, process count, monitoring state",
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
        true,
        30_000,
    ));

    reg.register(make_operation(
        "generate_system_report",
        "Composed system report: process listing, compliance score, and health assessment",
        json!({
            "type": "object",
            "properties": {
                "report_type": {"type": "string", "enum": ["summary", "detailed"]}
            },
            "additionalProperties": false
        }),
        true,
        150_000,
    ));

    reg.register(make_operation(
        "start_system_monitoring",
        "Start the background monitoring loop",
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
        false,
        5_000,
    ));

    reg.register(make_operation(
        "stop_system_monitoring",
        "Stop the background monitoring loop",
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
        false,
        5_000,
    ));
}
