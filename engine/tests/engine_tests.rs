//! Integration tests for the monitoring engine
//!
//! These exercise the full dispatch pipeline against the live system:
//! registry lookup, schema validation, handler execution, and the
//! structured response envelope.

use std::time::{Duration, Instant};

use sysmon_engine::Engine;

fn output(response: &sysmon_engine::OperationResponse) -> &serde_json::Value {
    assert!(
        response.success,
        "operation failed: {:?} ({:?})",
        response.error, response.error_kind
    );
    response.output.as_ref().expect("successful response carries output")
}

#[tokio::test]
async fn test_snapshot_listing_returns_bounded_page() {
    let engine = Engine::default();
    let response = engine
        .execute(
            "list_processes",
            br#"{"mode": "snapshot", "limit": 5, "sort_by": "cpu"}"#,
        )
        .await;

    let out = output(&response);
    let records = out["records"].as_array().unwrap();
    assert!(records.len() <= 5);

    let pagination = &out["pagination"];
    assert_eq!(pagination["returned"].as_u64().unwrap() as usize, records.len());
    assert!(pagination["total"].as_u64().unwrap() >= pagination["returned"].as_u64().unwrap());

    // CPU sort is descending
    let cpus: Vec<f64> = records
        .iter()
        .map(|r| r["cpu_percent"].as_f64().unwrap())
        .collect();
    assert!(cpus.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_include_all_bypasses_pagination() {
    let engine = Engine::default();
    let response = engine
        .execute("list_processes", br#"{"include_all": true, "limit": 3}"#)
        .await;

    let out = output(&response);
    let pagination = &out["pagination"];
    assert_eq!(
        pagination["returned"].as_u64().unwrap(),
        pagination["total"].as_u64().unwrap()
    );
    assert_eq!(pagination["has_more"].as_bool().unwrap(), false);
    assert!(out["records"].as_array().unwrap().len() > 3);
}

#[tokio::test]
async fn test_longer_sampling_interval_is_not_faster() {
    let engine = Engine::default();

    let started = Instant::now();
    let response = engine
        .execute("list_processes", br#"{"mode": "snapshot", "limit": 1}"#)
        .await;
    assert!(response.success);
    let short = started.elapsed();

    let started = Instant::now();
    let response = engine
        .execute(
            "list_processes",
            br#"{"cpu_interval": 1.5, "limit": 1}"#,
        )
        .await;
    assert!(response.success);
    let long = started.elapsed();

    assert!(long >= Duration::from_millis(1500));
    assert!(long >= short);
}

#[tokio::test]
async fn test_comprehensive_mode_attaches_top_consumers() {
    let engine = Engine::default();
    let response = engine
        .execute(
            "list_processes",
            br#"{"mode": "comprehensive", "limit": 5, "cpu_interval": 0.2}"#,
        )
        .await;

    let out = output(&response);
    let top = &out["top_consumers"];
    assert!(top["by_cpu"].as_array().unwrap().len() <= 5);
    assert!(top["by_memory"].as_array().unwrap().len() <= 5);
    // Enriched records carry resident memory
    let records = out["records"].as_array().unwrap();
    assert!(records.iter().any(|r| r.get("resident_memory_bytes").is_some()));
}

#[tokio::test]
async fn test_cpu_focus_mode_attaches_machine_context() {
    let engine = Engine::default();
    let response = engine
        .execute("list_processes", br#"{"mode": "cpu_focus", "limit": 10}"#)
        .await;

    let out = output(&response);
    let machine = &out["machine"];
    assert!(machine["cpu_cores"].as_u64().unwrap() > 0);
    assert_eq!(machine["load_average"].as_array().unwrap().len(), 3);
    // Idle rows are dropped in this mode
    for record in out["records"].as_array().unwrap() {
        assert!(record["cpu_percent"].as_f64().unwrap() > 0.01);
    }
}

#[tokio::test]
async fn test_investigate_own_process() {
    let engine = Engine::default();
    let input = format!(r#"{{"pid": {}, "cpu_interval": 0.2}}"#, std::process::id());
    let response = engine.execute("investigate_process", input.as_bytes()).await;

    let out = output(&response);
    assert_eq!(
        out["process"]["pid"].as_u64().unwrap(),
        std::process::id() as u64
    );
    assert!(out["process"]["resident_memory_bytes"].as_u64().is_some());
}

#[tokio::test]
async fn test_process_tree_depth_zero_has_no_children() {
    let engine = Engine::default();
    let response = engine
        .execute("get_process_tree", br#"{"max_depth": 0}"#)
        .await;

    let out = output(&response);
    let roots = out["roots"].as_array().unwrap();
    assert!(!roots.is_empty());
    for root in roots {
        assert_eq!(root["depth"].as_u64().unwrap(), 0);
        assert!(root["children"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_process_tree_rooted_at_self() {
    let engine = Engine::default();
    let input = format!(r#"{{"root_pid": {}, "max_depth": 2}}"#, std::process::id());
    let response = engine.execute("get_process_tree", input.as_bytes()).await;

    let out = output(&response);
    let roots = out["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(
        roots[0]["pid"].as_u64().unwrap(),
        std::process::id() as u64
    );
}

#[tokio::test]
async fn test_filter_reports_scan_stats() {
    let engine = Engine::default();
    let response = engine
        .execute(
            "filter_processes",
            br#"{"cpu_min": 0.0, "limit": 10, "cpu_interval": 0.2}"#,
        )
        .await;

    let out = output(&response);
    let matches = out["matches"].as_array().unwrap();
    assert!(matches.len() <= 10);
    let stats = &out["stats"];
    assert!(stats["scanned"].as_u64().unwrap() as usize >= matches.len());
    assert_eq!(stats["filters_applied"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_change_monitor_short_window() {
    let engine = Engine::default();
    let response = engine
        .execute(
            "monitor_process_changes",
            br#"{"duration_seconds": 1, "check_interval_seconds": 0.5}"#,
        )
        .await;

    let out = output(&response);
    assert!(out["checks"].as_u64().unwrap() >= 1);
    assert_eq!(
        out["total_started"].as_u64().unwrap() as usize,
        out["births"].as_array().unwrap().len()
    );
    assert_eq!(
        out["total_terminated"].as_u64().unwrap() as usize,
        out["deaths"].as_array().unwrap().len()
    );
}

#[tokio::test]
async fn test_behavior_profile_of_nonexistent_pid() {
    let engine = Engine::default();
    let input = format!(r#"{{"pid": {}, "duration_seconds": 5}}"#, u32::MAX - 99);

    let started = Instant::now();
    let response = engine
        .execute("analyze_process_behavior", input.as_bytes())
        .await;

    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("not_found"));
    // The failure is pre-sampling: no observation window was spent
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_behavior_profile_own_process() {
    let engine = Engine::default();
    let input = format!(
        r#"{{"pid": {}, "duration_seconds": 1}}"#,
        std::process::id()
    );
    let response = engine
        .execute("analyze_process_behavior", input.as_bytes())
        .await;

    let out = output(&response);
    assert_eq!(out["pid"].as_u64().unwrap(), std::process::id() as u64);
    assert!(out["samples_taken"].as_u64().unwrap() <= 1);
    assert!(out["cpu"]["average_percent"].as_f64().is_some());
    assert!(out["flags"].as_array().is_some());
}

#[tokio::test]
async fn test_compliance_report_shape() {
    let engine = Engine::default();
    let response = engine
        .execute("check_cis_compliance", br#"{"benchmark_type": "all"}"#)
        .await;

    let out = output(&response);
    let score = out["score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));
    assert!(out["checks"].as_array().unwrap().len() <= 10);
    assert!(out["top_failures"].as_array().unwrap().len() <= 5);

    let total = out["total_checks"].as_u64().unwrap();
    let accounted = out["passed"].as_u64().unwrap()
        + out["failed"].as_u64().unwrap()
        + out["errors"].as_u64().unwrap();
    assert_eq!(total, accounted);
}

#[tokio::test]
async fn test_compliance_include_all_returns_everything() {
    let engine = Engine::default();
    let response = engine
        .execute(
            "check_cis_compliance",
            br#"{"benchmark_type": "all", "include_all": true}"#,
        )
        .await;

    let out = output(&response);
    assert_eq!(
        out["checks"].as_array().unwrap().len() as u64,
        out["total_checks"].as_u64().unwrap()
    );
}

#[tokio::test]
async fn test_system_status_reflects_monitoring_flag() {
    let engine = Engine::default();

    let response = engine.execute("get_system_status", b"").await;
    let out = output(&response);
    assert_eq!(out["monitoring_active"].as_bool().unwrap(), false);
    assert!(out["process_count"].as_u64().unwrap() > 0);

    engine.execute("start_system_monitoring", b"").await;
    let response = engine.execute("get_system_status", b"").await;
    let out = output(&response);
    assert_eq!(out["monitoring_active"].as_bool().unwrap(), true);

    engine.execute("stop_system_monitoring", b"").await;
    let response = engine.execute("get_system_status", b"").await;
    let out = output(&response);
    assert_eq!(out["monitoring_active"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn test_summary_report_composes_subsystems() {
    let engine = Engine::default();
    let response = engine.execute("generate_system_report", b"").await;

    let out = output(&response);
    let health = out["health"].as_str().unwrap();
    assert!(health == "Good" || health == "Concerning");
    assert!(out["system"]["cpu_cores"].as_u64().unwrap() > 0);
    assert!(out["top_processes"].as_array().unwrap().len() <= 5);
    assert!(out["compliance"]["total_checks"].as_u64().unwrap() > 0);
    // Summary reports omit the embedded sub-results
    assert!(out.get("details").is_none());
}

#[tokio::test]
async fn test_detailed_report_embeds_sub_results() {
    let engine = Engine::default();
    let response = engine
        .execute("generate_system_report", br#"{"report_type": "detailed"}"#)
        .await;

    let out = output(&response);
    let details = &out["details"];
    assert!(details["listing"]["records"].as_array().is_some());
    assert!(details["compliance"]["checks"].as_array().is_some());
}

#[tokio::test]
async fn test_response_envelope_carries_invocation_metadata() {
    let engine = Engine::default();
    let response = engine.execute("get_system_status", b"").await;
    assert!(!response.invocation_id.is_empty());
    assert!(response.duration_ms >= 0);
}
