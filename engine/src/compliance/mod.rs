//! check_cis_compliance — score the host against the hardening catalog

pub mod catalog;
pub mod runner;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::error::EngineResult;
use crate::executor::BoxedOpFuture;
use crate::registry::{make_operation, Registry};
use crate::schema;
use crate::OpContext;

pub use catalog::{BenchmarkLevel, ControlSpec};
pub use runner::{CheckStatus, ComplianceCheck};

/// The report embeds at most this many checks unless `include_all` is set
const REPORT_CHECK_COUNT: usize = 10;
/// Priority list size for failing checks
const REPORT_FAILURE_COUNT: usize = 5;

#[derive(Debug, Deserialize)]
pub struct ComplianceParams {
    #[serde(default = "default_benchmark")]
    pub benchmark_type: String,
    /// Return every check instead of the first ten
    #[serde(default)]
    pub include_all: bool,
}

fn default_benchmark() -> String {
    "level1".to_string()
}

#[derive(Debug, Serialize)]
pub struct ComplianceReport {
    pub benchmark_type: String,
    pub generated_at: String,
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    /// 100 × passed / total, rounded to 2 decimals; errors weigh as failures
    pub score: f64,
    pub checks: Vec<ComplianceCheck>,
    /// First failing checks, in catalog order
    pub top_failures: Vec<ComplianceCheck>,
}

pub async fn run(ctx: &OpContext, params: ComplianceParams) -> EngineResult<ComplianceReport> {
    let ccfg = &ctx.config.compliance;
    let timeout = Duration::from_secs(ccfg.command_timeout_secs);
    let controls = catalog::select(&params.benchmark_type);

    let mut results = Vec::with_capacity(controls.len());
    for control in controls {
        results.push(runner::run_check(control, timeout, ccfg.output_limit_bytes).await);
    }

    Ok(assemble(params.benchmark_type, results, params.include_all))
}

/// Fold executed checks into the report shape.
pub(crate) fn assemble(
    benchmark_type: String,
    results: Vec<ComplianceCheck>,
    include_all: bool,
) -> ComplianceReport {
    let total_checks = results.len();
    let passed = results.iter().filter(|c| c.status == CheckStatus::Pass).count();
    let failed = results.iter().filter(|c| c.status == CheckStatus::Fail).count();
    let errors = results.iter().filter(|c| c.status == CheckStatus::Error).count();

    let top_failures: Vec<ComplianceCheck> = results
        .iter()
        .filter(|c| c.status != CheckStatus::Pass)
        .take(REPORT_FAILURE_COUNT)
        .cloned()
        .collect();

    let checks = if include_all {
        results
    } else {
        results.into_iter().take(REPORT_CHECK_COUNT).collect()
    };

    ComplianceReport {
        benchmark_type,
        generated_at: Utc::now().to_rfc3339(),
        total_checks,
        passed,
        failed,
        errors,
        score: runner::score(passed, total_checks),
        checks,
        top_failures,
    }
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    let params: ComplianceParams = schema::parse_params(input)?;
    let result = run(ctx, params).await?;
    schema::serialize_output(&result)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}

/// Register the compliance operation with the registry.
pub fn register_operations(reg: &mut Registry) {
    reg.register(make_operation(
        "check_cis_compliance",
        "Run the hardening control catalog and compute an aggregate compliance score",
        json!({
            "type": "object",
            "properties": {
                "benchmark_type": {"type": "string"},
                "include_all": {"type": "boolean"}
            },
            "additionalProperties": false
        }),
        true,
        150_000,
    ));
}
