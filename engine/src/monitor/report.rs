//! generate_system_report — composition of listing, compliance, and status
//!
//! No independent logic beyond composing the other operations; this is the
//! natural place to add new report shapes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::compliance::{self, ComplianceParams, ComplianceReport};
use crate::error::EngineResult;
use crate::executor::BoxedOpFuture;
use crate::monitor::status::{self, SystemStatus};
use crate::process::list::{self, AnalysisMode, ConsumerRef, ListParams, ListingResult, SortBy};
use crate::schema;
use crate::OpContext;

const TOP_PROCESS_COUNT: usize = 5;
const REPORT_LISTING_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    Summary,
    Detailed,
}

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    #[serde(default)]
    pub report_type: ReportType,
}

#[derive(Debug, Serialize)]
pub struct ComplianceSummary {
    pub score: f64,
    pub passed: usize,
    pub total_checks: usize,
}

/// Full sub-results, embedded only in detailed reports
#[derive(Debug, Serialize)]
pub struct ReportDetails {
    pub listing: ListingResult,
    pub compliance: ComplianceReport,
}

#[derive(Debug, Serialize)]
pub struct SystemReport {
    pub report_type: ReportType,
    pub generated_at: String,
    /// "Good" below the configured CPU threshold, else "Concerning"
    pub health: String,
    pub system: SystemStatus,
    pub top_processes: Vec<ConsumerRef>,
    pub compliance: ComplianceSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ReportDetails>,
}

pub async fn run(ctx: &OpContext, params: ReportParams) -> EngineResult<SystemReport> {
    let listing = list::run(
        ctx,
        ListParams {
            mode: AnalysisMode::Snapshot,
            limit: REPORT_LISTING_LIMIT,
            sort_by: SortBy::Cpu,
            offset: 0,
            cpu_interval: None,
            include_all: false,
        },
    )
    .await?;

    let compliance_report = compliance::run(
        ctx,
        ComplianceParams {
            benchmark_type: "level1".to_string(),
            include_all: params.report_type == ReportType::Detailed,
        },
    )
    .await?;

    let system = status::gather(ctx.monitor.is_active()).await?;

    let top_processes: Vec<ConsumerRef> = listing
        .records
        .iter()
        .take(TOP_PROCESS_COUNT)
        .map(|r| ConsumerRef {
            pid: r.pid,
            name: r.name.clone(),
            cpu_percent: r.cpu_percent,
            memory_percent: r.memory_percent,
        })
        .collect();

    let compliance_summary = ComplianceSummary {
        score: compliance_report.score,
        passed: compliance_report.passed,
        total_checks: compliance_report.total_checks,
    };

    let health =
        health_label(system.cpu_percent, ctx.config.monitoring.health_cpu_percent).to_string();

    let details = (params.report_type == ReportType::Detailed).then_some(ReportDetails {
        listing,
        compliance: compliance_report,
    });

    Ok(SystemReport {
        report_type: params.report_type,
        generated_at: Utc::now().to_rfc3339(),
        health,
        system,
        top_processes,
        compliance: compliance_summary,
        details,
    })
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    let params: ReportParams = schema::parse_params(input)?;
    let result = run(ctx, params).await?;
    schema::serialize_output(&result)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}

pub(crate) fn health_label(cpu_percent: f64, threshold: f64) -> &'static str {
    if cpu_percent < threshold {
        "Good"
    } else {
        "Concerning"
    }
}
