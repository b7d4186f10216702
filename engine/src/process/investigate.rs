//! investigate_process — enriched detail for a single pid

use serde::{Deserialize, Serialize};

use crate::collector::{sampling, Detail, ProcessRecord, Snapshot};
use crate::error::{EngineError, EngineResult};
use crate::executor::BoxedOpFuture;
use crate::schema;
use crate::OpContext;

#[derive(Debug, Deserialize)]
pub struct InvestigateParams {
    pub pid: u32,
    #[serde(default)]
    pub cpu_interval: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct InvestigateResult {
    pub process: ProcessRecord,
    /// Immediate children at the sampling instant, pid-sorted
    pub children: Vec<u32>,
}

pub async fn run(ctx: &OpContext, params: InvestigateParams) -> EngineResult<InvestigateResult> {
    let scfg = &ctx.config.sampling;
    let interval = sampling::clamp_interval(params.cpu_interval, scfg);

    let snapshot = Snapshot::capture(interval).await;
    let process = snapshot
        .record(params.pid, Detail::Enriched, scfg)
        .ok_or(EngineError::NotFound(params.pid))?;

    let mut children: Vec<u32> = snapshot
        .system()
        .processes()
        .values()
        .filter(|p| p.parent().map(|pp| pp.as_u32()) == Some(params.pid))
        .map(|p| p.pid().as_u32())
        .collect();
    children.sort_unstable();

    Ok(InvestigateResult { process, children })
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    let params: InvestigateParams = schema::parse_params(input)?;
    let result = run(ctx, params).await?;
    schema::serialize_output(&result)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}
