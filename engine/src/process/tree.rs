//! get_process_tree — parent/child hierarchy reconstruction
//!
//! One parent→children index is built per call and the traversal recurses
//! over it, so a flat forest costs O(n) rather than a rescan per node.
//! With no explicit root, the forest is the union of pid 1 and every
//! process whose parent is absent or 0/1, each expanded independently.
//! On irregular process graphs those subtrees can overlap; the overlap is
//! preserved as-is rather than deduplicated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::collector::{Detail, ProcessRecord, Snapshot};
use crate::error::{EngineError, EngineResult};
use crate::executor::BoxedOpFuture;
use crate::schema;
use crate::OpContext;

#[derive(Debug, Deserialize)]
pub struct TreeParams {
    #[serde(default)]
    pub root_pid: Option<u32>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub include_threads: bool,
}

fn default_max_depth() -> usize {
    3
}

#[derive(Debug, Serialize)]
pub struct ProcessTreeNode {
    #[serde(flatten)]
    pub record: ProcessRecord,
    pub depth: usize,
    pub children: Vec<ProcessTreeNode>,
}

#[derive(Debug, Serialize)]
pub struct TreeResult {
    pub roots: Vec<ProcessTreeNode>,
    pub node_count: usize,
    pub max_depth: usize,
}

pub async fn run(ctx: &OpContext, params: TreeParams) -> EngineResult<TreeResult> {
    let scfg = &ctx.config.sampling;
    let detail = if params.include_threads {
        Detail::Enriched
    } else {
        Detail::Basic
    };

    let snapshot = Snapshot::capture(Duration::from_secs_f64(scfg.snapshot_interval_secs)).await;
    let records = snapshot.records(detail, scfg);

    if let Some(root) = params.root_pid {
        if !records.iter().any(|r| r.pid == root) {
            return Err(EngineError::NotFound(root));
        }
    }

    let roots = build_forest(&records, params.root_pid, params.max_depth);
    let node_count = roots.iter().map(count_nodes).sum();

    Ok(TreeResult {
        roots,
        node_count,
        max_depth: params.max_depth,
    })
}

pub async fn execute(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    let params: TreeParams = schema::parse_params(input)?;
    let result = run(ctx, params).await?;
    schema::serialize_output(&result)
}

pub fn handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute(ctx, input))
}

/// Reconstruct the forest from a flat snapshot. Descendants below
/// `max_depth` are omitted, not marked.
pub(crate) fn build_forest(
    records: &[ProcessRecord],
    root_pid: Option<u32>,
    max_depth: usize,
) -> Vec<ProcessTreeNode> {
    let by_pid: HashMap<u32, &ProcessRecord> = records.iter().map(|r| (r.pid, r)).collect();

    let mut children_index: HashMap<u32, Vec<u32>> = HashMap::new();
    for r in records {
        if let Some(parent) = r.parent_pid {
            // One parent edge per process; a self-edge would recurse forever
            if parent != r.pid {
                children_index.entry(parent).or_default().push(r.pid);
            }
        }
    }
    for kids in children_index.values_mut() {
        kids.sort_unstable();
    }

    let mut root_pids: Vec<u32> = match root_pid {
        Some(pid) => vec![pid],
        None => {
            let mut roots: Vec<u32> = records
                .iter()
                .filter(|r| r.pid == 1 || matches!(r.parent_pid, None | Some(0) | Some(1)))
                .map(|r| r.pid)
                .collect();
            roots.sort_unstable();
            roots
        }
    };
    root_pids.dedup();

    root_pids
        .into_iter()
        .filter_map(|pid| build_node(pid, 0, max_depth, &by_pid, &children_index))
        .collect()
}

fn build_node(
    pid: u32,
    depth: usize,
    max_depth: usize,
    by_pid: &HashMap<u32, &ProcessRecord>,
    children_index: &HashMap<u32, Vec<u32>>,
) -> Option<ProcessTreeNode> {
    let record = (*by_pid.get(&pid)?).clone();

    let children = if depth < max_depth {
        children_index
            .get(&pid)
            .map(|kids| {
                kids.iter()
                    .filter_map(|&child| {
                        build_node(child, depth + 1, max_depth, by_pid, children_index)
                    })
                    .collect()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Some(ProcessTreeNode {
        record,
        depth,
        children,
    })
}

fn count_nodes(node: &ProcessTreeNode) -> usize {
    1 + node.children.iter().map(count_nodes).sum::<usize>()
}
