//! Operation execution pipeline
//!
//! Pipeline: look up descriptor → validate input against its schema →
//! dispatch under the operation timeout → structured response. Every
//! failure path produces a response; nothing unwinds past this boundary.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::registry::Registry;
use crate::schema;
use crate::OpContext;

pub type BoxedOpFuture<'a> = Pin<Box<dyn Future<Output = EngineResult<Vec<u8>>> + Send + 'a>>;

/// An operation handler: borrows the shared context and raw input, returns
/// serialized JSON output.
pub type OperationHandler = for<'a> fn(&'a OpContext, &'a [u8]) -> BoxedOpFuture<'a>;

/// Structured result of one invocation. Degraded-but-informative: errors
/// come back as data, never as a crash.
#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub invocation_id: String,
    pub duration_ms: i64,
}

impl OperationResponse {
    fn failure(invocation_id: String, started: Instant, error: &EngineError) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            invocation_id,
            duration_ms: started.elapsed().as_millis() as i64,
        }
    }
}

/// Dispatches operations to their handlers.
pub struct Executor {
    handlers: HashMap<&'static str, OperationHandler>,
}

impl Executor {
    pub fn new() -> Self {
        let mut executor = Self {
            handlers: HashMap::new(),
        };
        executor.register_handlers();
        executor
    }

    /// Register all built-in operation handlers
    fn register_handlers(&mut self) {
        self.handlers
            .insert("list_processes", crate::process::list::handler as OperationHandler);
        self.handlers
            .insert("investigate_process", crate::process::investigate::handler);
        self.handlers
            .insert("get_process_tree", crate::process::tree::handler);
        self.handlers
            .insert("filter_processes", crate::process::filter::handler);
        self.handlers
            .insert("monitor_process_changes", crate::process::changes::handler);
        self.handlers
            .insert("analyze_process_behavior", crate::process::behavior::handler);
        self.handlers
            .insert("check_cis_compliance", crate::compliance::handler);
        self.handlers
            .insert("get_system_status", crate::monitor::status::handler);
        self.handlers
            .insert("generate_system_report", crate::monitor::report::handler);
        self.handlers
            .insert("start_system_monitoring", crate::monitor::watch::start_handler);
        self.handlers
            .insert("stop_system_monitoring", crate::monitor::watch::stop_handler);
    }

    /// True when every registered descriptor has a matching handler.
    pub fn covers(&self, registry: &Registry) -> bool {
        registry
            .list_operations()
            .iter()
            .all(|spec| self.handlers.contains_key(spec.name.as_str()))
    }

    /// Execute one operation through the full pipeline.
    pub async fn execute(
        &self,
        registry: &Registry,
        ctx: &OpContext,
        name: &str,
        input: &[u8],
    ) -> OperationResponse {
        let invocation_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        // 1. Validate: operation must exist
        let Some(spec) = registry.get(name) else {
            warn!("unknown operation requested: {name}");
            let err = EngineError::InvalidArgument(format!("unknown operation: {name}"));
            return OperationResponse::failure(invocation_id, started, &err);
        };

        // 2. Validate the input against the operation's schema
        if let Err(err) = schema::validate_input(input, &spec.input_schema) {
            warn!("operation {name} rejected input: {err}");
            return OperationResponse::failure(invocation_id, started, &err);
        }

        let Some(handler) = self.handlers.get(name) else {
            let err = EngineError::Internal(anyhow::anyhow!(
                "no handler registered for operation: {name}"
            ));
            return OperationResponse::failure(invocation_id, started, &err);
        };

        info!("executing operation {name} ({invocation_id})");

        // 3. Dispatch under the operation's hard timeout
        let bound = Duration::from_millis(spec.timeout_ms);
        let result = match tokio::time::timeout(bound, handler(ctx, input)).await {
            Err(_) => Err(EngineError::Timeout(bound)),
            Ok(r) => r,
        };

        match result {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(output) => OperationResponse {
                    success: true,
                    output: Some(output),
                    error: None,
                    error_kind: None,
                    invocation_id,
                    duration_ms: started.elapsed().as_millis() as i64,
                },
                Err(e) => {
                    let err = EngineError::Internal(anyhow::anyhow!(
                        "operation produced unreadable output: {e}"
                    ));
                    OperationResponse::failure(invocation_id, started, &err)
                }
            },
            Err(err) => {
                warn!("operation {name} failed: {err}");
                OperationResponse::failure(invocation_id, started, &err)
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}
