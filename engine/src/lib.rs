//! sysmon-engine — live process and system monitoring engine
//!
//! Samples operating-system process state, derives metrics, builds
//! hierarchical views, tracks population changes over time, profiles
//! single-process behavior, and scores configuration compliance against a
//! fixed hardening catalog.
//!
//! The engine exposes a fixed surface of named operations, each consuming
//! and producing structured JSON. It never parses free text and never
//! produces prose; choosing which operation to call, and rendering its
//! result for a human, is the embedding orchestrator's job:
//!
//! ```no_run
//! # async fn demo() {
//! let engine = sysmon_engine::Engine::default();
//! let response = engine
//!     .execute("list_processes", br#"{"mode": "snapshot", "limit": 5}"#)
//!     .await;
//! assert!(response.success);
//! # }
//! ```
//!
//! Operations are self-contained: each performs its own sampling and owns
//! its results, so concurrent invocations interleave freely. The only
//! cross-call state is the background monitoring lifecycle.

pub mod collector;
pub mod compliance;
pub mod config;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod process;
pub mod registry;
pub mod schema;

use std::sync::Arc;
use tracing::info;

pub use config::MonitorConfig;
pub use error::{EngineError, EngineResult};
pub use executor::{Executor, OperationResponse};
pub use registry::{OperationSpec, Registry};

use monitor::watch::SystemMonitor;

/// Shared state handed to every operation handler.
pub struct OpContext {
    pub config: MonitorConfig,
    pub monitor: Arc<SystemMonitor>,
}

/// The monitoring engine: registry, dispatch pipeline, and lifecycle.
pub struct Engine {
    registry: Registry,
    executor: Executor,
    ctx: OpContext,
}

impl Engine {
    pub fn new(config: MonitorConfig) -> Self {
        let mut registry = Registry::new();
        register_builtin_operations(&mut registry);

        let monitor = Arc::new(SystemMonitor::new(&config.monitoring));

        Self {
            registry,
            executor: Executor::new(),
            ctx: OpContext { config, monitor },
        }
    }

    /// Build with configuration from `SYSMON_CONFIG` / the default path.
    pub fn from_environment() -> anyhow::Result<Self> {
        Ok(Self::new(config::load_config()?))
    }

    /// The operation catalog, for discovery by the orchestrator.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn context(&self) -> &OpContext {
        &self.ctx
    }

    /// Invoke one operation by name with JSON input bytes.
    pub async fn execute(&self, operation: &str, input: &[u8]) -> OperationResponse {
        self.executor
            .execute(&self.registry, &self.ctx, operation, input)
            .await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

/// Register all built-in operations
fn register_builtin_operations(reg: &mut Registry) {
    process::register_operations(reg);
    compliance::register_operations(reg);
    monitor::register_operations(reg);

    info!("Registered {} operations", reg.operation_count());
}

/// Install a compact stdout subscriber honoring `RUST_LOG`. Embedders with
/// their own subscriber skip this; double initialization is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();
}
