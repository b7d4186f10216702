//! start/stop_system_monitoring — background sampling lifecycle
//!
//! An explicit lifecycle object rather than a process-wide boolean: the
//! engine owns one [`SystemMonitor`], operations toggle it, and the status
//! operation reads its flag. The loop checks for cancellation once per
//! iteration, so a stop request takes effect at the next tick boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::MonitoringConfig;
use crate::error::EngineResult;
use crate::executor::BoxedOpFuture;
use crate::monitor::status;
use crate::schema;
use crate::OpContext;

pub struct SystemMonitor {
    active: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    cadence: Duration,
    failure_backoff: Duration,
}

impl SystemMonitor {
    pub fn new(cfg: &MonitoringConfig) -> Self {
        Self {
            active: AtomicBool::new(false),
            cancel: Mutex::new(None),
            cadence: Duration::from_secs(cfg.cadence_secs),
            failure_backoff: Duration::from_secs(cfg.failure_backoff_secs),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start the background loop. Returns false when it was already
    /// running; starting twice is not an error.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.active.swap(true, Ordering::SeqCst) {
            return false;
        }

        let token = CancellationToken::new();
        *lock_or_recover(&self.cancel) = Some(token.clone());

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor.run(token).await;
        });

        info!("system monitoring started");
        true
    }

    /// Cancel the loop. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        let token = lock_or_recover(&self.cancel).take();
        match token {
            Some(token) => {
                token.cancel();
                self.active.store(false, Ordering::SeqCst);
                info!("system monitoring stopped");
                true
            }
            None => false,
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.cadence) => {
                    match status::gather(true).await {
                        Ok(s) => {
                            info!(
                                cpu = s.cpu_percent,
                                memory = s.memory_percent,
                                processes = s.process_count,
                                "monitoring tick"
                            );
                        }
                        Err(e) => {
                            warn!("monitoring tick failed: {e}, backing off");
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(self.failure_backoff) => {}
                            }
                        }
                    }
                }
            }
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

/// A poisoned lock here only means a panicking thread mid-toggle; the
/// token state is still coherent, so recover rather than propagate.
fn lock_or_recover<'a>(
    mutex: &'a Mutex<Option<CancellationToken>>,
) -> std::sync::MutexGuard<'a, Option<CancellationToken>> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ToggleResult {
    pub monitoring_active: bool,
    /// False when the call was a no-op (already in the requested state)
    pub changed: bool,
}

pub async fn execute_start(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    schema::parse_input(input)?;
    let changed = ctx.monitor.start();
    schema::serialize_output(&ToggleResult {
        monitoring_active: true,
        changed,
    })
}

pub async fn execute_stop(ctx: &OpContext, input: &[u8]) -> EngineResult<Vec<u8>> {
    schema::parse_input(input)?;
    let changed = ctx.monitor.stop();
    schema::serialize_output(&ToggleResult {
        monitoring_active: false,
        changed,
    })
}

pub fn start_handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute_start(ctx, input))
}

pub fn stop_handler<'a>(ctx: &'a OpContext, input: &'a [u8]) -> BoxedOpFuture<'a> {
    Box::pin(execute_stop(ctx, input))
}
