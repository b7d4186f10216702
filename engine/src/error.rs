//! Engine error taxonomy
//!
//! Every operation failure maps to one of these variants. The dispatch
//! boundary converts them into structured responses with a stable
//! `error_kind` string, so callers can branch without parsing messages.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Target process vanished or never existed. Surfaced to the caller,
    /// never retried internally.
    #[error("process {0} not found")]
    NotFound(u32),

    /// Insufficient privilege to read a resource. At per-process
    /// granularity this is skipped silently during collection; the variant
    /// exists for operations whose single target is unreadable.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// An external command or an operation exceeded its bound.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A caller-supplied argument was unusable and no safe default existed
    /// to clamp it to.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Anything unexpected. Caught at the dispatch boundary and returned
    /// as a structured failure, never propagated as a panic.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable machine-readable kind for structured responses.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::AccessDenied(_) => "access_denied",
            EngineError::Timeout(_) => "timeout",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::InvalidArgument(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
