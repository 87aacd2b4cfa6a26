//! Structured error taxonomy for the orchestrator. Each component gets its own leaf enum with a
//! `retriable()` classifier, generalizing this module's original `TransferError::is_retriable_*`
//! split into one method per error type so the worker's retry loop (`OrchestratorError`) can match
//! on a single trait-like call instead of re-deriving retriability ad hoc.
use thiserror::Error;

/// Errors raised by the rclone subprocess adapter (C2).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to launch rclone: {0}")]
    Spawn(String),
    #[error("rclone exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },
    #[error("timed out waiting for rclone after {0}s")]
    Timeout(u64),
    #[error("could not parse rclone progress line: {0}")]
    ProgressParse(String),
    #[error("endpoint configuration invalid: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(String),
}

impl AdapterError {
    pub fn retriable(&self) -> bool {
        matches!(self, AdapterError::Timeout(_) | AdapterError::Io(_))
    }
}

/// Errors raised by the distributed queue client (C1).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue transport error: {0}")]
    Transport(String),
    #[error("value stored under key could not be decoded: {0}")]
    Decode(String),
}

impl QueueError {
    pub fn retriable(&self) -> bool {
        matches!(self, QueueError::Transport(_))
    }
}

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn retriable(&self) -> bool {
        matches!(self, StoreError::Database(_))
    }
}

/// Errors raised by the throttle controller (C4).
#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("timed out acquiring a slot for endpoint {0} after {1}s")]
    AcquireTimeout(String, u64),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl ThrottleError {
    pub fn retriable(&self) -> bool {
        match self {
            ThrottleError::AcquireTimeout(..) => true,
            ThrottleError::Queue(e) => e.retriable(),
        }
    }
}

/// Crate-wide error the worker loop matches on to decide job-level vs. transfer-level handling
/// (§7 Error Handling Design).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Throttle(#[from] ThrottleError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid chain rule: {0}")]
    ChainRule(String),
    #[error("job was cancelled")]
    Cancelled,
}

impl OrchestratorError {
    pub fn retriable(&self) -> bool {
        match self {
            OrchestratorError::Adapter(e) => e.retriable(),
            OrchestratorError::Queue(e) => e.retriable(),
            OrchestratorError::Store(e) => e.retriable(),
            OrchestratorError::Throttle(e) => e.retriable(),
            OrchestratorError::Configuration(_) | OrchestratorError::ChainRule(_) | OrchestratorError::Cancelled => {
                false
            }
        }
    }
}

