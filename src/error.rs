//! Error types for the casework core.
//!
//! Each collaborator boundary has its own `thiserror` enum; [`CaseworkError`] is the
//! crate-level umbrella used by setup code (configuration, registry wiring).

use crate::config::ConfigurationError;
use crate::state_machine::StateMachineError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaseworkError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Record store error: {0}")]
    RecordStore(#[from] RecordStoreError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),
    #[error("Registry error: {0}")]
    Registry(String),
}

pub type Result<T> = std::result::Result<T, CaseworkError>;

/// Errors raised by a remote record store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordStoreError {
    /// The update token was already consumed or has gone stale
    #[error("Update conflict on {record}: {reason}")]
    Conflict { record: String, reason: String },
    #[error("Record {record} not found")]
    NotFound { record: String },
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed record payload for {record}: {reason}")]
    Malformed { record: String, reason: String },
}

impl RecordStoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors raised by the orchestration engine client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Engine request '{operation}' failed: {reason}")]
    RequestFailed { operation: String, reason: String },
    #[error("External task {task_id} not found or lock expired")]
    TaskNotFound { task_id: String },
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// How the executor treats a handler error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Named BPMN error, consumes no retry
    BusinessAbort,
    /// Reported with zero retries left, never retried from the worker
    Fatal,
    /// Handed to the retry controller
    Transient,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::BusinessAbort => write!(f, "Business Abort"),
            ErrorCategory::Fatal => write!(f, "Fatal"),
            ErrorCategory::Transient => write!(f, "Transient"),
        }
    }
}

/// Errors a task handler can surface to the worker
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Typed business abort signalled to the engine under a named error code
    #[error("Business abort [{error_code}]: {message}")]
    BusinessAbort { error_code: String, message: String },

    /// Non-retryable failure (e.g. a consistency wait that timed out)
    #[error("Fatal: {0}")]
    Fatal(String),

    /// The record changed underneath the session; the token was rejected
    #[error("Record {record} was already updated")]
    AlreadyUpdated { record: String },

    #[error("Invalid task input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    RecordStore(RecordStoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn business_abort(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BusinessAbort {
            error_code: error_code.into(),
            message: message.into(),
        }
    }

    pub fn classify(&self) -> ErrorCategory {
        match self {
            HandlerError::BusinessAbort { .. } => ErrorCategory::BusinessAbort,
            HandlerError::Fatal(_) => ErrorCategory::Fatal,
            HandlerError::AlreadyUpdated { .. }
            | HandlerError::InvalidInput(_)
            | HandlerError::RecordStore(_)
            | HandlerError::Engine(_)
            | HandlerError::StateMachine(_)
            | HandlerError::Other(_) => ErrorCategory::Transient,
        }
    }
}

impl From<RecordStoreError> for HandlerError {
    fn from(error: RecordStoreError) -> Self {
        match error {
            RecordStoreError::Conflict { record, .. } => HandlerError::AlreadyUpdated { record },
            other => HandlerError::RecordStore(other),
        }
    }
}

pub type HandlerResult<T> = std::result::Result<T, HandlerError>;
