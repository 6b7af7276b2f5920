use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on event '{event}'")]
    InvalidTransition { from: String, event: String },

    #[error("Guard failed: {0}")]
    GuardFailed(#[from] GuardError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Run {run_id} does not own the business process (owner: {owner:?})")]
    NotOwner {
        run_id: String,
        owner: Option<String>,
    },

    #[error("Business process is in state {state}, expected {expected}")]
    InvalidState { state: String, expected: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;
