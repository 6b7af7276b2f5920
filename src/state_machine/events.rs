use serde::{Deserialize, Serialize};

/// Events that can trigger business process transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BusinessProcessEvent {
    /// A business process was requested for the record
    Ready,
    /// A run takes ownership of the record
    Claim { run_id: String },
    /// The owning run completed its work
    Finish,
    /// The owning run handed its work off downstream
    Dispatch,
    /// The run exhausted its retries on the given external task
    Fail {
        run_id: String,
        external_task_id: String,
    },
    /// The run that failed picks its work back up after a re-trigger
    Resume { run_id: String },
    /// Operator reset of a failed process
    Reset,
}

impl BusinessProcessEvent {
    pub fn claim(run_id: impl Into<String>) -> Self {
        Self::Claim {
            run_id: run_id.into(),
        }
    }

    pub fn fail(run_id: impl Into<String>, external_task_id: impl Into<String>) -> Self {
        Self::Fail {
            run_id: run_id.into(),
            external_task_id: external_task_id.into(),
        }
    }

    pub fn resume(run_id: impl Into<String>) -> Self {
        Self::Resume {
            run_id: run_id.into(),
        }
    }

    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Claim { .. } => "claim",
            Self::Finish => "finish",
            Self::Dispatch => "dispatch",
            Self::Fail { .. } => "fail",
            Self::Resume { .. } => "resume",
            Self::Reset => "reset",
        }
    }

    /// Check if this event ends the current run's ownership
    pub fn releases_ownership(&self) -> bool {
        matches!(self, Self::Finish | Self::Dispatch | Self::Reset)
    }
}
