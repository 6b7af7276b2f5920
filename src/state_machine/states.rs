use serde::{Deserialize, Serialize};
use std::fmt;

/// Business process status stamped on every case record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessProcessStatus {
    /// No business process has been requested yet
    #[default]
    NotStarted,
    /// A business process was requested and awaits a run
    Ready,
    /// A run owns the record
    Started,
    /// The last run completed
    Finished,
    /// The last run handed its work off downstream
    Dispatched,
    /// The last run exhausted its retries
    Failed,
}

impl BusinessProcessStatus {
    /// A new run may claim the record from this status
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Finished | Self::Dispatched)
    }

    /// Check if this is an active state (a run owns the record)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for BusinessProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT_STARTED"),
            Self::Ready => write!(f, "READY"),
            Self::Started => write!(f, "STARTED"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Dispatched => write!(f, "DISPATCHED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for BusinessProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "READY" => Ok(Self::Ready),
            "STARTED" => Ok(Self::Started),
            "FINISHED" => Ok(Self::Finished),
            "DISPATCHED" => Ok(Self::Dispatched),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid business process status: {s}")),
        }
    }
}
