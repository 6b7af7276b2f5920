use crate::state_machine::BusinessProcessStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Business process bookkeeping embedded in every case record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProcess {
    #[serde(default)]
    pub status: BusinessProcessStatus,

    /// Correlation id of the orchestration run currently owning the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_instance_id: Option<String>,

    /// Step name inside the run, diagnostic only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggering_event: Option<String>,

    /// Only populated while the status is FAILED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_external_task_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl BusinessProcess {
    pub fn new(status: BusinessProcessStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_process_instance_id(mut self, process_instance_id: impl Into<String>) -> Self {
        self.process_instance_id = Some(process_instance_id.into());
        self
    }

    pub fn with_triggering_event(mut self, event: impl Into<String>) -> Self {
        self.triggering_event = Some(event.into());
        self
    }

    /// True when `run_id` is the run that currently owns this process
    pub fn is_owned_by(&self, run_id: &str) -> bool {
        self.process_instance_id.as_deref() == Some(run_id)
    }

    /// Eligible for a resweep re-trigger
    pub fn is_resweep_candidate(&self) -> bool {
        self.status == BusinessProcessStatus::Failed && self.failed_external_task_id.is_some()
    }
}
