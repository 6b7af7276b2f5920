//! # Task Handlers
//!
//! ## Architecture: One Handler Per Topic
//!
//! A [`TaskHandler`] subscribes to one engine topic and turns a locked
//! [`ExternalTask`] into at most one start/submit pair against the record store.
//! Handlers are shared across concurrent invocations and keep no per-call state:
//! whatever `execute` learns is returned as [`ExternalTaskData`] and handed to
//! [`TaskHandler::completion_variables`] by the executor.
//!
//! ## Error contract
//!
//! - [`HandlerError::BusinessAbort`] becomes a named BPMN error, no retry consumed
//! - [`HandlerError::Fatal`] is reported with zero retries left
//! - anything else goes through the retry controller
//!
//! [`HandlerError::BusinessAbort`]: crate::error::HandlerError::BusinessAbort
//! [`HandlerError::Fatal`]: crate::error::HandlerError::Fatal

pub mod case_event;
pub mod consistency;
pub mod documents;
pub mod end_business_process;
pub mod flow_state;
pub mod start_business_process;

use crate::constants::error_codes;
use crate::error::{HandlerError, HandlerResult};
use crate::models::{BusinessProcess, CaseRecord, ExternalTask, ProcessVariables, RecordRef};
use crate::state_machine::{
    BusinessProcessEvent, BusinessProcessStateMachine, GuardError, OwnershipDecision,
    OwnershipGuard, StateGuard,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

pub use case_event::{CaseEventTaskHandler, CaseMutation, SetFieldsMutation};
pub use consistency::{BoundedConsistencyWaiter, WaitForDocumentCopyHandler};
pub use documents::{
    copy_documents, DocumentCopyRule, DocumentVisibility, SyncLinkedDocumentsHandler,
    VisibilityContext, DOCUMENT_COPY_RULES,
};
pub use end_business_process::{EndBusinessProcessHandler, EndOutcome};
pub use flow_state::{FieldFlowStateResolver, FlowStateResolver};
pub use start_business_process::StartBusinessProcessHandler;

/// Which record a handler addresses for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    /// The case named by the `caseId` variable
    #[default]
    Primary,
    /// The linked sub-record named by `generalApplicationCaseId`
    Linked,
}

impl Addressing {
    pub fn resolve(&self, task: &ExternalTask) -> HandlerResult<RecordRef> {
        match self {
            Addressing::Primary => Ok(RecordRef::primary(task.case_id()?)),
            Addressing::Linked => Ok(RecordRef::linked(task.general_application_case_id()?)),
        }
    }
}

/// Typed abort for a run acting on a record it does not own
pub(crate) fn ownership_abort(guard: GuardError) -> HandlerError {
    let code = match guard {
        GuardError::NotOwner { .. } => error_codes::NOT_OWNER,
        GuardError::InvalidState { .. } => error_codes::ABORT,
    };
    HandlerError::business_abort(code, guard.to_string())
}

/// Check that `run_id` owns `bp`, moving a failed run back to STARTED when it was
/// re-triggered
pub(crate) fn continue_owned_run(bp: &mut BusinessProcess, run_id: &str) -> HandlerResult<()> {
    let decision = OwnershipGuard::new(run_id).check(bp).map_err(ownership_abort)?;
    if decision == OwnershipDecision::Resume {
        BusinessProcessStateMachine::transition(bp, &BusinessProcessEvent::resume(run_id))?;
        info!(process_instance_id = %run_id, "Resuming failed business process");
    }
    Ok(())
}

/// What one `execute` call produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalTaskData {
    /// The record as this invocation left it (committed, or observed unchanged)
    pub record: Option<CaseRecord>,
    /// Whether this invocation committed a write
    pub committed: bool,
    pub metadata: HashMap<String, Value>,
}

impl ExternalTaskData {
    pub fn committed(record: CaseRecord) -> Self {
        Self {
            record: Some(record),
            committed: true,
            metadata: HashMap::new(),
        }
    }

    pub fn unchanged(record: CaseRecord) -> Self {
        Self {
            record: Some(record),
            committed: false,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Per-topic execution contract
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Engine topic this handler subscribes to
    fn topic(&self) -> &str;

    /// Attempt budget override; `None` uses the configured default
    fn max_attempts(&self) -> Option<u32> {
        None
    }

    /// Record stamped FAILED when the last attempt is spent, if the handler has one
    fn record_ref(&self, task: &ExternalTask) -> HandlerResult<Option<RecordRef>> {
        Ok(Some(Addressing::Primary.resolve(task)?))
    }

    async fn execute(&self, task: &ExternalTask) -> HandlerResult<Option<ExternalTaskData>>;

    /// Variables passed to the engine on completion, derived from `execute`'s result
    fn completion_variables(
        &self,
        task: &ExternalTask,
        data: Option<&ExternalTaskData>,
    ) -> Option<ProcessVariables> {
        let _ = (task, data);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::variables;

    #[test]
    fn test_addressing_uses_distinct_ids() {
        let task = ExternalTask::new("t", "topic", "run")
            .with_variable(variables::CASE_ID, "100")
            .with_variable(variables::GENERAL_APPLICATION_CASE_ID, "200");

        assert_eq!(Addressing::Primary.resolve(&task).unwrap(), RecordRef::primary("100"));
        assert_eq!(Addressing::Linked.resolve(&task).unwrap(), RecordRef::linked("200"));
    }

    #[test]
    fn test_linked_addressing_requires_sub_record_id() {
        let task = ExternalTask::new("t", "topic", "run").with_variable(variables::CASE_ID, "100");
        assert!(Addressing::Linked.resolve(&task).is_err());
    }
}
