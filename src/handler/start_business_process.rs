//! # Start Business Process
//!
//! Claims a record for the orchestration run that delivered the task. The claim is
//! decided by [`ClaimGuard`] against the record data returned from `start_update`, so
//! a redelivered task or a competing run never applies the claim twice.

use super::{Addressing, ExternalTaskData, FieldFlowStateResolver, FlowStateResolver, TaskHandler};
use crate::constants::error_codes;
use crate::error::{HandlerError, HandlerResult};
use crate::models::{ExternalTask, ProcessVariables, RecordRef};
use crate::record_store::OptimisticRecordUpdater;
use crate::state_machine::{
    BusinessProcessEvent, BusinessProcessStateMachine, ClaimDecision, ClaimGuard, StateGuard,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct StartBusinessProcessHandler {
    topic: String,
    updater: OptimisticRecordUpdater,
    addressing: Addressing,
    flow_state: Arc<dyn FlowStateResolver>,
}

impl std::fmt::Debug for StartBusinessProcessHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartBusinessProcessHandler")
            .field("topic", &self.topic)
            .field("addressing", &self.addressing)
            .finish_non_exhaustive()
    }
}

impl StartBusinessProcessHandler {
    pub fn new(topic: impl Into<String>, updater: OptimisticRecordUpdater) -> Self {
        Self {
            topic: topic.into(),
            updater,
            addressing: Addressing::Primary,
            flow_state: Arc::new(FieldFlowStateResolver::default()),
        }
    }

    /// Claim the linked sub-record instead of the parent case
    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_flow_state_resolver(mut self, resolver: Arc<dyn FlowStateResolver>) -> Self {
        self.flow_state = resolver;
        self
    }
}

#[async_trait]
impl TaskHandler for StartBusinessProcessHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn record_ref(&self, task: &ExternalTask) -> HandlerResult<Option<RecordRef>> {
        Ok(Some(self.addressing.resolve(task)?))
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, run_id = %task.process_instance_id))]
    async fn execute(&self, task: &ExternalTask) -> HandlerResult<Option<ExternalTaskData>> {
        let record_ref = self.addressing.resolve(task)?;
        let event = task.case_event()?;
        let mut session = self.updater.start_update(record_ref.clone(), &event).await?;

        let run_id = task.process_instance_id.as_str();
        let decision = ClaimGuard::new(run_id).check(&session.record.business_process);

        match decision {
            ClaimDecision::Proceed => {
                let triggering_event = session.triggering_event().to_string();
                let bp = &mut session.record.business_process;
                BusinessProcessStateMachine::transition(bp, &BusinessProcessEvent::claim(run_id))?;
                bp.triggering_event = Some(triggering_event);
                bp.activity_id = task.activity_id.clone();

                let committed = self.updater.submit_update(session).await?;
                info!(
                    record = %record_ref,
                    triggering_event = %event,
                    process_instance_id = %run_id,
                    "Business process started"
                );
                Ok(Some(ExternalTaskData::committed(committed)))
            }
            ClaimDecision::DuplicateDelivery => {
                warn!(
                    record = %record_ref,
                    process_instance_id = %run_id,
                    "Duplicate delivery of start task"
                );
                Err(HandlerError::business_abort(
                    error_codes::DUPLICATE_DELIVERY,
                    format!("{record_ref} already started by run {run_id}"),
                ))
            }
            ClaimDecision::AlreadyClaimed { owner } => {
                info!(
                    record = %record_ref,
                    owner = ?owner,
                    process_instance_id = %run_id,
                    "Record already claimed by another run, leaving it untouched"
                );
                Ok(Some(
                    ExternalTaskData::unchanged(session.record)
                        .with_metadata("alreadyClaimed", true),
                ))
            }
            ClaimDecision::Rejected { status } => {
                error!(
                    case_id = %record_ref.id(),
                    triggering_event = %event,
                    status = %status,
                    "Business process cannot be started from current status"
                );
                Err(HandlerError::business_abort(
                    error_codes::ABORT,
                    format!("{record_ref} is {status}, cannot start {event}"),
                ))
            }
        }
    }

    fn completion_variables(
        &self,
        _task: &ExternalTask,
        data: Option<&ExternalTaskData>,
    ) -> Option<ProcessVariables> {
        let record = data?.record.as_ref()?;
        self.flow_state
            .evaluate(record)
            .map(|state| ProcessVariables::from_flow_state(&state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BusinessProcess, CaseRecord};
    use crate::record_store::InMemoryRecordStore;
    use crate::state_machine::BusinessProcessStatus;

    fn setup(bp: BusinessProcess) -> (Arc<InMemoryRecordStore>, StartBusinessProcessHandler) {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(
            RecordRef::primary("1"),
            CaseRecord::new("1", bp).with_case_data(serde_json::json!({"flowState": "MAIN.DRAFT"})),
        );
        let handler = StartBusinessProcessHandler::new(
            "START_BUSINESS_PROCESS",
            OptimisticRecordUpdater::new(store.clone()),
        );
        (store, handler)
    }

    fn task(run_id: &str) -> ExternalTask {
        ExternalTask::new("ext-1", "START_BUSINESS_PROCESS", run_id)
            .with_activity_id("StartProcess")
            .with_variable("caseId", "1")
            .with_variable("caseEvent", "CREATE_CLAIM")
    }

    #[tokio::test]
    async fn test_claims_finished_record() {
        let (store, handler) = setup(BusinessProcess::new(BusinessProcessStatus::Finished));

        let data = handler.execute(&task("run-1")).await.unwrap().unwrap();
        assert!(data.committed);

        let bp = store.snapshot(&RecordRef::primary("1")).unwrap().business_process;
        assert_eq!(bp.status, BusinessProcessStatus::Started);
        assert_eq!(bp.process_instance_id.as_deref(), Some("run-1"));
        assert_eq!(bp.triggering_event.as_deref(), Some("CREATE_CLAIM"));
        assert_eq!(bp.activity_id.as_deref(), Some("StartProcess"));

        let vars = handler.completion_variables(&task("run-1"), Some(&data)).unwrap();
        assert_eq!(vars.flow_state(), Some("MAIN.DRAFT"));
    }

    #[tokio::test]
    async fn test_redelivery_is_duplicate_abort() {
        let (store, handler) = setup(
            BusinessProcess::new(BusinessProcessStatus::Started).with_process_instance_id("run-1"),
        );

        let err = handler.execute(&task("run-1")).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::BusinessAbort { ref error_code, .. }
                if error_code == error_codes::DUPLICATE_DELIVERY
        ));
        assert_eq!(store.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_other_run_leaves_record_untouched() {
        let initial =
            BusinessProcess::new(BusinessProcessStatus::Started).with_process_instance_id("run-2");
        let (store, handler) = setup(initial.clone());

        let data = handler.execute(&task("run-1")).await.unwrap().unwrap();
        assert!(!data.committed);
        assert_eq!(data.record.unwrap().business_process, initial);
        assert_eq!(store.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_record_is_rejected() {
        let (store, handler) = setup(BusinessProcess::new(BusinessProcessStatus::Failed));

        let err = handler.execute(&task("run-1")).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::BusinessAbort { ref error_code, .. } if error_code == error_codes::ABORT
        ));
        assert_eq!(store.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_linked_addressing_claims_sub_record() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(RecordRef::primary("1"), CaseRecord::new("1", BusinessProcess::default()));
        store.insert(
            RecordRef::linked("900"),
            CaseRecord::new("900", BusinessProcess::new(BusinessProcessStatus::Dispatched)),
        );
        let updater = OptimisticRecordUpdater::new(store.clone());
        let handler = StartBusinessProcessHandler::new("START_GA", updater)
            .with_addressing(Addressing::Linked);

        handler
            .execute(&task("run-1").with_variable("generalApplicationCaseId", "900"))
            .await
            .unwrap();

        let linked = store.snapshot(&RecordRef::linked("900")).unwrap().business_process;
        assert_eq!(linked.status, BusinessProcessStatus::Started);
        let parent = store.snapshot(&RecordRef::primary("1")).unwrap().business_process;
        assert_eq!(parent.status, BusinessProcessStatus::NotStarted);
    }
}
