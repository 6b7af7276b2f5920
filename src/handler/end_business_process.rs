use super::{continue_owned_run, Addressing, ExternalTaskData, TaskHandler};
use crate::error::HandlerResult;
use crate::models::{ExternalTask, RecordRef};
use crate::record_store::OptimisticRecordUpdater;
use crate::state_machine::{
    BusinessProcessEvent, BusinessProcessStateMachine, BusinessProcessStatus,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Terminal status an end task moves the business process to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOutcome {
    #[default]
    Finished,
    Dispatched,
}

impl EndOutcome {
    fn event(self) -> BusinessProcessEvent {
        match self {
            EndOutcome::Finished => BusinessProcessEvent::Finish,
            EndOutcome::Dispatched => BusinessProcessEvent::Dispatch,
        }
    }
}

/// Ends the business process owned by the delivering run
#[derive(Debug)]
pub struct EndBusinessProcessHandler {
    topic: String,
    updater: OptimisticRecordUpdater,
    addressing: Addressing,
    outcome: EndOutcome,
}

impl EndBusinessProcessHandler {
    pub fn new(topic: impl Into<String>, updater: OptimisticRecordUpdater) -> Self {
        Self {
            topic: topic.into(),
            updater,
            addressing: Addressing::Primary,
            outcome: EndOutcome::Finished,
        }
    }

    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_outcome(mut self, outcome: EndOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

#[async_trait]
impl TaskHandler for EndBusinessProcessHandler {
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
        let bp = &mut session.record.business_process;

        // A redelivered end task finds the run already released
        if matches!(
            bp.status,
            BusinessProcessStatus::Finished | BusinessProcessStatus::Dispatched
        ) && bp.process_instance_id.is_none()
        {
            debug!(record = %record_ref, status = %bp.status, "Business process already ended");
            return Ok(Some(ExternalTaskData::unchanged(session.record)));
        }

        let run_id = task.process_instance_id.as_str();
        continue_owned_run(bp, run_id)?;

        BusinessProcessStateMachine::transition(bp, &self.outcome.event())?;
        bp.triggering_event = Some(event.clone());
        bp.activity_id = task.activity_id.clone();

        let committed = self.updater.submit_update(session).await?;
        info!(
            record = %record_ref,
            status = %committed.business_process.status,
            process_instance_id = %run_id,
            "Business process ended"
        );
        Ok(Some(ExternalTaskData::committed(committed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::error_codes;
    use crate::error::HandlerError;
    use crate::models::{BusinessProcess, CaseRecord};
    use crate::record_store::InMemoryRecordStore;
    use std::sync::Arc;

    fn setup(bp: BusinessProcess) -> (Arc<InMemoryRecordStore>, OptimisticRecordUpdater) {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(RecordRef::primary("1"), CaseRecord::new("1", bp));
        let updater = OptimisticRecordUpdater::new(store.clone());
        (store, updater)
    }

    fn task(run_id: &str) -> ExternalTask {
        ExternalTask::new("ext-2", "END_BUSINESS_PROCESS", run_id)
            .with_variable("caseId", "1")
            .with_variable("caseEvent", "END_BUSINESS_PROCESS")
    }

    fn started_by(run_id: &str) -> BusinessProcess {
        BusinessProcess::new(BusinessProcessStatus::Started).with_process_instance_id(run_id)
    }

    #[tokio::test]
    async fn test_owner_finishes_and_releases_record() {
        let (store, updater) = setup(started_by("run-1"));
        let handler = EndBusinessProcessHandler::new("END_BUSINESS_PROCESS", updater);

        handler.execute(&task("run-1")).await.unwrap();

        let bp = store.snapshot(&RecordRef::primary("1")).unwrap().business_process;
        assert_eq!(bp.status, BusinessProcessStatus::Finished);
        assert!(bp.process_instance_id.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_outcome() {
        let (store, updater) = setup(started_by("run-1"));
        let handler = EndBusinessProcessHandler::new("DISPATCH", updater)
            .with_outcome(EndOutcome::Dispatched);

        handler.execute(&task("run-1")).await.unwrap();

        let bp = store.snapshot(&RecordRef::primary("1")).unwrap().business_process;
        assert_eq!(bp.status, BusinessProcessStatus::Dispatched);
    }

    #[tokio::test]
    async fn test_other_run_cannot_end() {
        let (store, updater) = setup(started_by("run-2"));
        let handler = EndBusinessProcessHandler::new("END_BUSINESS_PROCESS", updater);

        let err = handler.execute(&task("run-1")).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::BusinessAbort { ref error_code, .. }
                if error_code == error_codes::NOT_OWNER
        ));
        assert_eq!(store.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_already_finished_is_noop() {
        let (store, updater) = setup(BusinessProcess::new(BusinessProcessStatus::Finished));
        let handler = EndBusinessProcessHandler::new("END_BUSINESS_PROCESS", updater);

        let data = handler.execute(&task("run-1")).await.unwrap().unwrap();
        assert!(!data.committed);
        assert_eq!(store.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_retriggered_end_task_resumes_failed_run() {
        let mut failed = started_by("run-1");
        let fail = BusinessProcessEvent::fail("run-1", "ext-2");
        BusinessProcessStateMachine::transition(&mut failed, &fail).unwrap();
        let (store, updater) = setup(failed);
        let handler = EndBusinessProcessHandler::new("END_BUSINESS_PROCESS", updater);

        handler.execute(&task("run-1")).await.unwrap();

        let bp = store.snapshot(&RecordRef::primary("1")).unwrap().business_process;
        assert_eq!(bp.status, BusinessProcessStatus::Finished);
        assert!(bp.failed_external_task_id.is_none());
    }

    #[tokio::test]
    async fn test_failed_run_of_another_owner_stays_failed() {
        let mut failed = started_by("run-2");
        let fail = BusinessProcessEvent::fail("run-2", "ext-2");
        BusinessProcessStateMachine::transition(&mut failed, &fail).unwrap();
        let (store, updater) = setup(failed);
        let handler = EndBusinessProcessHandler::new("END_BUSINESS_PROCESS", updater);

        let err = handler.execute(&task("run-1")).await.unwrap_err();

        assert!(matches!(
            err,
            HandlerError::BusinessAbort { ref error_code, .. }
                if error_code == error_codes::NOT_OWNER
        ));
        assert_eq!(
            store.snapshot(&RecordRef::primary("1")).unwrap().business_process.status,
            BusinessProcessStatus::Failed
        );
    }
}
