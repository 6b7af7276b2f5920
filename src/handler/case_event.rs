//! Generic mid-process handler: applies a [`CaseMutation`] to the record owned by the
//! delivering run and submits it under the task's case event.

use super::{continue_owned_run, Addressing, ExternalTaskData, FlowStateResolver, TaskHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::models::{ExternalTask, ProcessVariables, RecordRef};
use crate::record_store::OptimisticRecordUpdater;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, instrument};

/// Change applied to the case payload inside an update session
pub trait CaseMutation: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, task: &ExternalTask, case_data: &mut Value) -> HandlerResult<()>;
}

/// Overwrites top-level payload fields with fixed values
#[derive(Debug, Clone, Default)]
pub struct SetFieldsMutation {
    fields: Map<String, Value>,
}

impl SetFieldsMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }
}

impl CaseMutation for SetFieldsMutation {
    fn name(&self) -> &str {
        "set_fields"
    }

    fn apply(&self, task: &ExternalTask, case_data: &mut Value) -> HandlerResult<()> {
        if case_data.is_null() {
            *case_data = Value::Object(Map::new());
        }
        let object = case_data.as_object_mut().ok_or_else(|| {
            HandlerError::InvalidInput(format!(
                "case data for task {} is not an object",
                task.id
            ))
        })?;
        for (field, value) in &self.fields {
            object.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}

pub struct CaseEventTaskHandler {
    topic: String,
    updater: OptimisticRecordUpdater,
    mutation: Arc<dyn CaseMutation>,
    addressing: Addressing,
    flow_state: Option<Arc<dyn FlowStateResolver>>,
}

impl std::fmt::Debug for CaseEventTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseEventTaskHandler")
            .field("topic", &self.topic)
            .field("mutation", &self.mutation.name())
            .field("addressing", &self.addressing)
            .finish_non_exhaustive()
    }
}

impl CaseEventTaskHandler {
    pub fn new(
        topic: impl Into<String>,
        updater: OptimisticRecordUpdater,
        mutation: Arc<dyn CaseMutation>,
    ) -> Self {
        Self {
            topic: topic.into(),
            updater,
            mutation,
            addressing: Addressing::Primary,
            flow_state: None,
        }
    }

    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    /// Return the flow state of the committed record on completion
    pub fn with_flow_state_resolver(mut self, resolver: Arc<dyn FlowStateResolver>) -> Self {
        self.flow_state = Some(resolver);
        self
    }
}

#[async_trait]
impl TaskHandler for CaseEventTaskHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn record_ref(&self, task: &ExternalTask) -> HandlerResult<Option<RecordRef>> {
        Ok(Some(self.addressing.resolve(task)?))
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, mutation = self.mutation.name()))]
    async fn execute(&self, task: &ExternalTask) -> HandlerResult<Option<ExternalTaskData>> {
        let record_ref = self.addressing.resolve(task)?;
        let event = task.case_event()?;
        let mut session = self.updater.start_update(record_ref.clone(), &event).await?;

        continue_owned_run(&mut session.record.business_process, &task.process_instance_id)?;

        self.mutation.apply(task, &mut session.record.case_data)?;
        let bp = &mut session.record.business_process;
        bp.triggering_event = Some(event.clone());
        bp.activity_id = task.activity_id.clone();

        let committed = self.updater.submit_update(session).await?;
        info!(record = %record_ref, triggering_event = %event, "Case event applied");
        Ok(Some(ExternalTaskData::committed(committed)))
    }

    fn completion_variables(
        &self,
        _task: &ExternalTask,
        data: Option<&ExternalTaskData>,
    ) -> Option<ProcessVariables> {
        let resolver = self.flow_state.as_ref()?;
        let record = data?.record.as_ref()?;
        resolver
            .evaluate(record)
            .map(|state| ProcessVariables::from_flow_state(&state))
    }
}
