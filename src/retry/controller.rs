//! # Retry Controller
//!
//! Failure path for a task whose handler raised a transient error. On the last
//! attempt the record is stamped FAILED (with the run id and the external task id the
//! resweeper needs) before the failure is reported, so forensic state survives the
//! engine raising an incident.

use super::policy::{RetryDecision, RetryPolicy};
use crate::constants::events;
use crate::engine::{FailureReport, OrchestrationEngine};
use crate::error::{HandlerError, HandlerResult};
use crate::logging::{duration_ms, log_error};
use crate::models::{CaseRecord, ExternalTask, RecordRef};
use crate::record_store::OptimisticRecordUpdater;
use crate::state_machine::{BusinessProcessEvent, BusinessProcessStateMachine};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// What happened on the failure path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub retries_left: u32,
    pub delay: Duration,
    /// A compensating FAILED write was committed
    pub escalated: bool,
    /// The engine accepted the failure report
    pub reported: bool,
}

#[derive(Clone)]
pub struct RetryController {
    engine: Arc<dyn OrchestrationEngine>,
    updater: OptimisticRecordUpdater,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(
        engine: Arc<dyn OrchestrationEngine>,
        updater: OptimisticRecordUpdater,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            engine,
            updater,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Handle a transient failure with the handler's attempt budget.
    ///
    /// `record` is the record the handler works on, when it has one; the
    /// compensating write is skipped for handlers without a record.
    #[instrument(skip(self, task, error), fields(task_id = %task.id, topic = %task.topic_name))]
    pub async fn handle_failure(
        &self,
        task: &ExternalTask,
        error: &HandlerError,
        max_attempts: u32,
        record: Option<RecordRef>,
    ) -> FailureOutcome {
        let decision = self.policy.with_max_attempts(max_attempts).decide(task);

        let escalated = match (decision.escalate, record) {
            (true, Some(record_ref)) => match self.mark_failed(task, record_ref.clone()).await {
                Ok(_) => true,
                Err(mark_error) => {
                    log_error(
                        "RetryController",
                        "mark_failed",
                        &mark_error.to_string(),
                        Some(&record_ref.to_string()),
                    );
                    false
                }
            },
            _ => false,
        };

        let reported = self.report(task, error, &decision).await;

        FailureOutcome {
            retries_left: decision.retries_left,
            delay: decision.delay,
            escalated,
            reported,
        }
    }

    /// Report a non-retryable failure: zero retries, no backoff, no compensating write
    pub async fn report_fatal(&self, task: &ExternalTask, error: &HandlerError) -> FailureOutcome {
        let decision = RetryDecision {
            remaining_attempts: 1,
            retries_left: 0,
            delay: Duration::ZERO,
            escalate: false,
        };
        let reported = self.report(task, error, &decision).await;
        FailureOutcome {
            retries_left: 0,
            delay: Duration::ZERO,
            escalated: false,
            reported,
        }
    }

    async fn mark_failed(
        &self,
        task: &ExternalTask,
        record_ref: RecordRef,
    ) -> HandlerResult<CaseRecord> {
        let event = task
            .case_event()
            .unwrap_or_else(|_| events::BUSINESS_PROCESS_FAILED.to_string());
        let mut session = self.updater.start_update(record_ref, &event).await?;

        BusinessProcessStateMachine::transition(
            &mut session.record.business_process,
            &BusinessProcessEvent::fail(&task.process_instance_id, &task.id),
        )?;

        let committed = self.updater.submit_update(session).await?;
        warn!(
            case_id = %committed.id,
            process_instance_id = %task.process_instance_id,
            failed_external_task_id = %task.id,
            "Retries exhausted, business process marked FAILED"
        );
        Ok(committed)
    }

    async fn report(
        &self,
        task: &ExternalTask,
        error: &HandlerError,
        decision: &RetryDecision,
    ) -> bool {
        let report = FailureReport {
            error_message: error.to_string(),
            error_details: Some(format!("{error:?}")),
            retries: decision.retries_left,
            retry_timeout: decision.delay,
        };

        match self.engine.handle_failure(task, report).await {
            Ok(()) => {
                info!(
                    task_id = %task.id,
                    retries_left = decision.retries_left,
                    delay_ms = duration_ms(decision.delay),
                    "Failure reported to engine"
                );
                true
            }
            Err(engine_error) => {
                error!(
                    task_id = %task.id,
                    error = %engine_error,
                    "Engine rejected failure report"
                );
                false
            }
        }
    }
}
