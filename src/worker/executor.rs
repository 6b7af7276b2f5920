//! # Task Executor
//!
//! The error boundary around a single task. Whatever the handler returns is turned
//! into exactly one engine call: completion, a named BPMN error, or a failure report.
//! Engine call errors are logged and swallowed so one bad task never stops the worker.

use super::HandlerRegistry;
use crate::constants::error_codes;
use crate::engine::OrchestrationEngine;
use crate::error::{ErrorCategory, HandlerError};
use crate::handler::TaskHandler;
use crate::logging::{duration_ms, log_error, log_task_operation};
use crate::models::ExternalTask;
use crate::retry::{FailureOutcome, RetryController};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, instrument, warn};

/// What the executor did with a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum TaskDisposition {
    Completed { committed: bool },
    BusinessAbort { error_code: String },
    Fatal,
    Retrying { retries_left: u32, delay_ms: u64 },
    /// Last attempt spent; `marked_failed` tells whether the FAILED write landed
    Exhausted { marked_failed: bool },
    /// No handler for the topic; the lock is left to expire
    Unhandled,
}

impl TaskDisposition {
    fn from_failure(outcome: FailureOutcome) -> Self {
        if outcome.retries_left == 0 {
            TaskDisposition::Exhausted {
                marked_failed: outcome.escalated,
            }
        } else {
            TaskDisposition::Retrying {
                retries_left: outcome.retries_left,
                delay_ms: duration_ms(outcome.delay),
            }
        }
    }

    fn status(&self) -> &'static str {
        match self {
            TaskDisposition::Completed { .. } => "completed",
            TaskDisposition::BusinessAbort { .. } => "business_abort",
            TaskDisposition::Fatal => "fatal",
            TaskDisposition::Retrying { .. } => "retrying",
            TaskDisposition::Exhausted { .. } => "exhausted",
            TaskDisposition::Unhandled => "unhandled",
        }
    }
}

#[derive(Clone)]
pub struct TaskExecutor {
    engine: Arc<dyn OrchestrationEngine>,
    registry: Arc<HandlerRegistry>,
    retry: RetryController,
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("registry", &self.registry)
            .field("policy", self.retry.policy())
            .finish_non_exhaustive()
    }
}

impl TaskExecutor {
    pub fn new(
        engine: Arc<dyn OrchestrationEngine>,
        registry: Arc<HandlerRegistry>,
        retry: RetryController,
    ) -> Self {
        Self {
            engine,
            registry,
            retry,
        }
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, topic = %task.topic_name))]
    pub async fn execute(&self, task: &ExternalTask) -> TaskDisposition {
        let started = Instant::now();
        let case_id = task.case_id().ok();

        let Some(handler) = self.registry.resolve(&task.topic_name) else {
            error!(
                task_id = %task.id,
                topic = %task.topic_name,
                "No handler registered for fetched task"
            );
            return TaskDisposition::Unhandled;
        };

        let disposition = match handler.execute(task).await {
            Ok(data) => {
                let variables = handler
                    .completion_variables(task, data.as_ref())
                    .unwrap_or_default();
                if let Err(engine_error) = self.engine.complete(task, variables).await {
                    log_error(
                        "TaskExecutor",
                        "complete",
                        &engine_error.to_string(),
                        Some(&task.id),
                    );
                }
                TaskDisposition::Completed {
                    committed: data.is_some_and(|d| d.committed),
                }
            }
            Err(handler_error) => self.dispatch_error(task, handler.as_ref(), handler_error).await,
        };

        let details = format!("{}ms", started.elapsed().as_millis());
        log_task_operation(
            "execute",
            &task.id,
            &task.topic_name,
            case_id.as_deref(),
            disposition.status(),
            Some(&details),
        );
        disposition
    }

    async fn dispatch_error(
        &self,
        task: &ExternalTask,
        handler: &dyn TaskHandler,
        handler_error: HandlerError,
    ) -> TaskDisposition {
        let category = handler_error.classify();
        warn!(
            task_id = %task.id,
            category = %category,
            error = %handler_error,
            "Task handler failed"
        );

        match category {
            ErrorCategory::BusinessAbort => {
                let (error_code, message) = match &handler_error {
                    HandlerError::BusinessAbort {
                        error_code,
                        message,
                    } => (error_code.clone(), message.clone()),
                    other => (error_codes::ABORT.to_string(), other.to_string()),
                };
                if let Err(engine_error) = self
                    .engine
                    .handle_bpmn_error(task, &error_code, &message)
                    .await
                {
                    log_error(
                        "TaskExecutor",
                        "handle_bpmn_error",
                        &engine_error.to_string(),
                        Some(&task.id),
                    );
                }
                TaskDisposition::BusinessAbort { error_code }
            }
            ErrorCategory::Fatal => {
                self.retry.report_fatal(task, &handler_error).await;
                TaskDisposition::Fatal
            }
            ErrorCategory::Transient => {
                let max_attempts = handler
                    .max_attempts()
                    .unwrap_or(self.retry.policy().max_attempts);
                let record = handler.record_ref(task).ok().flatten();
                let outcome = self
                    .retry
                    .handle_failure(task, &handler_error, max_attempts, record)
                    .await;
                TaskDisposition::from_failure(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, FetchRequest, InMemoryEngine, TopicSubscription};
    use crate::handler::StartBusinessProcessHandler;
    use crate::models::{BusinessProcess, CaseRecord, RecordRef};
    use crate::record_store::{InMemoryRecordStore, OptimisticRecordUpdater};
    use crate::retry::RetryPolicy;
    use crate::state_machine::BusinessProcessStatus;
    use std::time::Duration;

    struct Fixture {
        engine: Arc<InMemoryEngine>,
        store: Arc<InMemoryRecordStore>,
        executor: TaskExecutor,
    }

    fn fixture(status: BusinessProcessStatus, owner: Option<&str>) -> Fixture {
        let engine = Arc::new(InMemoryEngine::new());
        let store = Arc::new(InMemoryRecordStore::new());
        let mut bp = BusinessProcess::new(status);
        bp.process_instance_id = owner.map(str::to_string);
        store.insert(RecordRef::primary("1"), CaseRecord::new("1", bp));

        let updater = OptimisticRecordUpdater::new(store.clone());
        let mut registry = HandlerRegistry::new();
        registry
            .register(Arc::new(StartBusinessProcessHandler::new("START", updater.clone())))
            .unwrap();
        let retry = RetryController::new(
            engine.clone(),
            updater,
            RetryPolicy::new(3, Duration::from_millis(1000)),
        );
        let executor = TaskExecutor::new(engine.clone(), Arc::new(registry), retry);
        Fixture {
            engine,
            store,
            executor,
        }
    }

    async fn fetch(engine: &InMemoryEngine, task: ExternalTask) -> ExternalTask {
        engine.push_task(task);
        engine
            .fetch_and_lock(&FetchRequest {
                worker_id: "w".to_string(),
                max_tasks: 1,
                topics: vec![TopicSubscription {
                    topic_name: "START".to_string(),
                    lock_duration_ms: 1000,
                }],
            })
            .await
            .unwrap()
            .remove(0)
    }

    fn start_task() -> ExternalTask {
        ExternalTask::new("ext-1", "START", "run-1")
            .with_variable("caseId", "1")
            .with_variable("caseEvent", "CREATE_CLAIM")
    }

    #[tokio::test]
    async fn test_success_completes_task() {
        let f = fixture(BusinessProcessStatus::Finished, None);
        let task = fetch(&f.engine, start_task()).await;

        let disposition = f.executor.execute(&task).await;

        assert_eq!(disposition, TaskDisposition::Completed { committed: true });
        assert!(matches!(f.engine.calls()[0], EngineCall::Completed { .. }));
    }

    #[tokio::test]
    async fn test_business_abort_raises_bpmn_error() {
        let f = fixture(BusinessProcessStatus::Started, Some("run-1"));
        let task = fetch(&f.engine, start_task()).await;

        let disposition = f.executor.execute(&task).await;

        assert_eq!(
            disposition,
            TaskDisposition::BusinessAbort {
                error_code: "DUPLICATE_DELIVERY".to_string()
            }
        );
        assert!(f.engine.failures().is_empty());
        assert_eq!(f.store.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_error_goes_through_retry() {
        let f = fixture(BusinessProcessStatus::Finished, None);
        f.store.set_unavailable(true);
        let task = fetch(&f.engine, start_task()).await;

        let disposition = f.executor.execute(&task).await;

        assert_eq!(
            disposition,
            TaskDisposition::Retrying {
                retries_left: 2,
                delay_ms: 2000
            }
        );
    }

    #[tokio::test]
    async fn test_engine_error_is_swallowed() {
        let f = fixture(BusinessProcessStatus::Finished, None);
        // Never locked, so the engine rejects the completion
        let disposition = f.executor.execute(&start_task()).await;
        assert_eq!(disposition, TaskDisposition::Completed { committed: true });
        assert!(f.engine.calls().is_empty());
    }
}
