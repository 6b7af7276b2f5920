//! # In-Memory Orchestration Engine
//!
//! Engine double for tests and local runs. Tasks are queued per topic, locked on
//! fetch, and every completion/failure/error/re-trigger call is recorded in order.
//! A failure with retries left puts the task back in the queue carrying the new
//! retry count; a failure at zero retries parks it as an incident until re-triggered.

use super::{FailureReport, FetchRequest, OrchestrationEngine};
use crate::error::EngineError;
use crate::models::{ExternalTask, ProcessVariables};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

/// A call the worker made against the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Completed {
        task_id: String,
        variables: ProcessVariables,
    },
    Failed {
        task_id: String,
        report: FailureReport,
    },
    BpmnError {
        task_id: String,
        error_code: String,
        message: String,
    },
    Retriggered {
        task_id: String,
    },
}

#[derive(Debug, Default)]
struct EngineState {
    pending: VecDeque<ExternalTask>,
    locked: HashMap<String, ExternalTask>,
    incidents: HashMap<String, ExternalTask>,
    calls: Vec<EngineCall>,
    rejected_retriggers: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: Mutex<EngineState>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_task(&self, task: ExternalTask) {
        self.state.lock().pending.push_back(task);
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn incident_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().incidents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn failures(&self) -> Vec<FailureReport> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Failed { report, .. } => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn retriggered_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Retriggered { task_id } => Some(task_id),
                _ => None,
            })
            .collect()
    }

    /// Make re-trigger requests for `task_id` fail
    pub fn reject_retrigger(&self, task_id: impl Into<String>) {
        self.state.lock().rejected_retriggers.insert(task_id.into());
    }

    fn take_locked(
        state: &mut EngineState,
        task: &ExternalTask,
    ) -> Result<ExternalTask, EngineError> {
        state
            .locked
            .remove(&task.id)
            .ok_or_else(|| EngineError::TaskNotFound {
                task_id: task.id.clone(),
            })
    }
}

#[async_trait]
impl OrchestrationEngine for InMemoryEngine {
    async fn fetch_and_lock(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<ExternalTask>, EngineError> {
        let mut state = self.state.lock();
        let topics: HashSet<&str> = request
            .topics
            .iter()
            .map(|topic| topic.topic_name.as_str())
            .collect();

        let mut fetched = Vec::new();
        let mut remaining = VecDeque::with_capacity(state.pending.len());
        while let Some(mut task) = state.pending.pop_front() {
            let wanted = topics.contains(task.topic_name.as_str());
            if wanted && fetched.len() < request.max_tasks as usize {
                task.worker_id = request.worker_id.clone();
                fetched.push(task);
            } else {
                remaining.push_back(task);
            }
        }
        state.pending = remaining;

        for task in &fetched {
            state.locked.insert(task.id.clone(), task.clone());
        }
        Ok(fetched)
    }

    async fn complete(
        &self,
        task: &ExternalTask,
        variables: ProcessVariables,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        Self::take_locked(&mut state, task)?;
        state.calls.push(EngineCall::Completed {
            task_id: task.id.clone(),
            variables,
        });
        Ok(())
    }

    async fn handle_failure(
        &self,
        task: &ExternalTask,
        report: FailureReport,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let mut locked = Self::take_locked(&mut state, task)?;
        locked.retries = Some(report.retries);
        if report.retries > 0 {
            state.pending.push_back(locked);
        } else {
            state.incidents.insert(locked.id.clone(), locked);
        }
        state.calls.push(EngineCall::Failed {
            task_id: task.id.clone(),
            report,
        });
        Ok(())
    }

    async fn handle_bpmn_error(
        &self,
        task: &ExternalTask,
        error_code: &str,
        message: &str,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        Self::take_locked(&mut state, task)?;
        state.calls.push(EngineCall::BpmnError {
            task_id: task.id.clone(),
            error_code: error_code.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn retrigger(&self, external_task_ids: &[String]) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(rejected) = external_task_ids
            .iter()
            .find(|id| state.rejected_retriggers.contains(*id))
        {
            return Err(EngineError::RequestFailed {
                operation: "retrigger".to_string(),
                reason: format!("engine rejected re-trigger of {rejected}"),
            });
        }

        for id in external_task_ids {
            if let Some(mut task) = state.incidents.remove(id) {
                task.retries = Some(1);
                state.pending.push_back(task);
            }
            state.calls.push(EngineCall::Retriggered {
                task_id: id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TopicSubscription;
    use std::time::Duration;

    fn request(topic: &str, max_tasks: u32) -> FetchRequest {
        FetchRequest {
            worker_id: "worker-a".to_string(),
            max_tasks,
            topics: vec![TopicSubscription {
                topic_name: topic.to_string(),
                lock_duration_ms: 1000,
            }],
        }
    }

    #[tokio::test]
    async fn test_fetch_respects_topic_and_limit() {
        let engine = InMemoryEngine::new();
        engine.push_task(ExternalTask::new("1", "A", "run"));
        engine.push_task(ExternalTask::new("2", "B", "run"));
        engine.push_task(ExternalTask::new("3", "A", "run"));

        let fetched = engine.fetch_and_lock(&request("A", 1)).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, "1");
        assert_eq!(fetched[0].worker_id, "worker-a");
        assert_eq!(engine.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_zero_retry_failure_becomes_incident_until_retriggered() {
        let engine = InMemoryEngine::new();
        engine.push_task(ExternalTask::new("1", "A", "run"));
        let task = engine.fetch_and_lock(&request("A", 5)).await.unwrap().remove(0);

        engine
            .handle_failure(
                &task,
                FailureReport {
                    error_message: "boom".to_string(),
                    error_details: None,
                    retries: 0,
                    retry_timeout: Duration::ZERO,
                },
            )
            .await
            .unwrap();
        assert_eq!(engine.incident_ids(), vec!["1".to_string()]);
        assert_eq!(engine.pending_count(), 0);

        engine.retrigger(&["1".to_string()]).await.unwrap();
        assert!(engine.incident_ids().is_empty());
        let refetched = engine.fetch_and_lock(&request("A", 5)).await.unwrap();
        assert_eq!(refetched[0].retries, Some(1));
    }

    #[tokio::test]
    async fn test_completing_unlocked_task_fails() {
        let engine = InMemoryEngine::new();
        let err = engine
            .complete(&ExternalTask::new("9", "A", "run"), ProcessVariables::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TaskNotFound { .. }));
    }
}
