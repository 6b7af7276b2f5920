//! # Orchestration Engine
//!
//! The external-task contract the worker depends on: fetch and lock, complete with
//! variables, report a failure with retry count and backoff, signal a named BPMN
//! error, and re-trigger previously failed tasks.

pub mod in_memory;

use crate::error::EngineError;
use crate::models::{ExternalTask, ProcessVariables};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use in_memory::{EngineCall, InMemoryEngine};

/// One topic a worker subscribes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSubscription {
    pub topic_name: String,
    pub lock_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub worker_id: String,
    pub max_tasks: u32,
    pub topics: Vec<TopicSubscription>,
}

/// Failure reported for a task that will be retried (or raise an incident at zero)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub error_message: String,
    pub error_details: Option<String>,
    /// Retries left after this failure
    pub retries: u32,
    #[serde(with = "duration_millis", rename = "retryTimeout")]
    pub retry_timeout: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(crate::logging::duration_ms(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[async_trait]
pub trait OrchestrationEngine: Send + Sync {
    async fn fetch_and_lock(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<ExternalTask>, EngineError>;

    async fn complete(
        &self,
        task: &ExternalTask,
        variables: ProcessVariables,
    ) -> Result<(), EngineError>;

    async fn handle_failure(
        &self,
        task: &ExternalTask,
        report: FailureReport,
    ) -> Result<(), EngineError>;

    async fn handle_bpmn_error(
        &self,
        task: &ExternalTask,
        error_code: &str,
        message: &str,
    ) -> Result<(), EngineError>;

    /// Ask the engine to run previously failed tasks again
    async fn retrigger(&self, external_task_ids: &[String]) -> Result<(), EngineError>;
}
