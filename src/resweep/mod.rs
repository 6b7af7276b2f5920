//! # Failed Task Resweep
//!
//! Records whose business process was stamped FAILED carry the id of the external
//! task that exhausted its retries. The resweeper collects those ids and asks the
//! engine to run each one again, once per sweep. It never changes record state: the
//! re-run task goes through the normal claim and retry path.

use crate::config::ResweepConfig;
use crate::constants::defaults;
use crate::engine::OrchestrationEngine;
use crate::error::HandlerResult;
use crate::handler::{ExternalTaskData, TaskHandler};
use crate::logging::{duration_ms, log_error};
use crate::models::{ExternalTask, RecordRef};
use crate::record_store::RecordSearch;
use crate::state_machine::BusinessProcessStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    /// Distinct failed task ids found
    pub candidates: usize,
    pub retriggered: Vec<String>,
    pub rejected: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Clone)]
pub struct Resweeper {
    search: Arc<dyn RecordSearch>,
    engine: Arc<dyn OrchestrationEngine>,
}

impl std::fmt::Debug for Resweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resweeper").finish_non_exhaustive()
    }
}

impl Resweeper {
    pub fn new(search: Arc<dyn RecordSearch>, engine: Arc<dyn OrchestrationEngine>) -> Self {
        Self { search, engine }
    }

    /// Find every FAILED record with a failed task id and re-trigger each id once
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> HandlerResult<SweepSummary> {
        let started = Instant::now();
        let failed = self
            .search
            .find_by_business_process_status(BusinessProcessStatus::Failed)
            .await?;

        let task_ids: BTreeSet<String> = failed
            .iter()
            .filter(|record| record.business_process.is_resweep_candidate())
            .filter_map(|record| record.business_process.failed_external_task_id.clone())
            .collect();

        let mut summary = SweepSummary {
            candidates: task_ids.len(),
            ..SweepSummary::default()
        };

        for task_id in task_ids {
            match self.engine.retrigger(std::slice::from_ref(&task_id)).await {
                Ok(()) => summary.retriggered.push(task_id),
                Err(error) => {
                    log_error("Resweeper", "retrigger", &error.to_string(), Some(&task_id));
                    summary.rejected.push(task_id);
                }
            }
        }

        summary.duration_ms = duration_ms(started.elapsed());
        info!(
            candidates = summary.candidates,
            retriggered = summary.retriggered.len(),
            rejected = summary.rejected.len(),
            duration_ms = summary.duration_ms,
            "Resweep completed"
        );
        Ok(summary)
    }
}

/// Runs a [`Resweeper`] sweep when the engine's scheduled job task fires
#[derive(Debug)]
pub struct RetriggerFailedTasksHandler {
    topic: String,
    resweeper: Resweeper,
}

impl RetriggerFailedTasksHandler {
    pub fn new(topic: impl Into<String>, resweeper: Resweeper) -> Self {
        Self {
            topic: topic.into(),
            resweeper,
        }
    }

    /// Subscribe on the configured resweep topic
    pub fn from_config(config: &ResweepConfig, resweeper: Resweeper) -> Self {
        Self::new(config.topic.clone(), resweeper)
    }
}

#[async_trait]
impl TaskHandler for RetriggerFailedTasksHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(defaults::SWEEP_MAX_ATTEMPTS)
    }

    fn record_ref(&self, _task: &ExternalTask) -> HandlerResult<Option<RecordRef>> {
        Ok(None)
    }

    async fn execute(&self, _task: &ExternalTask) -> HandlerResult<Option<ExternalTaskData>> {
        let summary = self.resweeper.sweep().await?;
        Ok(Some(
            ExternalTaskData::default()
                .with_metadata("retriggered", summary.retriggered.len())
                .with_metadata("rejected", summary.rejected.len()),
        ))
    }
}
