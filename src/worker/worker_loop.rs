//! # External Task Worker
//!
//! Fetch-and-lock polling loop. Each cycle fetches up to `max_tasks` tasks for the
//! registered topics and runs them concurrently through the [`TaskExecutor`]. The loop
//! idles for the poll interval when a cycle finds nothing, and checks the shutdown
//! signal between cycles.

use super::{HandlerRegistry, TaskDisposition, TaskExecutor};
use crate::config::WorkerConfig;
use crate::engine::{FetchRequest, OrchestrationEngine, TopicSubscription};
use crate::logging::log_error;
use crate::record_store::OptimisticRecordUpdater;
use crate::retry::{RetryController, RetryPolicy};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

pub struct ExternalTaskWorker {
    config: WorkerConfig,
    engine: Arc<dyn OrchestrationEngine>,
    registry: Arc<HandlerRegistry>,
    executor: TaskExecutor,
}

impl std::fmt::Debug for ExternalTaskWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalTaskWorker")
            .field("worker_id", &self.config.worker.worker_id)
            .field("topics", &self.registry.topics())
            .finish_non_exhaustive()
    }
}

impl ExternalTaskWorker {
    pub fn new(
        config: WorkerConfig,
        engine: Arc<dyn OrchestrationEngine>,
        updater: OptimisticRecordUpdater,
        registry: HandlerRegistry,
    ) -> Self {
        let registry = Arc::new(registry);
        let retry = RetryController::new(
            engine.clone(),
            updater,
            RetryPolicy::from_config(&config.retry),
        );
        let executor = TaskExecutor::new(engine.clone(), registry.clone(), retry);

        Self {
            config,
            engine,
            registry,
            executor,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    fn fetch_request(&self) -> FetchRequest {
        let settings = &self.config.worker;
        FetchRequest {
            worker_id: settings.worker_id.clone(),
            max_tasks: settings.max_tasks,
            topics: self
                .registry
                .topics()
                .into_iter()
                .map(|topic_name| TopicSubscription {
                    topic_name,
                    lock_duration_ms: settings.lock_duration_ms,
                })
                .collect(),
        }
    }

    /// Run one fetch-and-execute cycle; returns the number of tasks handled
    #[instrument(skip(self), fields(worker_id = %self.config.worker.worker_id))]
    pub async fn poll_once(&self) -> usize {
        self.poll_cycle().await.len()
    }

    /// Like [`poll_once`](Self::poll_once) but returns each task's disposition
    pub async fn poll_cycle(&self) -> Vec<(String, TaskDisposition)> {
        if self.registry.is_empty() {
            return Vec::new();
        }

        let tasks = match self.engine.fetch_and_lock(&self.fetch_request()).await {
            Ok(tasks) => tasks,
            Err(error) => {
                log_error("ExternalTaskWorker", "fetch_and_lock", &error.to_string(), None);
                return Vec::new();
            }
        };
        if tasks.is_empty() {
            return Vec::new();
        }

        debug!(count = tasks.len(), "Fetched external tasks");
        join_all(tasks.iter().map(|task| async move {
            let disposition = self.executor.execute(task).await;
            (task.id.clone(), disposition)
        }))
        .await
    }

    /// Poll until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            worker_id = %self.config.worker.worker_id,
            topics = ?self.registry.topics(),
            "External task worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let handled = self.poll_once().await;
            if handled > 0 {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.worker.poll_interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(worker_id = %self.config.worker.worker_id, "External task worker stopped");
    }
}
