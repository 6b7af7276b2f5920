//! # Bounded Consistency Wait
//!
//! Some downstream steps may only run once a write to one record has shown up in a
//! second, eventually consistent copy. [`BoundedConsistencyWaiter`] polls a check at a
//! fixed gap and gives up with a fatal error after a fixed number of checks. The wait
//! never retries itself; the engine re-invokes the task from the top if it must.

use super::{ExternalTaskData, TaskHandler};
use crate::config::ConsistencyConfig;
use crate::constants::{defaults, error_codes};
use crate::error::{HandlerError, HandlerResult};
use crate::logging::duration_ms;
use crate::models::{CaseRecord, ExternalTask, RecordRef};
use crate::record_store::OptimisticRecordUpdater;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedConsistencyWaiter {
    gap: Duration,
    max_attempts: u32,
}

impl Default for BoundedConsistencyWaiter {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(defaults::CONSISTENCY_GAP_MS),
            defaults::CONSISTENCY_MAX_ATTEMPTS,
        )
    }
}

impl BoundedConsistencyWaiter {
    pub fn new(gap: Duration, max_attempts: u32) -> Self {
        Self {
            gap,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &ConsistencyConfig) -> Self {
        Self::new(config.gap(), config.max_attempts)
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `check` until it reports `true`, sleeping `gap` between checks.
    ///
    /// Returns the number of checks made. A check error ends the wait immediately.
    pub async fn wait_until<F, Fut>(&self, mut check: F) -> HandlerResult<u32>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HandlerResult<bool>>,
    {
        for attempt in 1..=self.max_attempts {
            if check().await? {
                debug!(attempt, "Consistency check satisfied");
                return Ok(attempt);
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.gap).await;
            }
        }

        warn!(
            attempts = self.max_attempts,
            gap_ms = duration_ms(self.gap),
            "Consistency wait timed out"
        );
        Err(HandlerError::Fatal(format!(
            "copy not observed after {} checks",
            self.max_attempts
        )))
    }
}

/// Waits until the newest document on the linked sub-record appears on the parent case
#[derive(Debug)]
pub struct WaitForDocumentCopyHandler {
    topic: String,
    updater: OptimisticRecordUpdater,
    waiter: BoundedConsistencyWaiter,
    source_field: String,
    destination_field: String,
}

impl WaitForDocumentCopyHandler {
    /// Key compared between the two copies
    pub const NAME_KEY: &'static str = "documentName";

    pub fn new(
        topic: impl Into<String>,
        updater: OptimisticRecordUpdater,
        waiter: BoundedConsistencyWaiter,
    ) -> Self {
        Self {
            topic: topic.into(),
            updater,
            waiter,
            source_field: "generalOrderDocument".to_string(),
            destination_field: "generalOrderDocStaff".to_string(),
        }
    }

    pub fn with_fields(
        mut self,
        source_field: impl Into<String>,
        destination_field: impl Into<String>,
    ) -> Self {
        self.source_field = source_field.into();
        self.destination_field = destination_field.into();
        self
    }

    fn document_names<'a>(record: &'a CaseRecord, field: &str) -> impl Iterator<Item = &'a str> {
        record
            .case_data
            .get(field)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|doc| doc.get(Self::NAME_KEY).and_then(Value::as_str))
    }
}

#[async_trait]
impl TaskHandler for WaitForDocumentCopyHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(defaults::SWEEP_MAX_ATTEMPTS)
    }

    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn execute(&self, task: &ExternalTask) -> HandlerResult<Option<ExternalTaskData>> {
        let parent_ref = RecordRef::primary(task.case_id()?);
        let linked_ref = RecordRef::linked(task.general_application_case_id()?);

        let linked = self.updater.get(&linked_ref).await?;
        let expected = Self::document_names(&linked, &self.source_field)
            .last()
            .map(str::to_string)
            .ok_or_else(|| {
                HandlerError::business_abort(
                    error_codes::ABORT,
                    format!("{linked_ref} has no document in {}", self.source_field),
                )
            })?;

        let updater = &self.updater;
        let parent = &parent_ref;
        let field = self.destination_field.as_str();
        let wanted = expected.as_str();
        let checks = self
            .waiter
            .wait_until(move || async move {
                let record = updater.get(parent).await?;
                let found = Self::document_names(&record, field).any(|name| name == wanted);
                Ok(found)
            })
            .await?;

        info!(parent = %parent_ref, document = %expected, checks, "Document copy observed");
        Ok(Some(
            ExternalTaskData::default()
                .with_metadata("documentName", expected)
                .with_metadata("checks", checks),
        ))
    }
}
