//! # Optimistic Record Updater
//!
//! Handler-facing wrapper over [`RecordStore`]. A session is opened with
//! [`OptimisticRecordUpdater::start_update`], mutated in memory, and consumed by
//! [`OptimisticRecordUpdater::submit_update`]. Store conflicts surface as
//! [`HandlerError::AlreadyUpdated`] so the engine retries from the top and the
//! claim guard decides again against fresh data.

use super::{RecordStore, UpdateToken};
use crate::error::{HandlerError, HandlerResult};
use crate::logging::log_record_operation;
use crate::models::{CaseRecord, RecordRef};
use std::sync::Arc;
use std::time::Instant;
use tracing::{instrument, warn};

/// An open edit session. Consumed on submit, so a session cannot be submitted twice.
#[derive(Debug)]
pub struct UpdateSession {
    record_ref: RecordRef,
    token: UpdateToken,
    triggering_event: String,
    /// Latest record data; mutate this before submitting
    pub record: CaseRecord,
}

impl UpdateSession {
    pub fn record_ref(&self) -> &RecordRef {
        &self.record_ref
    }

    pub fn triggering_event(&self) -> &str {
        &self.triggering_event
    }
}

#[derive(Clone)]
pub struct OptimisticRecordUpdater {
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for OptimisticRecordUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticRecordUpdater").finish_non_exhaustive()
    }
}

impl OptimisticRecordUpdater {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Open a single-use edit session on `record_ref`
    #[instrument(skip(self), fields(record = %record_ref))]
    pub async fn start_update(
        &self,
        record_ref: RecordRef,
        event: &str,
    ) -> HandlerResult<UpdateSession> {
        let response = self.store.start_update(&record_ref, event).await?;

        Ok(UpdateSession {
            record_ref,
            token: response.token,
            triggering_event: response.triggering_event,
            record: response.record,
        })
    }

    /// Commit the session. A consumed or stale token is reported as already updated.
    #[instrument(skip(self, session), fields(record = %session.record_ref))]
    pub async fn submit_update(&self, session: UpdateSession) -> HandlerResult<CaseRecord> {
        let started = Instant::now();
        let UpdateSession {
            record_ref,
            token,
            triggering_event,
            record,
        } = session;

        match self.store.submit_update(&record_ref, &token, record).await {
            Ok(committed) => {
                let elapsed = format!("{}ms", started.elapsed().as_millis());
                log_record_operation(
                    "submit_update",
                    &record_ref.to_string(),
                    Some(&triggering_event),
                    "committed",
                    Some(&elapsed),
                );
                Ok(committed)
            }
            Err(error) => {
                warn!(
                    record = %record_ref,
                    triggering_event = %triggering_event,
                    error = %error,
                    "Submit rejected by record store"
                );
                Err(HandlerError::from(error))
            }
        }
    }

    /// Read the latest committed record without opening a session
    pub async fn get(&self, record_ref: &RecordRef) -> HandlerResult<CaseRecord> {
        Ok(self.store.get(record_ref).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BusinessProcess;
    use crate::record_store::InMemoryRecordStore;
    use crate::state_machine::BusinessProcessStatus;

    #[tokio::test]
    async fn test_start_then_submit_commits_mutation() {
        let store = Arc::new(InMemoryRecordStore::new());
        let record_ref = RecordRef::primary("7");
        store.insert(
            record_ref.clone(),
            CaseRecord::new("7", BusinessProcess::new(BusinessProcessStatus::Ready)),
        );
        let updater = OptimisticRecordUpdater::new(store.clone());

        let mut session = updater.start_update(record_ref.clone(), "NOTIFY").await.unwrap();
        assert_eq!(session.triggering_event(), "NOTIFY");
        session.record.case_data = serde_json::json!({"touched": true});

        let committed = updater.submit_update(session).await.unwrap();
        assert_eq!(committed.case_data["touched"], true);
        assert_eq!(store.snapshot(&record_ref).unwrap(), committed);
    }

    #[tokio::test]
    async fn test_interleaved_session_reports_already_updated() {
        let store = Arc::new(InMemoryRecordStore::new());
        let record_ref = RecordRef::primary("7");
        store.insert(record_ref.clone(), CaseRecord::new("7", BusinessProcess::default()));
        let updater = OptimisticRecordUpdater::new(store);

        let first = updater.start_update(record_ref.clone(), "A").await.unwrap();
        let second = updater.start_update(record_ref, "B").await.unwrap();
        updater.submit_update(second).await.unwrap();

        let err = updater.submit_update(first).await.unwrap_err();
        assert!(matches!(err, HandlerError::AlreadyUpdated { .. }));
    }
}
