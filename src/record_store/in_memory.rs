//! # In-Memory Record Store
//!
//! Record store for tests and local runs. Tokens are minted per session and
//! removed from the outstanding set on first use, so a second submit with the same
//! token always conflicts. Each record carries a version; a token minted against an
//! older version is stale. A commit drops every outstanding token for the record it
//! made stale, so sessions that end without a submit do not accumulate.

use super::{RecordSearch, RecordStore, StartUpdateResponse, UpdateToken};
use crate::error::RecordStoreError;
use crate::models::{CaseRecord, RecordRef};
use crate::state_machine::BusinessProcessStatus;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredRecord {
    record: CaseRecord,
    version: u64,
}

#[derive(Debug, Clone)]
struct OutstandingToken {
    record: RecordRef,
    version: u64,
}

/// Record store backed by concurrent maps
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: DashMap<RecordRef, StoredRecord>,
    tokens: DashMap<UpdateToken, OutstandingToken>,
    submits: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a record outside the token protocol
    pub fn insert(&self, record_ref: RecordRef, record: CaseRecord) {
        let version = self
            .records
            .get(&record_ref)
            .map(|stored| stored.version + 1)
            .unwrap_or(0);
        self.release_stale_tokens(&record_ref, version);
        self.records
            .insert(record_ref, StoredRecord { record, version });
    }

    /// Latest committed copy, if any
    pub fn snapshot(&self, record_ref: &RecordRef) -> Option<CaseRecord> {
        self.records.get(record_ref).map(|stored| stored.record.clone())
    }

    /// Number of successful submits across all records
    pub fn submit_count(&self) -> u64 {
        self.submits.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet submitted or invalidated by a later commit
    pub fn outstanding_tokens(&self) -> usize {
        self.tokens.len()
    }

    fn release_stale_tokens(&self, record: &RecordRef, version: u64) {
        let before = self.tokens.len();
        self.tokens.retain(|_, outstanding| {
            &outstanding.record != record || outstanding.version >= version
        });
        let released = before.saturating_sub(self.tokens.len());
        if released > 0 {
            debug!(record = %record, released, "Released stale update tokens");
        }
    }

    /// Simulate the store being unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), RecordStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn start_update(
        &self,
        record: &RecordRef,
        event: &str,
    ) -> Result<StartUpdateResponse, RecordStoreError> {
        self.ensure_available()?;

        let stored = self
            .records
            .get(record)
            .map(|stored| stored.clone())
            .ok_or_else(|| RecordStoreError::NotFound {
                record: record.to_string(),
            })?;

        let token = UpdateToken::new(Uuid::new_v4().to_string());
        self.tokens.insert(
            token.clone(),
            OutstandingToken {
                record: record.clone(),
                version: stored.version,
            },
        );

        debug!(record = %record, event = %event, version = stored.version, "Update session opened");

        Ok(StartUpdateResponse {
            token,
            record: stored.record,
            triggering_event: event.to_string(),
        })
    }

    async fn submit_update(
        &self,
        record: &RecordRef,
        token: &UpdateToken,
        data: CaseRecord,
    ) -> Result<CaseRecord, RecordStoreError> {
        self.ensure_available()?;

        // Removal is the consume step: only one caller can win it
        let (_, outstanding) =
            self.tokens
                .remove(token)
                .ok_or_else(|| RecordStoreError::Conflict {
                    record: record.to_string(),
                    reason: "update token already consumed or unknown".to_string(),
                })?;

        if &outstanding.record != record {
            return Err(RecordStoreError::Conflict {
                record: record.to_string(),
                reason: format!("token was issued for {}", outstanding.record),
            });
        }

        let mut stored = self
            .records
            .get_mut(record)
            .ok_or_else(|| RecordStoreError::NotFound {
                record: record.to_string(),
            })?;

        if stored.version != outstanding.version {
            return Err(RecordStoreError::Conflict {
                record: record.to_string(),
                reason: format!(
                    "stale token: minted at version {}, record is at {}",
                    outstanding.version, stored.version
                ),
            });
        }

        stored.version += 1;
        stored.record = data;
        let version = stored.version;
        let committed = stored.record.clone();
        drop(stored);
        self.submits.fetch_add(1, Ordering::SeqCst);

        debug!(record = %record, version, "Update committed");
        self.release_stale_tokens(record, version);

        Ok(committed)
    }

    async fn get(&self, record: &RecordRef) -> Result<CaseRecord, RecordStoreError> {
        self.ensure_available()?;
        self.snapshot(record).ok_or_else(|| RecordStoreError::NotFound {
            record: record.to_string(),
        })
    }
}

#[async_trait]
impl RecordSearch for InMemoryRecordStore {
    async fn find_by_business_process_status(
        &self,
        status: BusinessProcessStatus,
    ) -> Result<Vec<CaseRecord>, RecordStoreError> {
        self.ensure_available()?;
        let mut matches: Vec<CaseRecord> = self
            .records
            .iter()
            .filter(|entry| entry.record.business_process.status == status)
            .map(|entry| entry.record.clone())
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }
}
