//! # Record Store
//!
//! Contract for the remote case-record store and the optimistic update protocol
//! built on top of it.
//!
//! ## Protocol
//!
//! ```text
//! start_update(ref, event) ──▶ { token, record, triggering_event }
//!        │  mutate record in memory
//!        ▼
//! submit_update(ref, token, record) ──▶ committed record | Conflict
//! ```
//!
//! A token is single use. Submitting with a consumed token, or with a token minted
//! before another submit committed to the same record, fails with
//! [`RecordStoreError::Conflict`]. There is no other concurrency control.

pub mod in_memory;
pub mod updater;

use crate::error::RecordStoreError;
use crate::models::{CaseRecord, RecordRef};
use crate::state_machine::BusinessProcessStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use in_memory::InMemoryRecordStore;
pub use updater::{OptimisticRecordUpdater, UpdateSession};

/// Single-use credential required to commit an update
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateToken(String);

impl UpdateToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpdateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response to opening an edit session on a record
#[derive(Debug, Clone, PartialEq)]
pub struct StartUpdateResponse {
    pub token: UpdateToken,
    pub record: CaseRecord,
    pub triggering_event: String,
}

/// Remote record store with optimistic start/submit semantics
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Open a single-use edit session returning the latest record data
    async fn start_update(
        &self,
        record: &RecordRef,
        event: &str,
    ) -> Result<StartUpdateResponse, RecordStoreError>;

    /// Commit `data` using a token from `start_update`
    async fn submit_update(
        &self,
        record: &RecordRef,
        token: &UpdateToken,
        data: CaseRecord,
    ) -> Result<CaseRecord, RecordStoreError>;

    /// Read the latest committed record
    async fn get(&self, record: &RecordRef) -> Result<CaseRecord, RecordStoreError>;
}

/// The slice of the store's search API the resweeper consumes
#[async_trait]
pub trait RecordSearch: Send + Sync {
    async fn find_by_business_process_status(
        &self,
        status: BusinessProcessStatus,
    ) -> Result<Vec<CaseRecord>, RecordStoreError>;
}
