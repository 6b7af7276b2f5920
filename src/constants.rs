//! # System Constants
//!
//! Variable names, error codes and default values shared between the worker,
//! the handlers and the orchestration engine's process models.

/// Names of variables carried on engine tasks and returned on completion
pub mod variables {
    pub const CASE_ID: &str = "caseId";
    pub const CASE_EVENT: &str = "caseEvent";
    pub const GENERAL_APPLICATION_CASE_ID: &str = "generalApplicationCaseId";
    pub const FLOW_STATE: &str = "flowState";
    pub const FLOW_FLAGS: &str = "flowFlags";
}

/// Record store event names used by the core itself
pub mod events {
    /// Event used for the compensating write when a task carries no event of its own
    pub const BUSINESS_PROCESS_FAILED: &str = "BUSINESS_PROCESS_FAILED";
}

/// BPMN error codes raised as typed business aborts
pub mod error_codes {
    /// The business process could not be started for this record
    pub const ABORT: &str = "ABORT";
    /// The same run already claimed the record (redelivered task)
    pub const DUPLICATE_DELIVERY: &str = "DUPLICATE_DELIVERY";
    /// The record is not owned by the run attempting to end it
    pub const NOT_OWNER: &str = "NOT_OWNER";
}

/// Topics the shipped handlers subscribe to by default
pub mod topics {
    pub const START_BUSINESS_PROCESS: &str = "START_BUSINESS_PROCESS";
    pub const END_BUSINESS_PROCESS: &str = "END_BUSINESS_PROCESS";
    pub const RETRIGGER_FAILED_TASKS: &str = "RETRIGGER_FAILED_TASKS";
    pub const WAIT_DOCUMENT_COPY: &str = "WAIT_DOCUMENT_COPY";
    pub const SYNC_LINKED_DOCUMENTS: &str = "SYNC_LINKED_DOCUMENTS";
}

/// Default values for retry and polling behaviour
pub mod defaults {
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Sweep and polling jobs re-run on their own schedule
    pub const SWEEP_MAX_ATTEMPTS: u32 = 1;
    pub const BASE_DELAY_MS: u64 = 1000;
    pub const CONSISTENCY_GAP_MS: u64 = 6000;
    pub const CONSISTENCY_MAX_ATTEMPTS: u32 = 10;
    pub const LOCK_DURATION_MS: u64 = 30_000;
    pub const MAX_TASKS_PER_FETCH: u32 = 10;
    pub const POLL_INTERVAL_MS: u64 = 500;
}
