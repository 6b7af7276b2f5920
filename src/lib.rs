#![allow(clippy::doc_markdown)] // Allow technical terms like BPMN, CamelCase in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Casework Core
//!
//! Business-process task execution and retry core for case-processing workers.
//!
//! ## Overview
//!
//! Workers poll an external orchestration engine for pending units of work, mutate a
//! remote case record under optimistic concurrency control, and report success or
//! failure back to the engine with bounded, backing-off retries. Every unit of work is
//! guarded by a business-process state machine so redelivery never double-applies a
//! transition.
//!
//! ## Module Organization
//!
//! - [`models`] - Case records, business process data and engine task shapes
//! - [`state_machine`] - Business process states, events and the claim guard
//! - [`record_store`] - Optimistic start/submit update protocol and in-memory store
//! - [`engine`] - Orchestration engine contract and in-memory engine
//! - [`retry`] - Backoff policy and the failure controller
//! - [`handler`] - The task handler contract and the shipped handlers
//! - [`resweep`] - Periodic re-trigger of permanently failed tasks
//! - [`worker`] - Handler registry, task executor and polling loop
//! - [`config`] - Layered worker configuration
//! - [`logging`] - Structured logging setup and helpers
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use casework_core::config::WorkerConfig;
//! use casework_core::engine::InMemoryEngine;
//! use casework_core::handler::StartBusinessProcessHandler;
//! use casework_core::record_store::{InMemoryRecordStore, OptimisticRecordUpdater};
//! use casework_core::worker::{ExternalTaskWorker, HandlerRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkerConfig::default();
//! let engine = Arc::new(InMemoryEngine::new());
//! let store = Arc::new(InMemoryRecordStore::new());
//! let updater = OptimisticRecordUpdater::new(store.clone());
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(Arc::new(StartBusinessProcessHandler::new(
//!     "START_BUSINESS_PROCESS",
//!     updater.clone(),
//! )))?;
//!
//! let worker = ExternalTaskWorker::new(config, engine, updater, registry);
//! let handled = worker.poll_once().await;
//! println!("handled {handled} tasks");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod handler;
pub mod logging;
pub mod models;
pub mod record_store;
pub mod resweep;
pub mod retry;
pub mod state_machine;
pub mod worker;

pub use config::{ConsistencyConfig, ResweepConfig, RetryConfig, WorkerConfig, WorkerSettings};
pub use error::{CaseworkError, Result};
pub use models::{BusinessProcess, CaseRecord, ExternalTask, RecordRef};
pub use state_machine::{BusinessProcessEvent, BusinessProcessStatus, ClaimDecision};
