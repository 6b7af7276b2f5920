//! Builders for wiring the in-memory engine and record store into a worker.

use casework_core::config::WorkerConfig;
use casework_core::engine::InMemoryEngine;
use casework_core::handler::TaskHandler;
use casework_core::models::{BusinessProcess, CaseRecord, ExternalTask, RecordRef};
use casework_core::record_store::{InMemoryRecordStore, OptimisticRecordUpdater};
use casework_core::state_machine::BusinessProcessStatus;
use casework_core::worker::{ExternalTaskWorker, HandlerRegistry};
use std::sync::Arc;

pub struct Harness {
    pub engine: Arc<InMemoryEngine>,
    pub store: Arc<InMemoryRecordStore>,
    pub updater: OptimisticRecordUpdater,
}

impl Harness {
    pub fn new() -> Self {
        let engine = Arc::new(InMemoryEngine::new());
        let store = Arc::new(InMemoryRecordStore::new());
        let updater = OptimisticRecordUpdater::new(store.clone());
        Self {
            engine,
            store,
            updater,
        }
    }

    pub fn with_record(self, record_ref: RecordRef, record: CaseRecord) -> Self {
        self.store.insert(record_ref, record);
        self
    }

    pub fn worker(&self, handlers: Vec<Arc<dyn TaskHandler>>) -> ExternalTaskWorker {
        self.worker_with_config(WorkerConfig::default(), handlers)
    }

    pub fn worker_with_config(
        &self,
        config: WorkerConfig,
        handlers: Vec<Arc<dyn TaskHandler>>,
    ) -> ExternalTaskWorker {
        let mut registry = HandlerRegistry::new();
        for handler in handlers {
            registry.register(handler).expect("unique topics");
        }
        ExternalTaskWorker::new(config, self.engine.clone(), self.updater.clone(), registry)
    }

    pub fn business_process(&self, record_ref: &RecordRef) -> BusinessProcess {
        self.store
            .snapshot(record_ref)
            .expect("record exists")
            .business_process
    }
}

pub fn record(id: &str, status: BusinessProcessStatus, owner: Option<&str>) -> CaseRecord {
    let mut bp = BusinessProcess::new(status);
    bp.process_instance_id = owner.map(str::to_string);
    CaseRecord::new(id, bp)
}

pub fn case_task(id: &str, topic: &str, run_id: &str, case_id: &str, event: &str) -> ExternalTask {
    ExternalTask::new(id, topic, run_id)
        .with_variable("caseId", case_id)
        .with_variable("caseEvent", event)
}
