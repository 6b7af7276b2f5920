//! Data shapes exchanged with the record store and the orchestration engine.

pub mod business_process;
pub mod case_record;
pub mod external_task;
pub mod variables;

pub use business_process::BusinessProcess;
pub use case_record::{CaseRecord, RecordRef};
pub use external_task::ExternalTask;
pub use variables::{FlowState, ProcessVariables};
