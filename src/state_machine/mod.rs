// State machine module for business process bookkeeping
//
// The business process embedded in every case record moves through
// NOT_STARTED -> READY -> STARTED -> FINISHED/DISPATCHED, or FAILED once a run
// exhausts its retries. Guards decide whether a fresh run may claim a record.

pub mod business_process_machine;
pub mod errors;
pub mod events;
pub mod guards;
pub mod states;

// Re-export main types for convenient access
pub use business_process_machine::BusinessProcessStateMachine;
pub use errors::{GuardError, GuardResult, StateMachineError, StateMachineResult};
pub use events::BusinessProcessEvent;
pub use guards::{ClaimDecision, ClaimGuard, OwnershipDecision, OwnershipGuard, StateGuard};
pub use states::BusinessProcessStatus;
