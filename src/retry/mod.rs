//! Retry budgets, exponential backoff and the failure escalation path.

pub mod controller;
pub mod policy;

pub use controller::{FailureOutcome, RetryController};
pub use policy::{RetryDecision, RetryPolicy};
