//! Handler registry, per-task error boundary, and the fetch-and-lock polling loop.

pub mod executor;
pub mod registry;
pub mod worker_loop;

pub use executor::{TaskDisposition, TaskExecutor};
pub use registry::{HandlerRegistry, RegistryStats};
pub use worker_loop::ExternalTaskWorker;
