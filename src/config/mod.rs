//! # Worker Configuration
//!
//! Typed configuration for the worker, retry controller, consistency waiter and
//! resweeper. Values are layered by [`ConfigLoader`]: built-in defaults, then an
//! optional configuration file, then `CASEWORK__*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use casework_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let max_attempts = config.retry.max_attempts;
//! let gap = config.consistency.gap();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{defaults, topics};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration for a worker process
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker: WorkerSettings,
    pub retry: RetryConfig,
    pub consistency: ConsistencyConfig,
    pub resweep: ResweepConfig,
}

impl WorkerConfig {
    /// Reject values that would make retries or polling meaningless
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker.worker_id.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "worker.worker_id",
                "",
                "worker id must not be empty",
            ));
        }
        if self.worker.max_tasks == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker.max_tasks",
                self.worker.max_tasks,
                "must fetch at least one task",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                self.retry.max_attempts,
                "at least one attempt is required",
            ));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.base_delay_ms",
                self.retry.base_delay_ms,
                "backoff base delay must be positive",
            ));
        }
        if self.consistency.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "consistency.max_attempts",
                self.consistency.max_attempts,
                "at least one consistency check is required",
            ));
        }
        Ok(())
    }
}

/// Engine polling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerSettings {
    pub worker_id: String,
    pub max_tasks: u32,
    pub lock_duration_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            worker_id: format!("casework-worker-{}", std::process::id()),
            max_tasks: defaults::MAX_TASKS_PER_FETCH,
            lock_duration_ms: defaults::LOCK_DURATION_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl WorkerSettings {
    pub fn lock_duration(&self) -> Duration {
        Duration::from_millis(self.lock_duration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Retry budget and backoff base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay_ms: defaults::BASE_DELAY_MS,
        }
    }
}

/// Bounded consistency wait settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub gap_ms: u64,
    pub max_attempts: u32,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            gap_ms: defaults::CONSISTENCY_GAP_MS,
            max_attempts: defaults::CONSISTENCY_MAX_ATTEMPTS,
        }
    }
}

impl ConsistencyConfig {
    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResweepConfig {
    pub topic: String,
}

impl Default for ResweepConfig {
    fn default() -> Self {
        Self {
            topic: topics::RETRIGGER_FAILED_TASKS.to_string(),
        }
    }
}
