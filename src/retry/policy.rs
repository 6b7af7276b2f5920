//! # Retry Policy
//!
//! Pure retry-budget arithmetic.
//!
//! The engine leaves `retries` empty on a task's first attempt, so the budget is seeded
//! from `max_attempts`. Every failure reports `remaining - 1` retries left, and the
//! backoff grows with the number of attempts already spent:
//!
//! ```text
//! delay = base_delay * 2^(max_attempts - retries_left)
//! ```
//!
//! With `max_attempts = 3` and a one second base the task runs three times: the first
//! two failures back off 2s then 4s, and the third is final (escalated, 0 retries).

use crate::config::RetryConfig;
use crate::models::ExternalTask;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cap on the backoff exponent so the multiplication cannot overflow
const MAX_BACKOFF_EXPONENT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// What the controller should do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Attempts left before this failure, including the one that just failed
    pub remaining_attempts: u32,
    /// Retries reported to the engine
    pub retries_left: u32,
    pub delay: Duration,
    /// The last attempt was spent: stamp the record FAILED
    pub escalate: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    /// Same base delay, different attempt budget (per-handler override)
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.base_delay)
    }

    pub fn remaining_attempts(&self, task: &ExternalTask) -> u32 {
        task.retries.unwrap_or(self.max_attempts)
    }

    pub fn backoff_delay(&self, retries_left: u32) -> Duration {
        let exponent = self
            .max_attempts
            .saturating_sub(retries_left)
            .min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(2_u32.pow(exponent))
    }

    pub fn decide(&self, task: &ExternalTask) -> RetryDecision {
        let remaining_attempts = self.remaining_attempts(task);
        let retries_left = remaining_attempts.saturating_sub(1);
        RetryDecision {
            remaining_attempts,
            retries_left,
            delay: self.backoff_delay(retries_left),
            escalate: remaining_attempts <= 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(retries: Option<u32>) -> ExternalTask {
        let mut task = ExternalTask::new("t", "topic", "run");
        task.retries = retries;
        task
    }

    #[test]
    fn test_first_attempt_seeds_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        let decision = policy.decide(&task(None));

        assert_eq!(decision.remaining_attempts, 3);
        assert_eq!(decision.retries_left, 2);
        assert_eq!(decision.delay, Duration::from_millis(2000));
        assert!(!decision.escalate);
    }

    #[test]
    fn test_three_attempts_two_backoffs_then_escalation() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));

        let first = policy.decide(&task(None));
        let second = policy.decide(&task(Some(first.retries_left)));
        let third = policy.decide(&task(Some(second.retries_left)));

        assert_eq!(first.delay, Duration::from_millis(2000));
        assert_eq!(second.delay, Duration::from_millis(4000));
        assert!(!first.escalate && !second.escalate);
        assert!(third.escalate);
        assert_eq!(third.retries_left, 0);
    }

    #[test]
    fn test_single_attempt_escalates_immediately() {
        let policy = RetryPolicy::new(1, Duration::from_millis(1000));
        let decision = policy.decide(&task(None));

        assert!(decision.escalate);
        assert_eq!(decision.retries_left, 0);
    }

    #[test]
    fn test_zero_attempt_budget_is_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_large_budgets_do_not_overflow() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1));
        let delay = policy.backoff_delay(0);
        assert_eq!(delay, Duration::from_secs(1 << MAX_BACKOFF_EXPONENT));
    }
}
