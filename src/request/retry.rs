//! Fixed-delay retry policy for failed attempts.
//!
//! Every [`AttemptError`](super::AttemptError) is retryable, so the decision
//! depends only on how many attempts have been made. The delay is constant:
//! it is applied between failed attempts, never before the first attempt and
//! never after the last one.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use batchfetch_core::request::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(3));
//!
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use tracing::debug;

use super::config::{DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT};

/// Decision on whether to make another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt again after the specified delay.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Stop; the last failure is terminal.
    DoNotRetry {
        /// Human-readable reason why no further attempt is made.
        reason: String,
    },
}

/// Attempt budget plus the pause between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Pause between failed attempts.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_LIMIT,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is coerced to at least 1; the request
    /// builder rejects a zero limit before a policy is ever created.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the pause between failed attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Decides what happens after `attempt` (1-indexed) has failed.
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert!(matches!(
            policy.should_retry(1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(250));

        let decision = policy.should_retry(1);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_millis(250),
                attempt: 2
            }
        );

        let decision = policy.should_retry(2);
        assert!(matches!(decision, RetryDecision::Retry { attempt: 3, .. }));

        let decision = policy.should_retry(3);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
        if let RetryDecision::DoNotRetry { reason } = decision {
            assert!(reason.contains("exhausted"));
        }
    }

    #[test]
    fn test_delay_is_constant_across_attempts() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2));
        for attempt in 1..5 {
            match policy.should_retry(attempt) {
                RetryDecision::Retry { delay, .. } => assert_eq!(delay, Duration::from_secs(2)),
                RetryDecision::DoNotRetry { reason } => panic!("unexpected stop: {reason}"),
            }
        }
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy::new(1, Duration::from_secs(3));
        assert!(matches!(
            policy.should_retry(1),
            RetryDecision::DoNotRetry { .. }
        ));
    }
}
