//! Retry policy with backoff
//!
//! Shared by the token refresher (empty responses, timeouts) and the data
//! client (transport failures).

use crate::types::BackoffType;
use std::time::Duration;

/// How many times to try an operation and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::token_refresh()
    }
}

impl RetryPolicy {
    /// Policy for the token endpoint: exponential, factor 2, five attempts
    pub fn token_refresh() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
        }
    }

    /// Policy for data requests: a transport failure is retried exactly once
    pub fn single_retry() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
            backoff_type: BackoffType::Constant,
        }
    }

    /// Never retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_type: BackoffType::Constant,
        }
    }

    /// Set the initial delay
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the number of attempts
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Check whether another attempt is allowed after `attempt` (zero-based) failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Delay to wait after the zero-based `attempt` failed
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_delay,
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.initial_delay.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_delay)
    }
}

#[cfg(test)]
mod retry_tests {
    use super::*;

    #[test]
    fn test_token_refresh_policy_doubles() {
        let policy = RetryPolicy::token_refresh();
        assert_eq!(policy.delay(0), Duration::from_secs(2));
        assert_eq!(policy.delay(1), Duration::from_secs(4));
        assert_eq!(policy.delay(2), Duration::from_secs(8));
        assert_eq!(policy.delay(3), Duration::from_secs(16));
    }

    #[test]
    fn test_attempt_cap() {
        let policy = RetryPolicy::token_refresh();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4));

        assert!(RetryPolicy::single_retry().should_retry(0));
        assert!(!RetryPolicy::single_retry().should_retry(1));
        assert!(!RetryPolicy::none().should_retry(0));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::token_refresh();
        assert_eq!(policy.delay(10), Duration::from_secs(60));
    }

    #[test]
    fn test_constant_backoff() {
        let policy = RetryPolicy::single_retry().with_initial_delay(Duration::from_millis(100));
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(3), Duration::from_millis(100));
    }
}
