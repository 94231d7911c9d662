//! Linear-backoff retry decisions.

use crate::config::DispatcherConfig;
use std::time::Duration;

/// What to do with a search that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue after `delay`; `attempt` is the incremented attempt count.
    Retry { attempt: u32, delay: Duration },
    /// Retries used up; deliver an empty result.
    Exhausted,
}

/// Pure retry policy: `base_delay * attempt`, capped at `max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    #[must_use]
    pub const fn from_config(config: &DispatcherConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }

    /// Decides the fate of an entry that failed with `attempt` prior retries.
    #[must_use]
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::Exhausted;
        }
        let next = attempt + 1;
        RetryDecision::Retry {
            attempt: next,
            delay: self.base_delay.saturating_mul(next),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DispatcherConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(
            policy.decide(0),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(1000)
            }
        );
        assert_eq!(
            policy.decide(1),
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_millis(2000)
            }
        );
        assert_eq!(
            policy.decide(2),
            RetryDecision::Retry {
                attempt: 3,
                delay: Duration::from_millis(3000)
            }
        );
        assert_eq!(policy.decide(3), RetryDecision::Exhausted);
    }

    #[test]
    fn test_default_allows_two_retries() {
        let policy = RetryPolicy::default();
        assert!(matches!(policy.decide(0), RetryDecision::Retry { .. }));
        assert!(matches!(policy.decide(1), RetryDecision::Retry { .. }));
        assert_eq!(policy.decide(2), RetryDecision::Exhausted);
    }

    #[test]
    fn test_zero_retries_exhausts_immediately() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.decide(0), RetryDecision::Exhausted);
    }
}
