//! # Value Objects

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Attempt cap and linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_step: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// `max(1, attempts) * backoff_step`
    pub fn backoff(&self, attempts: u32) -> Duration {
        self.backoff_step.saturating_mul(attempts.max(1))
    }

    pub fn next_attempt_at(&self, attempts: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.backoff(attempts))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_linear_with_floor() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(15));
        assert_eq!(policy.backoff(1), Duration::from_secs(15));
        assert_eq!(policy.backoff(2), Duration::from_secs(30));
        assert_eq!(policy.backoff(4), Duration::from_secs(60));
    }

    #[test]
    fn test_next_attempt_at() {
        let now = DateTime::from_timestamp(1_000, 0).unwrap();
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next_attempt_at(3, now),
            DateTime::from_timestamp(1_045, 0).unwrap()
        );
    }

    #[test]
    fn test_exhaustion() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(4));
        assert!(policy.is_exhausted(5));
        assert!(policy.is_exhausted(6));
    }
}
