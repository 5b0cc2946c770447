//! Bounded retries with linear backoff.

use jobtrack_core::ScanningConfig;
use std::time::Duration;

/// Default fetch attempts per application.
pub const MAX_RETRIES: u32 = 3;

/// Default base delay for retry backoff.
pub const RETRY_DELAY_MS: u64 = 2000;

/// Default extra multiplier after an anti-bot block.
pub const BLOCKED_BACKOFF_MULTIPLIER: u64 = 3;

/// How often and how patiently to retry one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    blocked_multiplier: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: Duration::from_millis(RETRY_DELAY_MS),
            blocked_multiplier: BLOCKED_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` tries (at least one).
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            blocked_multiplier: BLOCKED_BACKOFF_MULTIPLIER,
        }
    }

    /// Fetch policy from configuration.
    #[must_use]
    pub fn fetch_from_config(config: &ScanningConfig) -> Self {
        Self::new(
            config.max_fetch_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
        .with_blocked_multiplier(config.blocked_backoff_multiplier)
    }

    /// Sheet write policy from configuration.
    #[must_use]
    pub fn write_from_config(config: &ScanningConfig) -> Self {
        Self::new(
            config.max_write_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    #[must_use]
    pub fn with_blocked_multiplier(mut self, multiplier: u64) -> Self {
        self.blocked_multiplier = multiplier.max(1);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Pause after failed attempt number `attempt` (1-based).
    ///
    /// `base × attempt`, times the blocked multiplier when the failure was an
    /// anti-bot block.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, blocked: bool) -> Duration {
        let multiplier = if blocked { self.blocked_multiplier } else { 1 };
        let factor = u32::try_from(multiplier.saturating_mul(u64::from(attempt)))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_constants() {
        const _: () = assert!(MAX_RETRIES > 0);
        const _: () = assert!(MAX_RETRIES <= 5);
        const _: () = assert!(RETRY_DELAY_MS >= 1000);
        const _: () = assert!(BLOCKED_BACKOFF_MULTIPLIER > 1);
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, false), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2, false), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2, true), Duration::from_millis(600));
    }

    #[test]
    fn test_attempt_bound() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn test_from_config() {
        let config = ScanningConfig::default();
        let fetch = RetryPolicy::fetch_from_config(&config);
        assert_eq!(fetch.max_attempts(), config.max_fetch_attempts);
        assert_eq!(
            fetch.delay_for(1, true),
            Duration::from_millis(config.retry_delay_ms * config.blocked_backoff_multiplier)
        );
        let write = RetryPolicy::write_from_config(&config);
        assert_eq!(write.max_attempts(), config.max_write_attempts);
    }
}
