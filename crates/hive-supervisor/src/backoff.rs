//! Exponential backoff for retried tasks.

use std::time::Duration;

use rand::Rng;

/// Delay before a retried task becomes eligible for admission again.
///
/// Retry `n` (1-based) waits `base_delay * 2^(n-1)` plus a random amount up
/// to `jitter`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBackoff {
    pub base_delay: Duration,
    pub max_delay: Duration,

    /// Upper bound of the random extra delay. Zero disables it.
    pub jitter: Duration,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryBackoff {
    /// Backoff without jitter.
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// The capped exponential delay for `retry`, without jitter.
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }

    /// The delay for `retry`, jitter included.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };

        self.base_delay_for(retry)
            .saturating_add(jitter)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let backoff = RetryBackoff::new(Duration::from_millis(100), Duration::from_secs(1));

        let delays: Vec<u128> = (1..=6)
            .map(|retry| backoff.delay_for(retry).as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(backoff.delay_for(64), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_zero_counts_as_first() {
        let backoff = RetryBackoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = RetryBackoff::new(Duration::from_millis(100), Duration::from_secs(10))
            .with_jitter(Duration::from_millis(50));

        for _ in 0..50 {
            let delay = backoff.delay_for(2);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(250));
        }
    }

    #[test]
    fn test_jitter_never_exceeds_cap() {
        let backoff = RetryBackoff::new(Duration::from_millis(100), Duration::from_millis(120))
            .with_jitter(Duration::from_secs(5));

        for _ in 0..50 {
            assert!(backoff.delay_for(1) <= Duration::from_millis(120));
        }
    }
}
