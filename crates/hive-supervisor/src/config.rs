//! Supervisor configuration.

use std::time::Duration;

use crate::backoff::RetryBackoff;
use crate::breaker::CircuitBreakerConfig;
use crate::error::SupervisorError;

/// Supervisor configuration. Fixed once the supervisor is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Maximum number of tasks running at once.
    pub max_concurrent_tasks: usize,

    /// Deadline for a single attempt.
    pub task_timeout: Duration,

    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,

    /// Fallback wake-up interval for the dispatch loop.
    pub poll_interval: Duration,

    /// Per-worker circuit breaker. None leaves health to `set_worker_health`.
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    /// Delay before a retried task is eligible again. None retries at once.
    pub retry_backoff: Option<RetryBackoff>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            task_timeout: Duration::from_millis(60_000),
            max_retries: 3,
            poll_interval: Duration::from_millis(100),
            circuit_breaker: None,
            retry_backoff: None,
        }
    }
}

impl SupervisorConfig {
    /// Set the concurrency ceiling.
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Set the per-attempt deadline.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set the number of retries after the first failed attempt.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the dispatch loop's fallback wake-up interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable a circuit breaker on every worker.
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Delay retried tasks with exponential backoff.
    pub fn with_retry_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    /// Reject settings under which no task could ever finish.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.max_concurrent_tasks == 0 {
            return Err(SupervisorError::InvalidConfig(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.task_timeout.is_zero() {
            return Err(SupervisorError::InvalidConfig(
                "task_timeout must be non-zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(SupervisorError::InvalidConfig(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if let Some(breaker) = &self.circuit_breaker {
            if breaker.failure_threshold == 0 || breaker.half_open_requests == 0 {
                return Err(SupervisorError::InvalidConfig(
                    "circuit breaker thresholds must be at least 1".to_string(),
                ));
            }
        }
        if let Some(backoff) = &self.retry_backoff {
            if backoff.max_delay < backoff.base_delay {
                return Err(SupervisorError::InvalidConfig(
                    "retry_backoff.max_delay must not be below base_delay".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.max_concurrent_tasks, 5);
        assert_eq!(config.task_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
        assert!(config.circuit_breaker.is_none());
        assert!(config.retry_backoff.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_ceiling() {
        let config = SupervisorConfig::default().with_max_concurrent_tasks(0);
        assert!(matches!(
            config.validate(),
            Err(SupervisorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = SupervisorConfig::default().with_task_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_breaker_threshold() {
        let breaker = CircuitBreakerConfig {
            failure_threshold: 0,
            ..CircuitBreakerConfig::default()
        };
        let config = SupervisorConfig::default().with_circuit_breaker(breaker);
        assert!(config.validate().is_err());

        let config = config.with_circuit_breaker(CircuitBreakerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let backoff = RetryBackoff::new(Duration::from_secs(5), Duration::from_secs(1));
        let config = SupervisorConfig::default().with_retry_backoff(backoff);
        assert!(config.validate().is_err());
    }
}
