//! Per-worker circuit breaker.
//!
//! A breaker watches the outcome of every attempt a worker runs. Enough
//! consecutive failures open the circuit and take the worker out of
//! selection; once the reset timeout has passed it is let back in half-open,
//! and a run of successes closes the circuit again.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Circuit breaker thresholds, shared by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed attempts that open the circuit.
    pub failure_threshold: u32,

    /// How long an open circuit stays open after its last failure.
    pub reset_timeout: Duration,

    /// Successful attempts needed to close a half-open circuit.
    pub half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_requests: 1,
        }
    }
}

/// Circuit state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing; the worker is held out of selection.
    Open,
    /// On probation after the reset timeout.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failures: u32,
    half_open_successes: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failures: 0,
            half_open_successes: 0,
            last_failure: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether the worker may be selected.
    pub fn allows(&self) -> bool {
        self.state != CircuitState::Open
    }

    /// Move an open circuit to half-open once the reset timeout has passed.
    /// Returns true on that transition.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.state != CircuitState::Open {
            return false;
        }
        let elapsed = self
            .last_failure
            .map_or(self.config.reset_timeout, |at| now.duration_since(at));
        if elapsed < self.config.reset_timeout {
            return false;
        }

        self.state = CircuitState::HalfOpen;
        self.half_open_successes = 0;
        true
    }

    /// Record a successful attempt. Returns true if the circuit closed.
    pub fn record_success(&mut self) -> bool {
        match self.state {
            CircuitState::HalfOpen => {
                self.half_open_successes += 1;
                if self.half_open_successes < self.config.half_open_requests {
                    return false;
                }
                self.state = CircuitState::Closed;
                self.failures = 0;
                true
            }
            CircuitState::Closed | CircuitState::Open => {
                self.failures = 0;
                false
            }
        }
    }

    /// Record a failed attempt. Returns true if the circuit opened.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.failures = self.failures.saturating_add(1);
        self.last_failure = Some(now);

        let trips = self.state == CircuitState::HalfOpen
            || self.failures >= self.config.failure_threshold;
        if !trips || self.state == CircuitState::Open {
            return false;
        }
        self.state = CircuitState::Open;
        true
    }

    /// Close the circuit and forget past failures.
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(10),
            half_open_requests: 2,
        }
    }

    #[test]
    fn test_opens_after_threshold() {
        let mut breaker = CircuitBreaker::new(config());
        let now = Instant::now();

        assert!(!breaker.record_failure(now));
        assert!(!breaker.record_failure(now));
        assert!(breaker.allows());
        assert!(breaker.record_failure(now));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allows());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut breaker = CircuitBreaker::new(config());
        let now = Instant::now();

        breaker.record_failure(now);
        breaker.record_failure(now);
        assert!(!breaker.record_success());
        breaker.record_failure(now);
        breaker.record_failure(now);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_reset_timeout() {
        let mut breaker = CircuitBreaker::new(config());
        let opened = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(opened);
        }

        assert!(!breaker.poll(opened + Duration::from_secs(9)));
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.poll(opened + Duration::from_secs(10)));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.allows());
        assert!(!breaker.poll(opened + Duration::from_secs(11)));
    }

    #[test]
    fn test_half_open_closes_after_enough_successes() {
        let mut breaker = CircuitBreaker::new(config());
        let opened = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(opened);
        }
        breaker.poll(opened + Duration::from_secs(10));

        assert!(!breaker.record_success());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.record_success());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let mut breaker = CircuitBreaker::new(config());
        let opened = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(opened);
        }
        let trial = opened + Duration::from_secs(10);
        breaker.poll(trial);

        assert!(breaker.record_failure(trial));
        assert_eq!(breaker.state(), CircuitState::Open);
        // The reset timeout restarts from the latest failure.
        assert!(!breaker.poll(trial + Duration::from_secs(5)));
        assert!(breaker.poll(trial + Duration::from_secs(10)));
    }

    #[test]
    fn test_reset_closes() {
        let mut breaker = CircuitBreaker::new(config());
        let now = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(now);
        }

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(!breaker.record_failure(now));
    }

    #[test]
    fn test_state_wire_format() {
        let json = serde_json::to_string(&CircuitState::HalfOpen).unwrap();
        assert_eq!(json, "\"half-open\"");
        assert_eq!(CircuitState::Open.to_string(), "open");
    }
}
