//! Core domain errors.

use thiserror::Error;

use crate::TaskStatus;

/// Errors raised by task lifecycle transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The requested transition is not an edge of the task state machine.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: TaskStatus, to: TaskStatus },

    /// The retry budget is already spent.
    #[error("Retry budget exhausted after {retries} retries")]
    RetryBudgetExhausted { retries: u32 },
}

/// Failure reported by a worker's `run`.
///
/// Only the message survives; it becomes the task's `error` once the
/// retry budget is spent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct WorkerError {
    message: String,
}

impl WorkerError {
    /// Create a new WorkerError with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message, verbatim.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for WorkerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for WorkerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Invalid input: {err}"))
    }
}
