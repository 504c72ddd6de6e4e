//! Supervisor errors and failure classification.

use std::time::Duration;

use hive_core::{CoreError, TaskId, TaskStatus, WorkerError, WorkerId};
use thiserror::Error;

/// Errors returned by the supervisor API.
///
/// Per-task failures are recorded on the task; only `delegate` reports them here.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Task already submitted: {0}")]
    DuplicateTask(TaskId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {id} cannot be cancelled while {status}")]
    NotCancellable { id: TaskId, status: TaskStatus },

    #[error("Worker not found: {0}")]
    WorkerNotFound(WorkerId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A delegated task settled without a result.
    #[error("Task {id} {status}: {error}")]
    TaskFailed {
        id: TaskId,
        status: TaskStatus,
        error: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Why an attempt did not produce a result.
///
/// Timeouts, worker errors and panics all count the same against the retry
/// budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskFailure {
    #[error("Task timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("Worker panicked: {0}")]
    Panicked(String),

    #[error("No registered worker serves task type '{0}'")]
    Unroutable(String),
}

impl TaskFailure {
    /// Whether the retry budget applies.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unroutable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let timeout = TaskFailure::Timeout(Duration::from_millis(50));
        assert_eq!(timeout.to_string(), "Task timeout after 50ms");

        let worker = TaskFailure::from(WorkerError::new("git exited with 128"));
        assert_eq!(worker.to_string(), "git exited with 128");
        assert!(worker.is_retryable());

        assert!(!TaskFailure::Unroutable("lint".into()).is_retryable());
    }

    #[test]
    fn test_task_failed_message() {
        let err = SupervisorError::TaskFailed {
            id: TaskId::new("t1"),
            status: TaskStatus::Failed,
            error: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Task t1 failed: boom");
    }
}
