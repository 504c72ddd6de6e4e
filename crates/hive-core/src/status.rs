//! Status enums for Tasks, attempts and Workers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a Task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting in the pending queue.
    #[default]
    Pending,
    /// Admitted and bound to a worker.
    Running,
    /// Worker produced a result.
    Completed,
    /// Retry budget exhausted, or the task could not be routed.
    Failed,
    /// Withdrawn from the pending queue before admission.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase label, used for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single attempt of a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    /// Attempt is still running.
    InFlight,
    /// Worker returned a result.
    Succeeded,
    /// Worker failed or timed out; the task went back to the queue.
    Retried,
    /// Worker failed or timed out with no retries left.
    Failed,
}

/// Availability of a registered Worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    /// Healthy and not bound to a task.
    #[default]
    Idle,
    /// Bound to a task.
    Busy,
    /// Marked unhealthy; never selected.
    Unhealthy,
}

impl WorkerStatus {
    /// Returns true if the worker may be handed a new task.
    pub fn can_accept_tasks(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Lowercase label, used for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&TaskStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
    }
}
