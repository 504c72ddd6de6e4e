//! Task and Attempt types.

use crate::{AttemptOutcome, CoreError, TaskId, TaskStatus, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to run a piece of work, as handed to `submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Caller-supplied identifier. Generated when omitted in a manifest.
    #[serde(default = "TaskId::generate")]
    pub id: TaskId,

    /// Capability tag matched against worker capabilities.
    #[serde(rename = "type")]
    pub task_type: String,

    /// Opaque payload forwarded to the worker.
    #[serde(default)]
    pub input: Value,

    /// Higher runs earlier. Defaults to 0.
    #[serde(default)]
    pub priority: Option<i32>,
}

impl TaskSubmission {
    /// Create a new submission with default priority.
    pub fn new(id: impl Into<TaskId>, task_type: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            input,
            priority: None,
        }
    }

    /// Builder method to set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A Task represents one unit of work tracked by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Caller-supplied identifier.
    pub id: TaskId,

    /// Capability tag used for worker matching.
    #[serde(rename = "type")]
    pub task_type: String,

    /// Opaque payload forwarded to the worker.
    pub input: Value,

    /// Higher sorts earlier.
    pub priority: i32,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Worker result, set on completion.
    pub result: Option<Value>,

    /// Failure message, set on terminal failure.
    pub error: Option<String>,

    /// Retries consumed so far.
    pub retry_count: u32,

    /// When the task was submitted.
    pub created_at: DateTime<Utc>,

    /// When the task was first admitted.
    pub started_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,

    /// One entry per admission, oldest first.
    pub attempts: Vec<Attempt>,
}

impl Task {
    /// Create a pending Task from a submission.
    pub fn new(submission: TaskSubmission) -> Self {
        Self {
            id: submission.id,
            task_type: submission.task_type,
            input: submission.input,
            priority: submission.priority.unwrap_or(0),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            attempts: Vec::new(),
        }
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Get the most recent attempt, if any.
    pub fn latest_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// Whether another failure may still be retried.
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries
    }

    /// `pending -> running` on admission to `worker_id`.
    pub fn start(&mut self, worker_id: WorkerId) -> Result<(), CoreError> {
        self.transition(TaskStatus::Running)?;
        let now = Utc::now();
        self.started_at.get_or_insert(now);
        self.attempts.push(Attempt::new(worker_id, now));
        Ok(())
    }

    /// `running -> completed`.
    pub fn complete(&mut self, result: Value) -> Result<(), CoreError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
        self.finish_attempt(AttemptOutcome::Succeeded, None);
        Ok(())
    }

    /// `running -> pending`, consuming one retry.
    pub fn retry(&mut self, error: impl Into<String>, max_retries: u32) -> Result<(), CoreError> {
        if !self.can_retry(max_retries) {
            return Err(CoreError::RetryBudgetExhausted {
                retries: self.retry_count,
            });
        }
        self.transition(TaskStatus::Pending)?;
        self.retry_count += 1;
        self.finish_attempt(AttemptOutcome::Retried, Some(error.into()));
        Ok(())
    }

    /// `running -> failed`, or `pending -> failed` for tasks no worker can serve.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), CoreError> {
        self.transition(TaskStatus::Failed)?;
        let error = error.into();
        if self.latest_attempt().is_some_and(Attempt::is_in_flight) {
            self.finish_attempt(AttemptOutcome::Failed, Some(error.clone()));
        }
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `pending -> cancelled`.
    pub fn cancel(&mut self) -> Result<(), CoreError> {
        self.transition(TaskStatus::Cancelled)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), CoreError> {
        let allowed = matches!(
            (self.status, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Pending)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Pending, TaskStatus::Cancelled)
        );
        if !allowed {
            return Err(CoreError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn finish_attempt(&mut self, outcome: AttemptOutcome, error: Option<String>) {
        if let Some(attempt) = self.attempts.last_mut() {
            attempt.outcome = outcome;
            attempt.finished_at = Some(Utc::now());
            attempt.error = error;
        }
    }
}

/// One admission of a Task onto a Worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Worker the task was bound to.
    pub worker_id: WorkerId,

    /// When the attempt was admitted.
    pub started_at: DateTime<Utc>,

    /// When the attempt settled.
    pub finished_at: Option<DateTime<Utc>>,

    /// How the attempt ended.
    pub outcome: AttemptOutcome,

    /// Failure message for failed or retried attempts.
    pub error: Option<String>,
}

impl Attempt {
    fn new(worker_id: WorkerId, started_at: DateTime<Utc>) -> Self {
        Self {
            worker_id,
            started_at,
            finished_at: None,
            outcome: AttemptOutcome::InFlight,
            error: None,
        }
    }

    /// Returns true while the attempt has not settled.
    pub fn is_in_flight(&self) -> bool {
        self.outcome == AttemptOutcome::InFlight
    }
}
