//! Worker information types.

use crate::{TaskId, WorkerId, WorkerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookkeeping for a registered worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// Registry key.
    pub worker_id: WorkerId,

    /// Task types this worker may serve.
    pub capabilities: Vec<String>,

    /// Health gate. Unhealthy workers are never selected.
    pub healthy: bool,

    /// Task currently bound to this worker.
    pub current_task: Option<TaskId>,

    /// When the worker was (re-)registered.
    pub registered_at: DateTime<Utc>,
}

impl WorkerInfo {
    /// Create a healthy, idle WorkerInfo.
    pub fn new<I, S>(worker_id: WorkerId, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            worker_id,
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            healthy: true,
            current_task: None,
            registered_at: Utc::now(),
        }
    }

    /// Check if this worker advertises the given task type.
    pub fn supports(&self, task_type: &str) -> bool {
        self.capabilities.iter().any(|c| c == task_type)
    }

    /// Derived availability.
    pub fn status(&self) -> WorkerStatus {
        if !self.healthy {
            WorkerStatus::Unhealthy
        } else if self.current_task.is_some() {
            WorkerStatus::Busy
        } else {
            WorkerStatus::Idle
        }
    }

    /// Healthy, idle and capable of serving `task_type`.
    pub fn is_eligible_for(&self, task_type: &str) -> bool {
        self.status().can_accept_tasks() && self.supports(task_type)
    }

    /// Bind a task. Returns false if the worker is already bound.
    pub fn bind(&mut self, task_id: TaskId) -> bool {
        if self.current_task.is_some() {
            return false;
        }
        self.current_task = Some(task_id);
        true
    }

    /// Release the binding if it is held by `task_id`.
    pub fn release(&mut self, task_id: &TaskId) -> bool {
        if self.current_task.as_ref() == Some(task_id) {
            self.current_task = None;
            true
        } else {
            false
        }
    }
}
