//! Point-in-time counts and their Prometheus text rendering.

use std::fmt::Write;

use hive_core::{TaskStatus, WorkerStatus};
use serde::Serialize;

use crate::state::State;

/// Counts of tasks and workers by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub workers_idle: usize,
    pub workers_busy: usize,
    pub workers_unhealthy: usize,
}

impl Snapshot {
    pub(crate) fn collect(state: &State) -> Self {
        let mut snapshot = Self {
            pending: state.queue.pending_len(),
            running: state.queue.active_len(),
            ..Self::default()
        };

        for task in state.queue.completed() {
            match task.status {
                TaskStatus::Completed => snapshot.completed += 1,
                TaskStatus::Failed => snapshot.failed += 1,
                TaskStatus::Cancelled => snapshot.cancelled += 1,
                TaskStatus::Pending | TaskStatus::Running => {}
            }
        }

        for info in state.registry.infos() {
            match info.status() {
                WorkerStatus::Idle => snapshot.workers_idle += 1,
                WorkerStatus::Busy => snapshot.workers_busy += 1,
                WorkerStatus::Unhealthy => snapshot.workers_unhealthy += 1,
            }
        }

        snapshot
    }

    /// Tasks not yet settled.
    pub fn outstanding(&self) -> usize {
        self.pending + self.running
    }
}

/// Format a snapshot in Prometheus text exposition format.
pub fn render(snapshot: &Snapshot) -> String {
    let mut output = String::new();

    writeln!(output, "# HELP hive_tasks Number of tasks by status").ok();
    writeln!(output, "# TYPE hive_tasks gauge").ok();
    for (status, count) in [
        (TaskStatus::Pending, snapshot.pending),
        (TaskStatus::Running, snapshot.running),
        (TaskStatus::Completed, snapshot.completed),
        (TaskStatus::Failed, snapshot.failed),
        (TaskStatus::Cancelled, snapshot.cancelled),
    ] {
        writeln!(output, "hive_tasks{{status=\"{status}\"}} {count}").ok();
    }

    writeln!(output).ok();
    writeln!(output, "# HELP hive_workers Number of workers by status").ok();
    writeln!(output, "# TYPE hive_workers gauge").ok();
    for (status, count) in [
        (WorkerStatus::Idle, snapshot.workers_idle),
        (WorkerStatus::Busy, snapshot.workers_busy),
        (WorkerStatus::Unhealthy, snapshot.workers_unhealthy),
    ] {
        let status = status.as_str();
        writeln!(output, "hive_workers{{status=\"{status}\"}} {count}").ok();
    }

    output
}
