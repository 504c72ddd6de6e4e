//! Timeout-bounded execution of a single attempt and its settlement.

use std::sync::Arc;
use std::time::Duration;

use hive_core::{CoreError, Task, TaskId, WorkerId};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::breaker::CircuitState;
use crate::error::TaskFailure;
use crate::state::Shared;
use crate::worker::Worker;

/// A task that has just been bound to a worker.
pub(crate) struct Admitted {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub worker: Arc<dyn Worker>,
    pub input: Value,
}

/// Where a settled task goes next.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Disposition {
    Archive,
    Requeue,
}

/// Run one attempt to completion or timeout, then settle it.
pub(crate) async fn run_attempt(shared: Arc<Shared>, admitted: Admitted) {
    let Admitted {
        task_id,
        worker_id,
        worker,
        input,
    } = admitted;

    let outcome = race_timeout(worker, input, shared.config.task_timeout).await;
    settle(&shared, &task_id, &worker_id, outcome).await;
    shared.wake.notify_one();
}

/// Run the worker on its own task so a panic is contained, and abort it if
/// the deadline passes first.
async fn race_timeout(
    worker: Arc<dyn Worker>,
    input: Value,
    timeout: Duration,
) -> Result<Value, TaskFailure> {
    let mut handle = tokio::spawn(async move { worker.run(input).await });

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(Ok(result))) => Ok(result),
        Ok(Ok(Err(err))) => Err(TaskFailure::Worker(err)),
        Ok(Err(join_err)) => Err(TaskFailure::Panicked(join_err.to_string())),
        Err(_) => {
            handle.abort();
            Err(TaskFailure::Timeout(timeout))
        }
    }
}

async fn settle(
    shared: &Shared,
    task_id: &TaskId,
    worker_id: &WorkerId,
    outcome: Result<Value, TaskFailure>,
) {
    let mut state = shared.state.write().await;
    let state = &mut *state;

    if !state.registry.release(worker_id, task_id) {
        warn!(task_id = %task_id, worker_id = %worker_id, "Worker not bound to settling task");
    }

    let now = Instant::now();
    match state.registry.record_outcome(worker_id, outcome.is_ok(), now) {
        Some(CircuitState::Open) => {
            warn!(worker_id = %worker_id, "Circuit opened, worker marked unhealthy");
        }
        Some(CircuitState::Closed) => info!(worker_id = %worker_id, "Circuit closed"),
        Some(CircuitState::HalfOpen) | None => {}
    }

    // Removal from the active set is the settle-once gate.
    let Some(mut task) = state.queue.take_active(task_id) else {
        warn!(task_id = %task_id, "Attempt settled for a task no longer active");
        return;
    };

    match apply_outcome(&mut task, outcome, shared.config.max_retries) {
        Ok(Disposition::Requeue) => {
            let not_before = shared
                .config
                .retry_backoff
                .map(|backoff| now + backoff.delay_for(task.retry_count));
            state.queue.requeue(task, not_before);
        }
        Ok(Disposition::Archive) => state.queue.archive(task),
        Err(err) => {
            error!(task_id = %task_id, error = %err, "Inconsistent task state on settle");
            state.queue.archive(task);
        }
    }
}

/// Apply the success / retry / fail policy to a running task.
pub(crate) fn apply_outcome(
    task: &mut Task,
    outcome: Result<Value, TaskFailure>,
    max_retries: u32,
) -> Result<Disposition, CoreError> {
    let attempt = task.retry_count + 1;

    match outcome {
        Ok(result) => {
            task.complete(result)?;
            info!(task_id = %task.id, attempt, "Task completed");
            Ok(Disposition::Archive)
        }
        Err(failure) if failure.is_retryable() && task.can_retry(max_retries) => {
            task.retry(failure.to_string(), max_retries)?;
            warn!(
                task_id = %task.id,
                attempt,
                retries_left = max_retries - task.retry_count,
                error = %failure,
                "Task attempt failed, requeueing"
            );
            Ok(Disposition::Requeue)
        }
        Err(failure) => {
            task.fail(failure.to_string())?;
            warn!(task_id = %task.id, attempt, error = %failure, "Task failed");
            Ok(Disposition::Archive)
        }
    }
}
