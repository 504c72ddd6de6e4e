//! The supervisor: submission, dispatch loop and status queries.

use std::sync::Arc;

use hive_core::{Task, TaskId, TaskStatus, TaskSubmission, WorkerId, WorkerInfo};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::breaker::CircuitState;
use crate::config::SupervisorConfig;
use crate::error::{SupervisorError, TaskFailure};
use crate::execution::{self, Admitted};
use crate::metrics::Snapshot;
use crate::queue::TaskQueue;
use crate::registry::WorkerRegistry;
use crate::state::{Shared, State};
use crate::worker::Worker;

/// Coordinates a pool of workers against a priority queue of tasks.
///
/// Cloning yields another handle onto the same queue and registry.
/// Independent supervisors share nothing.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Supervisor {
    /// Create a supervisor with the given configuration.
    pub fn new(config: SupervisorConfig) -> Result<Self, SupervisorError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new(config)),
        })
    }

    /// The configuration this supervisor was built with.
    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }

    /// Whether a dispatch loop is currently running.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Add or replace a worker. The entry starts out healthy.
    pub async fn register_worker<W, I, S>(
        &self,
        worker_id: impl Into<WorkerId>,
        worker: W,
        capabilities: I,
    ) where
        W: Worker + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let worker_id = worker_id.into();
        let capabilities: Vec<String> = capabilities.into_iter().map(Into::into).collect();

        let replaced = {
            let mut state = self.shared.state.write().await;
            state
                .registry
                .register(worker_id.clone(), Arc::new(worker), capabilities.clone())
        };

        info!(
            worker_id = %worker_id,
            capabilities = ?capabilities,
            replaced,
            "Worker registered"
        );
        self.shared.wake.notify_one();
    }

    /// Flip a worker's health gate. This also closes its circuit.
    pub async fn set_worker_health(
        &self,
        worker_id: &WorkerId,
        healthy: bool,
    ) -> Result<(), SupervisorError> {
        let found = self
            .shared
            .state
            .write()
            .await
            .registry
            .set_health(worker_id, healthy);
        if !found {
            return Err(SupervisorError::WorkerNotFound(worker_id.clone()));
        }

        if healthy {
            info!(worker_id = %worker_id, "Worker marked healthy");
            self.shared.wake.notify_one();
        } else {
            warn!(worker_id = %worker_id, "Worker marked unhealthy");
        }
        Ok(())
    }

    /// One worker's bookkeeping.
    pub async fn worker(&self, worker_id: &WorkerId) -> Option<WorkerInfo> {
        let state = self.shared.state.read().await;
        state.registry.get(worker_id).cloned()
    }

    /// A worker's circuit state. None if the worker is unknown or no
    /// circuit breaker is configured.
    pub async fn circuit_state(&self, worker_id: &WorkerId) -> Option<CircuitState> {
        self.shared.state.read().await.registry.circuit(worker_id)
    }

    /// All workers, in registration order.
    pub async fn workers(&self) -> Vec<WorkerInfo> {
        self.shared
            .state
            .read()
            .await
            .registry
            .infos()
            .cloned()
            .collect()
    }

    /// Queue a task. Returns immediately; execution happens in `orchestrate`.
    pub async fn submit(&self, submission: TaskSubmission) -> Result<TaskId, SupervisorError> {
        let task_id = {
            let mut state = self.shared.state.write().await;
            if state.queue.contains(&submission.id) {
                return Err(SupervisorError::DuplicateTask(submission.id));
            }

            let task = Task::new(submission);
            let task_id = task.id.clone();
            info!(
                task_id = %task_id,
                task_type = %task.task_type,
                priority = task.priority,
                "Task submitted"
            );
            state.queue.push(task);
            task_id
        };

        self.shared.wake.notify_one();
        Ok(task_id)
    }

    /// Withdraw a task that has not been admitted yet.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<Task, SupervisorError> {
        let mut state = self.shared.state.write().await;

        let status = state
            .queue
            .get(task_id)
            .map(|task| task.status)
            .ok_or_else(|| SupervisorError::TaskNotFound(task_id.clone()))?;
        if status != TaskStatus::Pending {
            return Err(SupervisorError::NotCancellable {
                id: task_id.clone(),
                status,
            });
        }

        let mut task = state
            .queue
            .remove_pending(task_id)
            .ok_or_else(|| SupervisorError::TaskNotFound(task_id.clone()))?;
        task.cancel()?;
        state.queue.archive(task.clone());

        info!(task_id = %task_id, "Task cancelled");
        Ok(task)
    }

    /// Current record of a task: archive first, then active, then pending.
    pub async fn get_status(&self, task_id: &TaskId) -> Option<Task> {
        self.shared.state.read().await.queue.get(task_id).cloned()
    }

    /// Every known task: archived, then running, then pending in queue order.
    pub async fn tasks(&self) -> Vec<Task> {
        let state = self.shared.state.read().await;

        let mut archived: Vec<Task> = state.queue.completed().cloned().collect();
        archived.sort_by_key(|task| task.completed_at);
        let mut running: Vec<Task> = state.queue.active().cloned().collect();
        running.sort_by_key(|task| task.started_at);

        archived
            .into_iter()
            .chain(running)
            .chain(state.queue.pending().cloned())
            .collect()
    }

    /// Pending task ids in dispatch order.
    pub async fn pending_ids(&self) -> Vec<TaskId> {
        self.shared
            .state
            .read()
            .await
            .queue
            .pending()
            .map(|task| task.id.clone())
            .collect()
    }

    /// Task and worker counts by status.
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot::collect(&*self.shared.state.read().await)
    }

    /// Dispatch until the queue and the active set are both empty.
    ///
    /// Returns at once if another dispatch loop on this supervisor is
    /// already running. Per-task failures are recorded on the tasks.
    pub async fn orchestrate(&self) {
        let Some(_guard) = self.shared.try_claim() else {
            debug!("Dispatch loop already running");
            return;
        };

        info!(
            max_concurrent_tasks = self.shared.config.max_concurrent_tasks,
            "Dispatch loop started"
        );

        while let Cycle::Wait(deadline) = self.admit().await {
            tokio::select! {
                _ = self.shared.wake.notified() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        info!("Dispatch loop drained");
    }

    /// Submit a task and drive dispatch until it settles.
    ///
    /// Returns the task's result, or `TaskFailed` with its error if it
    /// failed or was cancelled.
    pub async fn delegate(&self, submission: TaskSubmission) -> Result<Value, SupervisorError> {
        let task_id = self.submit(submission).await?;

        loop {
            self.orchestrate().await;

            let task = self
                .get_status(&task_id)
                .await
                .ok_or_else(|| SupervisorError::TaskNotFound(task_id.clone()))?;
            if task.is_terminal() {
                return match task.status {
                    TaskStatus::Completed => Ok(task.result.unwrap_or(Value::Null)),
                    status => Err(SupervisorError::TaskFailed {
                        error: task.error.unwrap_or_else(|| status.to_string()),
                        id: task.id,
                        status,
                    }),
                };
            }

            // Another dispatch loop owns the queue; let it finish.
            tokio::time::sleep(self.config().poll_interval).await;
        }
    }

    /// One admission cycle.
    async fn admit(&self) -> Cycle {
        let config = &self.shared.config;
        let now = Instant::now();
        let mut state = self.shared.state.write().await;
        let State { registry, queue } = &mut *state;

        for worker_id in registry.poll_breakers(now) {
            info!(worker_id = %worker_id, "Circuit half-open, worker eligible again");
        }

        let mut deadline = now + config.poll_interval;
        while queue.active_len() < config.max_concurrent_tasks {
            let Some(head) = queue.head() else {
                break;
            };
            let (head_id, task_type) = (head.id.clone(), head.task_type.clone());

            // A backing-off head holds the line like a busy worker does.
            if let Some(at) = queue.head_not_before().filter(|at| *at > now) {
                debug!(task_id = %head_id, "Head task backing off");
                deadline = deadline.min(at);
                break;
            }

            let selected = registry
                .select(&task_type)
                .map(|w| (w.info.worker_id.clone(), Arc::clone(&w.worker)));

            match selected {
                Some((worker_id, worker)) => {
                    self.start_head(registry, queue, worker_id, worker);
                }
                None if registry.serves(&task_type) => {
                    // Head-of-line blocking: lower-priority work waits too.
                    debug!(task_id = %head_id, task_type = %task_type, "No idle worker for head");
                    break;
                }
                None => reject_unroutable(queue),
            }
        }

        if queue.is_idle() {
            Cycle::Drained
        } else {
            Cycle::Wait(deadline)
        }
    }

    fn start_head(
        &self,
        registry: &mut WorkerRegistry,
        queue: &mut TaskQueue,
        worker_id: WorkerId,
        worker: Arc<dyn Worker>,
    ) {
        let Some(mut task) = queue.pop_head() else {
            return;
        };

        if let Err(err) = task.start(worker_id.clone()) {
            error!(task_id = %task.id, error = %err, "Queued task not startable");
            queue.archive(task);
            return;
        }

        let bound = registry.bind(&worker_id, task.id.clone());
        debug_assert!(bound, "selected worker must be idle");

        info!(
            task_id = %task.id,
            worker_id = %worker_id,
            attempt = task.retry_count + 1,
            priority = task.priority,
            "Task admitted"
        );

        let admitted = Admitted {
            task_id: task.id.clone(),
            worker_id,
            worker,
            input: task.input.clone(),
        };
        queue.activate(task);

        tokio::spawn(execution::run_attempt(Arc::clone(&self.shared), admitted));
    }
}

/// Result of one admission cycle.
enum Cycle {
    /// Queue and active set are both empty.
    Drained,
    /// Work remains; sleep until woken or the deadline passes.
    Wait(Instant),
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared::new(SupervisorConfig::default())),
        }
    }
}

/// Fail the head task: no registered worker advertises its type.
fn reject_unroutable(queue: &mut TaskQueue) {
    let Some(mut task) = queue.pop_head() else {
        return;
    };

    let failure = TaskFailure::Unroutable(task.task_type.clone());
    match task.fail(failure.to_string()) {
        Ok(()) => warn!(task_id = %task.id, error = %failure, "Task failed"),
        Err(err) => {
            error!(task_id = %task.id, error = %err, "Queued task could not be failed");
        }
    }
    queue.archive(task);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_core::{WorkerError, WorkerStatus};
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait]
    impl Worker for Echo {
        async fn run(&self, input: Value) -> Result<Value, WorkerError> {
            Ok(input)
        }
    }

    fn submission(id: &str, task_type: &str) -> TaskSubmission {
        TaskSubmission::new(id, task_type, json!({ "id": id }))
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SupervisorConfig::default().with_max_concurrent_tasks(0);
        assert!(matches!(
            Supervisor::new(config),
            Err(SupervisorError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_is_pending_until_orchestrated() {
        let supervisor = Supervisor::default();
        supervisor.register_worker("echo", Echo, ["echo"]).await;

        let id = supervisor.submit(submission("t1", "echo")).await.unwrap();
        let task = supervisor.get_status(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);

        supervisor.orchestrate().await;

        let task = supervisor.get_status(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(json!({ "id": "t1" })));
        assert!(task.started_at.is_some() && task.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let supervisor = Supervisor::default();
        supervisor.submit(submission("t1", "echo")).await.unwrap();

        let err = supervisor
            .submit(submission("t1", "echo"))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::DuplicateTask(_)));
        assert_eq!(err.to_string(), "Task already submitted: t1");
        assert_eq!(supervisor.pending_ids().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_pending_task() {
        let supervisor = Supervisor::default();
        let id = supervisor.submit(submission("t1", "echo")).await.unwrap();

        let cancelled = supervisor.cancel(&id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(supervisor.pending_ids().await.is_empty());
        assert_eq!(
            supervisor.get_status(&id).await.unwrap().status,
            TaskStatus::Cancelled
        );

        let err = supervisor.cancel(&id).await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::NotCancellable {
                status: TaskStatus::Cancelled,
                ..
            }
        ));
        assert!(matches!(
            supervisor.cancel(&TaskId::new("missing")).await,
            Err(SupervisorError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unroutable_task_fails() {
        let supervisor = Supervisor::default();
        supervisor.register_worker("echo", Echo, ["echo"]).await;
        let lost = supervisor
            .submit(submission("lost", "translate"))
            .await
            .unwrap();
        let ok = supervisor.submit(submission("ok", "echo")).await.unwrap();

        supervisor.orchestrate().await;

        let lost = supervisor.get_status(&lost).await.unwrap();
        assert_eq!(lost.status, TaskStatus::Failed);
        assert!(lost.error.unwrap().contains("translate"));
        assert!(lost.attempts.is_empty());
        assert_eq!(
            supervisor.get_status(&ok).await.unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_worker_health_toggle() {
        let supervisor = Supervisor::default();
        supervisor.register_worker("echo", Echo, ["echo"]).await;
        let worker_id = WorkerId::new("echo");

        supervisor
            .set_worker_health(&worker_id, false)
            .await
            .unwrap();
        let info = supervisor.worker(&worker_id).await.unwrap();
        assert_eq!(info.status(), WorkerStatus::Unhealthy);

        assert!(matches!(
            supervisor
                .set_worker_health(&WorkerId::new("ghost"), true)
                .await,
            Err(SupervisorError::WorkerNotFound(_))
        ));

        // Re-registering resets the gate.
        supervisor
            .register_worker("echo", Echo, ["echo", "diff"])
            .await;
        let workers = supervisor.workers().await;
        assert_eq!(workers.len(), 1);
        assert!(workers[0].healthy);
        assert_eq!(workers[0].capabilities, vec!["echo", "diff"]);
    }

    #[tokio::test]
    async fn test_snapshot_counts() {
        let supervisor = Supervisor::default();
        supervisor.register_worker("echo", Echo, ["echo"]).await;
        supervisor.submit(submission("a", "echo")).await.unwrap();
        let b = supervisor.submit(submission("b", "echo")).await.unwrap();
        supervisor.cancel(&b).await.unwrap();

        let before = supervisor.snapshot().await;
        assert_eq!(before.pending, 1);
        assert_eq!(before.cancelled, 1);
        assert_eq!(before.workers_idle, 1);

        supervisor.orchestrate().await;

        let after = supervisor.snapshot().await;
        assert_eq!(after.outstanding(), 0);
        assert_eq!(after.completed, 1);
        assert_eq!(supervisor.tasks().await.len(), 2);
    }
}
