//! Worker registry.

use std::sync::Arc;

use hive_core::{TaskId, WorkerId, WorkerInfo};
use tokio::time::Instant;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::worker::Worker;

/// A worker entry: bookkeeping plus the executable handle.
pub(crate) struct RegisteredWorker {
    pub info: WorkerInfo,
    pub worker: Arc<dyn Worker>,
    breaker: Option<CircuitBreaker>,
}

/// Registered workers, in registration order.
#[derive(Default)]
pub(crate) struct WorkerRegistry {
    workers: Vec<RegisteredWorker>,
    breaker_config: Option<CircuitBreakerConfig>,
}

impl WorkerRegistry {
    /// An empty registry. Every worker gets a breaker if `breaker_config` is set.
    pub fn new(breaker_config: Option<CircuitBreakerConfig>) -> Self {
        Self {
            workers: Vec::new(),
            breaker_config,
        }
    }

    /// Add or replace a worker. Returns true if an entry was replaced.
    ///
    /// A replaced entry keeps its position and any task still bound to it,
    /// and starts over with a closed circuit.
    pub fn register(
        &mut self,
        worker_id: WorkerId,
        worker: Arc<dyn Worker>,
        capabilities: Vec<String>,
    ) -> bool {
        let mut info = WorkerInfo::new(worker_id, capabilities);
        let breaker = self.breaker_config.map(CircuitBreaker::new);

        match self.position(&info.worker_id) {
            Some(index) => {
                let entry = &mut self.workers[index];
                info.current_task = entry.info.current_task.take();
                entry.info = info;
                entry.worker = worker;
                entry.breaker = breaker;
                true
            }
            None => {
                self.workers.push(RegisteredWorker {
                    info,
                    worker,
                    breaker,
                });
                false
            }
        }
    }

    /// First healthy, idle worker advertising `task_type`.
    pub fn select(&self, task_type: &str) -> Option<&RegisteredWorker> {
        self.workers
            .iter()
            .find(|w| w.info.is_eligible_for(task_type))
    }

    /// Whether any registered worker, in any state, advertises `task_type`.
    pub fn serves(&self, task_type: &str) -> bool {
        self.workers.iter().any(|w| w.info.supports(task_type))
    }

    /// Bookkeeping for one worker.
    pub fn get(&self, worker_id: &WorkerId) -> Option<&WorkerInfo> {
        self.workers
            .iter()
            .find(|w| &w.info.worker_id == worker_id)
            .map(|w| &w.info)
    }

    /// Mutable bookkeeping for one worker.
    pub fn get_mut(&mut self, worker_id: &WorkerId) -> Option<&mut WorkerInfo> {
        self.entry_mut(worker_id).map(|w| &mut w.info)
    }

    /// Bind `task_id` to an idle worker. Returns false if the worker is
    /// unknown or already bound.
    pub fn bind(&mut self, worker_id: &WorkerId, task_id: TaskId) -> bool {
        self.get_mut(worker_id)
            .is_some_and(|info| info.bind(task_id))
    }

    /// Free the worker if it is still bound to `task_id`.
    pub fn release(&mut self, worker_id: &WorkerId, task_id: &TaskId) -> bool {
        self.get_mut(worker_id)
            .is_some_and(|info| info.release(task_id))
    }

    /// Bookkeeping for every worker, in registration order.
    pub fn infos(&self) -> impl Iterator<Item = &WorkerInfo> {
        self.workers.iter().map(|w| &w.info)
    }

    /// Operator override of the health gate. Also closes the worker's
    /// circuit, so the breaker never undoes the decision.
    pub fn set_health(&mut self, worker_id: &WorkerId, healthy: bool) -> bool {
        let Some(entry) = self.entry_mut(worker_id) else {
            return false;
        };
        entry.info.healthy = healthy;
        if let Some(breaker) = entry.breaker.as_mut() {
            breaker.reset();
        }
        true
    }

    /// Circuit state of a worker, if it has a breaker.
    pub fn circuit(&self, worker_id: &WorkerId) -> Option<CircuitState> {
        self.workers
            .iter()
            .find(|w| &w.info.worker_id == worker_id)?
            .breaker
            .as_ref()
            .map(CircuitBreaker::state)
    }

    /// Feed an attempt outcome to the worker's breaker and mirror the
    /// circuit onto the health gate. Returns the new state if it changed.
    pub fn record_outcome(
        &mut self,
        worker_id: &WorkerId,
        succeeded: bool,
        now: Instant,
    ) -> Option<CircuitState> {
        let entry = self.entry_mut(worker_id)?;
        let breaker = entry.breaker.as_mut()?;

        let changed = if succeeded {
            breaker.record_success()
        } else {
            breaker.record_failure(now)
        };
        if !changed {
            return None;
        }
        entry.info.healthy = breaker.allows();
        Some(breaker.state())
    }

    /// Let open circuits whose reset timeout has passed go half-open, which
    /// makes their workers selectable again. Returns those workers.
    pub fn poll_breakers(&mut self, now: Instant) -> Vec<WorkerId> {
        let mut reopened = Vec::new();
        for entry in &mut self.workers {
            let Some(breaker) = entry.breaker.as_mut() else {
                continue;
            };
            if breaker.poll(now) {
                entry.info.healthy = true;
                reopened.push(entry.info.worker_id.clone());
            }
        }
        reopened
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    fn position(&self, worker_id: &WorkerId) -> Option<usize> {
        self.workers
            .iter()
            .position(|w| &w.info.worker_id == worker_id)
    }

    fn entry_mut(&mut self, worker_id: &WorkerId) -> Option<&mut RegisteredWorker> {
        self.workers
            .iter_mut()
            .find(|w| &w.info.worker_id == worker_id)
    }
}
