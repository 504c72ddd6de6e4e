//! Shared supervisor state.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Notify, RwLock};

use crate::config::SupervisorConfig;
use crate::queue::TaskQueue;
use crate::registry::WorkerRegistry;

/// Everything guarded by the state lock.
pub(crate) struct State {
    pub registry: WorkerRegistry,
    pub queue: TaskQueue,
}

impl State {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            registry: WorkerRegistry::new(config.circuit_breaker),
            queue: TaskQueue::default(),
        }
    }
}

/// State shared between the supervisor handle and in-flight attempts.
pub(crate) struct Shared {
    pub config: SupervisorConfig,

    /// Registry and queue. Never held across a worker call.
    pub state: RwLock<State>,

    /// Set while a dispatch loop is running.
    pub running: AtomicBool,

    /// Wakes the dispatch loop when a task settles or a worker frees up.
    pub wake: Notify,
}

impl Shared {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            state: RwLock::new(State::new(&config)),
            config,
            running: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Claim the dispatch loop. Returns None if another loop holds it.
    pub fn try_claim(&self) -> Option<RunningGuard<'_>> {
        if self.running.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(RunningGuard(&self.running))
        }
    }

    /// Whether a dispatch loop holds the claim.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Clears the running flag on drop, including when the loop future is
/// dropped mid-flight.
pub(crate) struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
