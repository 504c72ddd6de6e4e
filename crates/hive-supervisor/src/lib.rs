//! Hive Supervisor Library
//!
//! The orchestration engine: a priority queue of tasks, a registry of
//! capability-tagged workers, and a dispatch loop that admits tasks onto
//! idle workers under a concurrency ceiling, enforces a per-task timeout and
//! retries failures within a bounded budget. Optional circuit breakers take
//! failing workers out of rotation, and optional backoff spaces out retries.

pub mod backoff;
pub mod breaker;
pub mod config;
pub mod error;
mod execution;
pub mod metrics;
mod queue;
mod registry;
mod state;
pub mod supervisor;
pub mod worker;

pub use backoff::RetryBackoff;
pub use breaker::{CircuitBreakerConfig, CircuitState};
pub use config::SupervisorConfig;
pub use error::{SupervisorError, TaskFailure};
pub use metrics::Snapshot;
pub use supervisor::Supervisor;
pub use worker::Worker;

pub use hive_core::{
    Attempt, AttemptOutcome, Task, TaskId, TaskStatus, TaskSubmission, WorkerError, WorkerId,
    WorkerInfo, WorkerStatus,
};
