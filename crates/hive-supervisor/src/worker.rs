//! The worker contract.

use async_trait::async_trait;
use hive_core::WorkerError;
use serde_json::Value;

/// An execution unit the supervisor can hand tasks to.
///
/// The supervisor never looks inside `input` or the returned value. An
/// attempt that outlives the task timeout is dropped, so implementations
/// must tolerate being cancelled at any await point.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(&self, input: Value) -> Result<Value, WorkerError>;
}
