//! Built-in demo workers.

use std::time::Duration;

use async_trait::async_trait;
use hive_supervisor::{Supervisor, Worker, WorkerError};
use serde::Deserialize;
use serde_json::{json, Value};

/// Returns its input unchanged.
pub struct EchoWorker;

#[async_trait]
impl Worker for EchoWorker {
    async fn run(&self, input: Value) -> Result<Value, WorkerError> {
        Ok(input)
    }
}

/// Sleeps for `input.ms` milliseconds.
pub struct SleepWorker;

#[derive(Default, Deserialize)]
struct SleepInput {
    #[serde(default)]
    ms: u64,
}

#[async_trait]
impl Worker for SleepWorker {
    async fn run(&self, input: Value) -> Result<Value, WorkerError> {
        let SleepInput { ms } = match input {
            Value::Null => SleepInput::default(),
            input => serde_json::from_value(input)?,
        };
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(json!({ "slept_ms": ms }))
    }
}

/// Always fails with `input.message`.
pub struct FailWorker;

#[async_trait]
impl Worker for FailWorker {
    async fn run(&self, input: Value) -> Result<Value, WorkerError> {
        let message = input
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("demo failure");
        Err(WorkerError::new(message))
    }
}

/// Demo worker ids and the task types they serve.
pub const DEMO_WORKERS: [(&str, &[&str]); 3] = [
    ("echo", &["echo"]),
    ("sleep", &["sleep"]),
    ("fail", &["fail"]),
];

/// Registers the echo, sleep and fail workers in `DEMO_WORKERS` order.
pub async fn register_demo_workers(supervisor: &Supervisor) {
    let [(echo, echo_types), (sleep, sleep_types), (fail, fail_types)] = DEMO_WORKERS;
    supervisor
        .register_worker(echo, EchoWorker, echo_types.iter().copied())
        .await;
    supervisor
        .register_worker(sleep, SleepWorker, sleep_types.iter().copied())
        .await;
    supervisor
        .register_worker(fail, FailWorker, fail_types.iter().copied())
        .await;
}
