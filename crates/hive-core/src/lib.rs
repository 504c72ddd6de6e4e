//! Hive Core Domain Types
//!
//! This crate contains the pure domain model shared by the supervisor and
//! its callers:
//! - Task records and their attempt history
//! - Worker descriptors and availability
//! - Lifecycle status enums
//!
//! Nothing here depends on an async runtime; all lifecycle transitions are
//! plain methods on the records and are driven by the supervisor.

pub mod error;
pub mod ids;
pub mod status;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use error::{CoreError, WorkerError};
pub use ids::{TaskId, WorkerId};
pub use status::{AttemptOutcome, TaskStatus, WorkerStatus};
pub use task::{Attempt, Task, TaskSubmission};
pub use worker::WorkerInfo;
