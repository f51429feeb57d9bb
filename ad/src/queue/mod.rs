//! Priority task queue, worker pool and retry controller
//!
//! Pending tasks live in a min-priority heap. Workers move them to the
//! in-flight set, call the matching processor under a deadline, and hand the
//! outcome to the retry controller. Failed attempts are re-inserted from a
//! background sleeper so no worker waits out a backoff.

mod config;
mod core;
mod entry;
mod error;
mod metrics;
mod report;
mod retry;
mod worker;

pub use config::QueueConfig;
pub use core::TaskQueue;
pub use entry::{CancelOutcome, EnqueueResult, PoolStatus, QueueEntry, QueueStats};
pub use error::{MAX_ERROR_CHARS, TaskError, truncate_error};
pub use report::{Reporter, TaskUpdate};
pub use retry::{RetryDecision, RetryPolicy};
pub use worker::WorkerPool;
