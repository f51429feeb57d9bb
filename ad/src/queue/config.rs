//! Queue and worker pool configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound for worker count (reserved for elastic scaling)
    #[serde(default = "default_max_workers", rename = "max-workers")]
    pub max_workers: usize,

    /// How often an idle worker polls the queue, in milliseconds
    #[serde(default = "default_poll_interval_ms", rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Hard deadline for a single processor call, in seconds
    #[serde(default = "default_task_timeout_secs", rename = "task-timeout-secs")]
    pub task_timeout_secs: u64,

    /// Attempts allowed when a task does not set its own limit
    #[serde(default = "default_max_attempts", rename = "max-attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit; retry N waits N times this, in milliseconds
    #[serde(default = "default_retry_delay_ms", rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Amount added to the numeric priority on every retry
    #[serde(default = "default_retry_priority_step", rename = "retry-priority-step")]
    pub retry_priority_step: i32,
}

fn default_workers() -> usize {
    3
}

fn default_max_workers() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    30_000
}

fn default_retry_priority_step() -> i32 {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_workers: default_max_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            task_timeout_secs: default_task_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_priority_step: default_retry_priority_step(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn retry_delay_unit(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
