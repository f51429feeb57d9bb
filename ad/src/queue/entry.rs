//! Queue types: heap entries, operation outcomes, and dashboard snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Priority, RepoId, Task, TaskStatus, TaskType};

/// Result of an enqueue attempt
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    Enqueued(Task),

    /// A task with this id is already pending, retrying or in flight
    Duplicate { task_id: String },
}

impl EnqueueResult {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued(_))
    }

    pub fn task(&self) -> Option<&Task> {
        match self {
            Self::Enqueued(task) => Some(task),
            Self::Duplicate { .. } => None,
        }
    }

    pub fn into_task(self) -> Option<Task> {
        match self {
            Self::Enqueued(task) => Some(task),
            Self::Duplicate { .. } => None,
        }
    }
}

/// Result of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// Removed from the pending heap
    Cancelled,

    /// Its retry re-insertion was called off
    RetryCancelled,

    /// Already executing; only the timeout can stop it
    InFlight,

    NotFound,
}

/// Pending heap entry
///
/// `BinaryHeap` is a max-heap, so the "greatest" entry is the one with the
/// smallest priority value, then the smallest insertion sequence.
#[derive(Debug, Clone)]
pub(crate) struct QueuedTask {
    pub task: Task,
    pub seq: u64,
}

impl Eq for QueuedTask {}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority == other.task.priority && self.seq == other.seq
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .task
            .priority
            .cmp(&self.task.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether any worker loop is alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Running,
    Stopped,
}

/// Point-in-time queue metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub retrying: usize,
    pub workers: usize,
    pub total_enqueued: u64,
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_retried: u64,
    pub total_cancelled: u64,
    pub average_duration_ms: f64,
    pub status: PoolStatus,
}

/// One row of the queue listing for dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub task_id: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub status: TaskStatus,
    pub repo_id: Option<RepoId>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&Task> for QueueEntry {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            task_type: task.task_type(),
            priority: task.priority,
            status: task.status,
            repo_id: task.repo_id,
            attempt_count: task.attempt_count,
            max_attempts: task.max_attempts,
            created_at: task.created_at,
            started_at: task.started_at,
        }
    }
}
