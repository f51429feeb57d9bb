//! Activity record emitted for every task milestone

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{EntityKind, RepoId, Task, TaskType};

/// Which milestone produced the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Enqueued,
    Completed,
    Retrying,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Enqueued => "enqueued",
            Self::Completed => "completed",
            Self::Retrying => "retrying",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One line in the activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub task_id: String,
    pub task_type: TaskType,
    pub repo_id: Option<RepoId>,
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub description: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActivityRecord {
    /// Build a record from a task snapshot
    pub fn for_task(kind: ActivityKind, task: &Task, duration: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            task_id: task.id.clone(),
            task_type: task.task_type(),
            repo_id: task.repo_id,
            entity_type: task.entity.kind,
            entity_id: task.entity.id,
            description: task.description(),
            success: matches!(kind, ActivityKind::Enqueued | ActivityKind::Completed),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            error: task.last_error.clone(),
        }
    }
}
