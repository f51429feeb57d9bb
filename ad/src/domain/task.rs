//! The Task record and its lifecycle

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::payload::{TaskPayload, TaskType};
use super::priority::Priority;

/// Repository identifier (opaque to the scheduler)
pub type RepoId = i64;

/// User identifier (opaque to the scheduler)
pub type UserId = i64;

/// Lifecycle status of a task
///
/// ```text
/// queued -> processing -> completed
///                      -> retrying -> queued
///                      -> failed
/// queued | processing -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Queued, Cancelled)
                | (Processing, Completed)
                | (Processing, Retrying)
                | (Processing, Failed)
                | (Processing, Cancelled)
                | (Retrying, Queued)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid task transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Kind of entity a task is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Issue,
    PullRequest,
    Repository,
    #[default]
    System,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Issue => "issue",
            Self::PullRequest => "pull_request",
            Self::Repository => "repository",
            Self::System => "system",
        };
        f.write_str(s)
    }
}

/// Correlation pointer to the entity a task concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// A unit of automation work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub payload: TaskPayload,
    pub priority: Priority,
    pub repo_id: Option<RepoId>,
    pub user_id: Option<UserId>,
    pub entity: EntityRef,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub status: TaskStatus,
    pub last_error: Option<String>,
    /// Advisory output set on success; not persisted
    pub result: Option<serde_json::Value>,
}

impl Task {
    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }

    pub fn description(&self) -> String {
        self.payload.describe()
    }

    /// Apply a status change if the state machine allows it
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Whether another attempt is allowed after the current failure count
    pub fn has_attempts_left(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}

/// Caller-side description of a task to enqueue
///
/// The queue fills in everything left unset (id, max attempts, timestamps).
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: Option<String>,
    pub payload: TaskPayload,
    pub priority: Priority,
    pub repo_id: Option<RepoId>,
    pub user_id: Option<UserId>,
    pub entity: EntityRef,
    pub max_attempts: Option<u32>,
}

impl NewTask {
    pub fn new(payload: TaskPayload) -> Self {
        Self {
            id: None,
            payload,
            priority: Priority::default(),
            repo_id: None,
            user_id: None,
            entity: EntityRef::default(),
            max_attempts: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_repo(mut self, repo_id: RepoId) -> Self {
        self.repo_id = Some(repo_id);
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_entity(mut self, kind: EntityKind, id: i64) -> Self {
        self.entity = EntityRef::new(kind, id);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }

    /// Materialize into a queued task, filling defaults
    pub fn into_task(self, default_max_attempts: u32) -> Task {
        let task_type = self.payload.task_type();
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| generate_task_id(task_type, self.entity.id));

        Task {
            id,
            payload: self.payload,
            priority: self.priority,
            repo_id: self.repo_id,
            user_id: self.user_id,
            entity: self.entity,
            created_at: Utc::now(),
            started_at: None,
            attempt_count: 0,
            max_attempts: self.max_attempts.unwrap_or(default_max_attempts).max(1),
            status: TaskStatus::Queued,
            last_error: None,
            result: None,
        }
    }
}

static LAST_ID_STAMP: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing nanosecond stamp, even when the wall clock stalls
fn monotonic_stamp() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let prev = LAST_ID_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    now.max(prev + 1)
}

/// Build a task id from its type, entity and a monotonic timestamp
pub fn generate_task_id(task_type: TaskType, entity_id: i64) -> String {
    format!("{}-{}-{}", task_type, entity_id, monotonic_stamp())
}
