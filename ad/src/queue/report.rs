//! Fan task milestones out to the activity log and the hub

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityKind, ActivityLog, ActivityRecord};
use crate::domain::{EntityRef, Priority, RepoId, Task, TaskStatus, TaskType};
use crate::hub::{HubHandle, HubMessage, MessageType};

/// Payload of a `task_update` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: Priority,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub repo_id: Option<RepoId>,
    pub entity: EntityRef,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&Task> for TaskUpdate {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            task_type: task.task_type(),
            status: task.status,
            priority: task.priority,
            attempt_count: task.attempt_count,
            max_attempts: task.max_attempts,
            repo_id: task.repo_id,
            entity: task.entity,
            description: task.description(),
            last_error: task.last_error.clone(),
        }
    }
}

/// Reporting sinks shared by the queue and its workers
///
/// Neither sink blocks, so reporting is safe on the hot path. Messages about
/// a task with a repository go to that repository's observers as well as
/// unfiltered ones.
#[derive(Clone)]
pub struct Reporter {
    activity: Arc<dyn ActivityLog>,
    hub: HubHandle,
}

impl Reporter {
    pub fn new(activity: Arc<dyn ActivityLog>, hub: HubHandle) -> Self {
        Self { activity, hub }
    }

    /// Status change with no activity record
    pub fn status(&self, task: &Task) {
        self.hub
            .publish(HubMessage::of(MessageType::TaskUpdate, &TaskUpdate::from(task)), task.repo_id);
    }

    /// Milestone: write an activity record and broadcast it with the new status
    pub fn milestone(&self, kind: ActivityKind, task: &Task, duration: Duration) {
        let record = ActivityRecord::for_task(kind, task, duration);
        self.hub
            .publish(HubMessage::of(MessageType::Activity, &record), task.repo_id);
        self.activity.record(record);
        self.status(task);
    }
}
