//! Domain types for autodev
//!
//! Core domain types: Task, its typed payload, priorities and the trigger
//! events that produce tasks.

mod event;
mod payload;
mod priority;
mod task;

pub use event::{RepoRef, ScheduledTrigger, TriggerEvent};
pub use payload::{IssueSnapshot, PullRequestSnapshot, TaskPayload, TaskType};
pub use priority::Priority;
pub use task::{
    EntityKind, EntityRef, InvalidTransition, NewTask, RepoId, Task, TaskStatus, UserId, generate_task_id,
};
