//! Translate trigger events into queued tasks

use std::sync::Arc;

use tracing::debug;

use super::config::FeatureToggles;
use crate::domain::{EntityKind, NewTask, Priority, ScheduledTrigger, TaskPayload, TriggerEvent};
use crate::queue::{EnqueueResult, TaskQueue};

/// Build the task an event calls for, with its default priority
///
/// Pull request events are high urgency, issue events medium, scheduled
/// repository events low and the stale sweep idle.
pub fn task_for_event(event: TriggerEvent) -> NewTask {
    match event {
        TriggerEvent::IssueCreated { repo, issue } | TriggerEvent::IssueUpdated { repo, issue } => {
            let number = issue.number;
            NewTask::new(TaskPayload::IssueTriage(issue))
                .with_priority(Priority::MEDIUM)
                .with_repo(repo.id)
                .with_user(repo.owner_id)
                .with_entity(EntityKind::Issue, number)
        }
        TriggerEvent::PullRequestCreated { repo, pull_request }
        | TriggerEvent::PullRequestUpdated { repo, pull_request } => {
            let number = pull_request.number;
            NewTask::new(TaskPayload::PrReview(pull_request))
                .with_priority(Priority::HIGH)
                .with_repo(repo.id)
                .with_user(repo.owner_id)
                .with_entity(EntityKind::PullRequest, number)
        }
        TriggerEvent::ApprovalRequested { repo, pull_request } => {
            let number = pull_request.number;
            NewTask::new(TaskPayload::AutoApprove(pull_request))
                .with_priority(Priority::HIGH)
                .with_repo(repo.id)
                .with_user(repo.owner_id)
                .with_entity(EntityKind::PullRequest, number)
        }
        TriggerEvent::Scheduled(trigger) => scheduled_task(trigger),
    }
}

fn scheduled_task(trigger: ScheduledTrigger) -> NewTask {
    match trigger {
        ScheduledTrigger::DailyReport { repo } => NewTask::new(TaskPayload::DailyReport { repo_name: repo.name })
            .with_priority(Priority::LOW)
            .with_repo(repo.id)
            .with_user(repo.owner_id)
            .with_entity(EntityKind::Repository, repo.id),
        ScheduledTrigger::StaleManagement { stale_after_days } => {
            NewTask::new(TaskPayload::StaleManagement { stale_after_days }).with_priority(Priority::IDLE)
        }
        ScheduledTrigger::DependencyUpdate { repo, manifest } => NewTask::new(TaskPayload::DependencyUpdate {
            repo_name: repo.name,
            manifest,
        })
        .with_priority(Priority::LOW)
        .with_repo(repo.id)
        .with_user(repo.owner_id)
        .with_entity(EntityKind::Repository, repo.id),
        ScheduledTrigger::SecurityScan { repo, git_ref } => NewTask::new(TaskPayload::SecurityScan {
            repo_name: repo.name,
            git_ref,
        })
        .with_priority(Priority::LOW)
        .with_repo(repo.id)
        .with_user(repo.owner_id)
        .with_entity(EntityKind::Repository, repo.id),
    }
}

/// Event entry point shared by the service and the periodic scheduler
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<TaskQueue>,
    features: FeatureToggles,
}

impl Dispatcher {
    pub fn new(queue: Arc<TaskQueue>, features: FeatureToggles) -> Self {
        Self { queue, features }
    }

    /// Enqueue the task for `event`; `None` when its category is disabled
    pub async fn enqueue_for(&self, event: TriggerEvent) -> Option<EnqueueResult> {
        let kind = event.kind();
        let new_task = task_for_event(event);
        let task_type = new_task.task_type();

        if !self.features.is_enabled(task_type) {
            debug!(event = kind, %task_type, "Dispatcher::enqueue_for: category disabled, skipping");
            return None;
        }

        debug!(event = kind, %task_type, priority = %new_task.priority, "Dispatcher::enqueue_for: called");
        Some(self.queue.enqueue(new_task).await)
    }
}
