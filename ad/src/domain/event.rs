//! Typed trigger events from the development platform

use serde::{Deserialize, Serialize};

use super::payload::{IssueSnapshot, PullRequestSnapshot};
use super::task::{RepoId, UserId};

/// A repository known to the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoRef {
    pub id: RepoId,
    pub owner_id: UserId,
    pub name: String,
}

impl RepoRef {
    pub fn new(id: RepoId, owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            owner_id,
            name: name.into(),
        }
    }
}

/// Recurring or system-originated triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum ScheduledTrigger {
    DailyReport { repo: RepoRef },
    StaleManagement { stale_after_days: u32 },
    DependencyUpdate { repo: RepoRef, manifest: Option<String> },
    SecurityScan { repo: RepoRef, git_ref: Option<String> },
}

/// External event that may produce a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriggerEvent {
    IssueCreated { repo: RepoRef, issue: IssueSnapshot },
    IssueUpdated { repo: RepoRef, issue: IssueSnapshot },
    PullRequestCreated { repo: RepoRef, pull_request: PullRequestSnapshot },
    PullRequestUpdated { repo: RepoRef, pull_request: PullRequestSnapshot },
    ApprovalRequested { repo: RepoRef, pull_request: PullRequestSnapshot },
    Scheduled(ScheduledTrigger),
}

impl TriggerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IssueCreated { .. } => "issue_created",
            Self::IssueUpdated { .. } => "issue_updated",
            Self::PullRequestCreated { .. } => "pull_request_created",
            Self::PullRequestUpdated { .. } => "pull_request_updated",
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::Scheduled(_) => "scheduled",
        }
    }
}
