//! Task types and their typed payloads

use serde::{Deserialize, Serialize};

/// Kind of automation work; selects the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    IssueTriage,
    PrReview,
    DailyReport,
    StaleManagement,
    DependencyUpdate,
    SecurityScan,
    AutoApprove,
}

impl TaskType {
    pub const ALL: [TaskType; 7] = [
        TaskType::IssueTriage,
        TaskType::PrReview,
        TaskType::DailyReport,
        TaskType::StaleManagement,
        TaskType::DependencyUpdate,
        TaskType::SecurityScan,
        TaskType::AutoApprove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IssueTriage => "issue-triage",
            Self::PrReview => "pr-review",
            Self::DailyReport => "daily-report",
            Self::StaleManagement => "stale-management",
            Self::DependencyUpdate => "dependency-update",
            Self::SecurityScan => "security-scan",
            Self::AutoApprove => "auto-approve",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown task type: {}", s))
    }
}

/// Snapshot of an issue at the time the event fired
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub author: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Snapshot of a pull request at the time the event fired
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSnapshot {
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub author: String,
    pub head_branch: String,
    pub base_branch: String,
    #[serde(default)]
    pub draft: bool,
}

/// Work description owned by the processor that handles the task
///
/// One variant per [`TaskType`]; the task type is always derived from the
/// payload so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskPayload {
    IssueTriage(IssueSnapshot),
    PrReview(PullRequestSnapshot),
    DailyReport { repo_name: String },
    StaleManagement { stale_after_days: u32 },
    DependencyUpdate { repo_name: String, manifest: Option<String> },
    SecurityScan { repo_name: String, git_ref: Option<String> },
    AutoApprove(PullRequestSnapshot),
}

impl TaskPayload {
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::IssueTriage(_) => TaskType::IssueTriage,
            Self::PrReview(_) => TaskType::PrReview,
            Self::DailyReport { .. } => TaskType::DailyReport,
            Self::StaleManagement { .. } => TaskType::StaleManagement,
            Self::DependencyUpdate { .. } => TaskType::DependencyUpdate,
            Self::SecurityScan { .. } => TaskType::SecurityScan,
            Self::AutoApprove(_) => TaskType::AutoApprove,
        }
    }

    /// Short human-readable summary for activity records
    pub fn describe(&self) -> String {
        match self {
            Self::IssueTriage(issue) => format!("Triage issue #{}: {}", issue.number, issue.title),
            Self::PrReview(pr) => format!("Review PR #{}: {}", pr.number, pr.title),
            Self::DailyReport { repo_name } => format!("Daily report for {}", repo_name),
            Self::StaleManagement { stale_after_days } => {
                format!("Stale sweep (older than {} days)", stale_after_days)
            }
            Self::DependencyUpdate { repo_name, .. } => format!("Dependency update for {}", repo_name),
            Self::SecurityScan { repo_name, .. } => format!("Security scan for {}", repo_name),
            Self::AutoApprove(pr) => format!("Auto-approve PR #{}: {}", pr.number, pr.title),
        }
    }

    /// Generic JSON form for transports that need an untyped payload
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Inverse of [`TaskPayload::to_json`]
    pub fn from_json(value: serde_json::Value) -> eyre::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_names() {
        assert_eq!(TaskType::IssueTriage.to_string(), "issue-triage");
        assert_eq!("pr-review".parse::<TaskType>().unwrap(), TaskType::PrReview);
        assert!("bogus".parse::<TaskType>().is_err());

        let json = serde_json::to_string(&TaskType::StaleManagement).unwrap();
        assert_eq!(json, "\"stale-management\"");
    }

    #[test]
    fn test_payload_determines_type() {
        let payload = TaskPayload::DailyReport {
            repo_name: "acme/widgets".to_string(),
        };
        assert_eq!(payload.task_type(), TaskType::DailyReport);
        assert!(payload.describe().contains("acme/widgets"));
    }

    #[test]
    fn test_payload_json_adapter() {
        let payload = TaskPayload::IssueTriage(IssueSnapshot {
            number: 7,
            title: "Crash on start".to_string(),
            author: "octo".to_string(),
            ..Default::default()
        });

        let value = payload.to_json();
        assert_eq!(value["kind"], "issue-triage");
        assert_eq!(value["number"], 7);

        let back = TaskPayload::from_json(value).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_payload_from_json_rejects_unknown_kind() {
        let value = serde_json::json!({"kind": "launch-rockets"});
        assert!(TaskPayload::from_json(value).is_err());
    }
}
