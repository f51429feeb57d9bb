//! Coordinating service configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::TaskType;

/// Per-category switches; a disabled category turns its events into no-ops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FeatureToggles {
    pub issue_triage: bool,
    pub pr_review: bool,
    pub daily_report: bool,
    pub stale_management: bool,
    pub dependency_update: bool,
    pub security_scan: bool,
    pub auto_approve: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            issue_triage: true,
            pr_review: true,
            daily_report: true,
            stale_management: true,
            dependency_update: true,
            security_scan: true,
            auto_approve: true,
        }
    }
}

impl FeatureToggles {
    pub fn is_enabled(&self, task_type: TaskType) -> bool {
        match task_type {
            TaskType::IssueTriage => self.issue_triage,
            TaskType::PrReview => self.pr_review,
            TaskType::DailyReport => self.daily_report,
            TaskType::StaleManagement => self.stale_management,
            TaskType::DependencyUpdate => self.dependency_update,
            TaskType::SecurityScan => self.security_scan,
            TaskType::AutoApprove => self.auto_approve,
        }
    }
}

/// Service lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// How often queue stats are pushed to observers, in seconds
    #[serde(rename = "monitor-interval-secs")]
    pub monitor_interval_secs: u64,

    /// Grace period for in-flight tasks on stop, in seconds
    #[serde(rename = "shutdown-timeout-secs")]
    pub shutdown_timeout_secs: u64,

    pub features: FeatureToggles,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: 10,
            shutdown_timeout_secs: 30,
            features: FeatureToggles::default(),
        }
    }
}

impl ServiceConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
