//! Periodic trigger configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Intervals for the recurring maintenance triggers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicConfig {
    pub enabled: bool,

    #[serde(rename = "daily-interval-secs")]
    pub daily_interval_secs: u64,

    #[serde(rename = "hourly-interval-secs")]
    pub hourly_interval_secs: u64,

    /// Age threshold handed to the stale-management task
    #[serde(rename = "stale-after-days")]
    pub stale_after_days: u32,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_interval_secs: 24 * 60 * 60,
            hourly_interval_secs: 60 * 60,
            stale_after_days: 30,
        }
    }
}

impl PeriodicConfig {
    pub fn daily_interval(&self) -> Duration {
        Duration::from_secs(self.daily_interval_secs.max(1))
    }

    pub fn hourly_interval(&self) -> Duration {
        Duration::from_secs(self.hourly_interval_secs.max(1))
    }
}
