//! Priority levels for task scheduling
//!
//! Lower numeric values are served first. The named levels cover the common
//! cases but any integer is a valid priority.

use serde::{Deserialize, Serialize};

/// Scheduling priority (lower = more urgent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    pub const CRITICAL: Priority = Priority(1);
    pub const HIGH: Priority = Priority(2);
    pub const MEDIUM: Priority = Priority(5);
    pub const LOW: Priority = Priority(8);
    pub const IDLE: Priority = Priority(10);

    /// Raw numeric value
    pub fn value(self) -> i32 {
        self.0
    }

    /// Demote urgency by `step` (saturating)
    pub fn demoted(self, step: i32) -> Self {
        Priority(self.0.saturating_add(step))
    }

    /// Name of the matching level, if this is one of the named values
    pub fn level_name(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("critical"),
            2 => Some("high"),
            5 => Some("medium"),
            8 => Some("low"),
            10 => Some("idle"),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Self::CRITICAL),
            "high" => Ok(Self::HIGH),
            "medium" => Ok(Self::MEDIUM),
            "low" => Ok(Self::LOW),
            "idle" => Ok(Self::IDLE),
            other => other
                .parse::<i32>()
                .map(Priority)
                .map_err(|_| format!("Unknown priority: {}", s)),
        }
    }
}
