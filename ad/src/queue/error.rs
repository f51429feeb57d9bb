//! Task execution errors

use std::time::Duration;

use thiserror::Error;

use crate::domain::TaskType;

/// Stored error strings are cut to this many characters
pub const MAX_ERROR_CHARS: usize = 512;

/// Why an execution attempt failed
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// Configuration problem; retrying cannot help
    #[error("no processor registered for task type {task_type}")]
    NoProcessor { task_type: TaskType },

    #[error("timeout after {}s", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    /// Build from a processor error, flattening its cause chain
    pub fn from_report(report: &eyre::Report) -> Self {
        Self::Failed(truncate_error(&format!("{:#}", report), MAX_ERROR_CHARS))
    }

    pub fn is_retriable(&self) -> bool {
        !matches!(self, Self::NoProcessor { .. })
    }
}

/// Cut `message` to at most `max_chars` characters, marking the cut
pub fn truncate_error(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        None => message.to_string(),
        Some((cut, _)) => format!("{}...", &message[..cut]),
    }
}
