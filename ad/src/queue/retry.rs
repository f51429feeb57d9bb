//! Retry controller

use std::time::Duration;

use tracing::debug;

use super::config::QueueConfig;
use super::error::{MAX_ERROR_CHARS, TaskError, truncate_error};
use crate::domain::Task;

/// What happens to a task after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-insert after `delay`
    Retry { delay: Duration },

    /// Retry budget exhausted or error not retriable
    Fail,
}

/// Linear backoff with priority demotion
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub priority_step: i32,
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            base_delay: config.retry_delay_unit(),
            priority_step: config.retry_priority_step,
        }
    }

    /// Delay before re-inserting after the given attempt number
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Record the failure on the task and decide its fate
    ///
    /// Bumps `attempt_count` and stores the error. On retry the priority is
    /// demoted by one step. Status changes are left to the caller.
    pub fn on_failure(&self, task: &mut Task, error: &TaskError) -> RetryDecision {
        task.attempt_count = task.attempt_count.saturating_add(1).min(task.max_attempts);
        task.last_error = Some(truncate_error(&error.to_string(), MAX_ERROR_CHARS));

        if !error.is_retriable() {
            debug!(task_id = %task.id, %error, "RetryPolicy::on_failure: not retriable");
            return RetryDecision::Fail;
        }

        if !task.has_attempts_left() {
            debug!(task_id = %task.id, attempts = task.attempt_count, "RetryPolicy::on_failure: budget exhausted");
            return RetryDecision::Fail;
        }

        task.priority = task.priority.demoted(self.priority_step);
        let delay = self.delay_for(task.attempt_count);
        debug!(task_id = %task.id, attempts = task.attempt_count, ?delay, priority = %task.priority, "RetryPolicy::on_failure: retry");
        RetryDecision::Retry { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTask, Priority, TaskPayload, TaskType};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(30),
            priority_step: 1,
        }
    }

    fn task(max_attempts: u32) -> Task {
        NewTask::new(TaskPayload::DailyReport {
            repo_name: "acme/widgets".to_string(),
        })
        .with_priority(Priority::LOW)
        .with_max_attempts(max_attempts)
        .into_task(3)
    }

    #[test]
    fn test_linear_backoff_and_demotion() {
        let policy = policy();
        let mut task = task(3);
        let err = TaskError::Failed("boom".to_string());

        assert_eq!(
            policy.on_failure(&mut task, &err),
            RetryDecision::Retry {
                delay: Duration::from_secs(30)
            }
        );
        assert_eq!(task.priority, Priority(9));

        assert_eq!(
            policy.on_failure(&mut task, &err),
            RetryDecision::Retry {
                delay: Duration::from_secs(60)
            }
        );
        assert_eq!(task.priority, Priority(10));

        assert_eq!(policy.on_failure(&mut task, &err), RetryDecision::Fail);
        assert_eq!(task.attempt_count, 3);
        assert_eq!(task.priority, Priority(10));
        assert_eq!(task.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_non_retriable_fails_at_once() {
        let mut task = task(3);
        let err = TaskError::NoProcessor {
            task_type: TaskType::DailyReport,
        };
        assert_eq!(policy().on_failure(&mut task, &err), RetryDecision::Fail);
        assert_eq!(task.attempt_count, 1);
        assert_eq!(task.priority, Priority::LOW);
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let mut task = task(1);
        let err = TaskError::Failed("boom".to_string());
        assert_eq!(policy().on_failure(&mut task, &err), RetryDecision::Fail);
        assert_eq!(task.attempt_count, 1);
    }
}
