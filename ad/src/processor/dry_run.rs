//! Processor that accepts every task type and only logs

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{ProcessContext, Processor};
use crate::domain::{Task, TaskType};

/// Logs each task and completes it without side effects
#[derive(Debug, Default, Clone)]
pub struct DryRunProcessor;

#[async_trait]
impl Processor for DryRunProcessor {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn can_handle(&self, _task_type: TaskType) -> bool {
        true
    }

    async fn process(&self, ctx: &ProcessContext, task: &Task) -> eyre::Result<Option<serde_json::Value>> {
        info!(
            task_id = %task.id,
            task_type = %task.task_type(),
            attempt = ctx.attempt(),
            "dry-run: {}",
            task.description()
        );
        Ok(Some(json!({
            "dry_run": true,
            "task_type": task.task_type(),
            "description": task.description(),
        })))
    }
}
