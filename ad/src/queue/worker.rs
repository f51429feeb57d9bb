//! Worker pool
//!
//! A fixed number of worker loops pull from the shared queue. Each loop waits
//! on the poll interval, a wake signal, or cancellation; then drains the queue
//! one task at a time.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::core::TaskQueue;
use super::error::TaskError;
use crate::domain::Task;
use crate::processor::{ProcessContext, ProcessorRegistry};

/// Spawns and tracks worker loops
pub struct WorkerPool;

impl WorkerPool {
    /// Spawn `workers` loops; they stop once `cancel` fires and the task in
    /// hand has settled
    pub fn spawn(
        queue: Arc<TaskQueue>,
        registry: Arc<ProcessorRegistry>,
        workers: usize,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        info!(workers, "Starting worker pool");
        (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let registry = Arc::clone(&registry);
                let cancel = cancel.child_token();
                tokio::spawn(worker_loop(worker_id, queue, registry, cancel))
            })
            .collect()
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<TaskQueue>,
    registry: Arc<ProcessorRegistry>,
    cancel: CancellationToken,
) {
    debug!(worker_id, "worker started");
    queue.metrics().worker_started();
    let poll = queue.config().poll_interval();

    'outer: loop {
        while !cancel.is_cancelled() {
            let Some(task) = queue.dequeue().await else {
                break;
            };
            execute(&queue, &registry, task, &cancel).await;
        }

        tokio::select! {
            _ = cancel.cancelled() => break 'outer,
            _ = queue.wake().notified() => {}
            _ = tokio::time::sleep(poll) => {}
        }
    }

    queue.metrics().worker_stopped();
    debug!(worker_id, "worker stopped");
}

/// Run one attempt of `task` and hand the outcome back to the queue
async fn execute(queue: &Arc<TaskQueue>, registry: &ProcessorRegistry, task: Task, cancel: &CancellationToken) {
    let task_type = task.task_type();
    let started = Instant::now();

    let outcome = match registry.find(task_type) {
        None => Err(TaskError::NoProcessor { task_type }),
        Some(processor) => {
            let timeout = queue.config().task_timeout();
            let ctx = ProcessContext::new(cancel.child_token(), timeout, task.attempt_count + 1);
            debug!(task_id = %task.id, processor = processor.name(), ?timeout, "execute: invoking processor");

            match tokio::time::timeout(timeout, processor.process(&ctx, &task)).await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(report)) => Err(TaskError::from_report(&report)),
                Err(_) => {
                    ctx.token().cancel();
                    Err(TaskError::Timeout { timeout })
                }
            }
        }
    };

    queue.finish(&task.id, outcome, started.elapsed()).await;
}
