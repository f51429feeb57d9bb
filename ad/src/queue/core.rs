//! Priority queue implementation

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::QueueConfig;
use super::entry::{CancelOutcome, EnqueueResult, QueueEntry, QueueStats, QueuedTask};
use super::error::TaskError;
use super::metrics::QueueMetrics;
use super::report::Reporter;
use super::retry::{RetryDecision, RetryPolicy};
use crate::activity::ActivityKind;
use crate::domain::{NewTask, Task, TaskStatus};

/// Pending tasks ordered by priority, then insertion
#[derive(Default)]
struct PendingHeap {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
}

impl PendingHeap {
    fn push(&mut self, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedTask { task, seq });
    }

    fn contains(&self, task_id: &str) -> bool {
        self.heap.iter().any(|q| q.task.id == task_id)
    }

    /// Remove a task by id, rebuilding the heap
    fn take(&mut self, task_id: &str) -> Option<Task> {
        let mut taken = None;
        let kept: Vec<_> = self
            .heap
            .drain()
            .filter_map(|q| {
                if taken.is_none() && q.task.id == task_id {
                    taken = Some(q.task);
                    None
                } else {
                    Some(q)
                }
            })
            .collect();
        self.heap = kept.into_iter().collect();
        taken
    }
}

/// A task sitting out its retry delay
struct RetryWait {
    task: Task,
    cancel: CancellationToken,
}

/// The TaskQueue holds pending, in-flight and retrying tasks
///
/// Each structure has its own lock. When more than one is needed they are
/// taken in the order pending, in-flight, retry waits. No lock is held while
/// reporting or while a processor runs.
pub struct TaskQueue {
    config: QueueConfig,
    retry_policy: RetryPolicy,
    pending: Mutex<PendingHeap>,
    in_flight: Mutex<HashMap<String, Task>>,
    retry_waits: Mutex<HashMap<String, RetryWait>>,
    metrics: QueueMetrics,
    reporter: Reporter,
    wake: Notify,
    shutdown: CancellationToken,
}

impl TaskQueue {
    /// Create a queue; cancelling `shutdown` abandons scheduled retries
    pub fn new(config: QueueConfig, reporter: Reporter, shutdown: CancellationToken) -> Arc<Self> {
        debug!(?config, "TaskQueue::new: called");
        Arc::new(Self {
            retry_policy: RetryPolicy::from_config(&config),
            config,
            pending: Mutex::new(PendingHeap::default()),
            in_flight: Mutex::new(HashMap::new()),
            retry_waits: Mutex::new(HashMap::new()),
            metrics: QueueMetrics::default(),
            reporter,
            wake: Notify::new(),
            shutdown,
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub(crate) fn wake(&self) -> &Notify {
        &self.wake
    }

    pub(crate) fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    /// Accept a task, fill its defaults and make it visible to workers
    pub async fn enqueue(&self, new_task: NewTask) -> EnqueueResult {
        let task = new_task.into_task(self.config.max_attempts);
        debug!(task_id = %task.id, task_type = %task.task_type(), priority = %task.priority, "TaskQueue::enqueue: called");

        let mut pending = self.pending.lock().await;
        let in_flight = self.in_flight.lock().await;
        let retry_waits = self.retry_waits.lock().await;
        let duplicate =
            pending.contains(&task.id) || in_flight.contains_key(&task.id) || retry_waits.contains_key(&task.id);
        drop(retry_waits);
        drop(in_flight);
        if duplicate {
            debug!(task_id = %task.id, "TaskQueue::enqueue: duplicate id, rejecting");
            return EnqueueResult::Duplicate { task_id: task.id };
        }
        pending.push(task.clone());
        drop(pending);

        self.metrics.record_enqueued();
        self.reporter.milestone(ActivityKind::Enqueued, &task, Duration::ZERO);
        self.wake.notify_one();

        EnqueueResult::Enqueued(task)
    }

    /// Pop the most urgent task and move it to the in-flight set
    ///
    /// The returned task is already `processing` with `started_at` set.
    pub async fn dequeue(&self) -> Option<Task> {
        let mut pending = self.pending.lock().await;
        let mut task = pending.heap.pop()?.task;

        if let Err(e) = task.transition(TaskStatus::Processing) {
            warn!(task_id = %task.id, error = %e, "TaskQueue::dequeue: unexpected status in heap");
        }
        task.started_at = Some(Utc::now());
        self.in_flight.lock().await.insert(task.id.clone(), task.clone());
        drop(pending);

        debug!(task_id = %task.id, priority = %task.priority, "TaskQueue::dequeue: dispatched");
        self.reporter.status(&task);
        Some(task)
    }

    /// Settle an in-flight task after its processor returned
    ///
    /// A task that will be retried moves into the retry waits before the
    /// in-flight lock is released, so it is always visible to `enqueue` and
    /// `cancel`.
    pub(crate) async fn finish(
        self: &Arc<Self>,
        task_id: &str,
        outcome: Result<Option<serde_json::Value>, TaskError>,
        duration: Duration,
    ) {
        let mut in_flight = self.in_flight.lock().await;
        let Some(mut task) = in_flight.remove(task_id) else {
            warn!(%task_id, "TaskQueue::finish: task not in flight");
            return;
        };
        self.metrics.record_execution(duration);

        let err = match outcome {
            Ok(result) => {
                drop(in_flight);
                if let Err(e) = task.transition(TaskStatus::Completed) {
                    warn!(%task_id, error = %e, "TaskQueue::finish: rejected transition");
                }
                task.result = result;
                task.last_error = None;
                info!(%task_id, task_type = %task.task_type(), ?duration, "Task completed");
                self.reporter.milestone(ActivityKind::Completed, &task, duration);
                return;
            }
            Err(err) => err,
        };

        match self.retry_policy.on_failure(&mut task, &err) {
            RetryDecision::Retry { delay } => {
                if let Err(e) = task.transition(TaskStatus::Retrying) {
                    warn!(%task_id, error = %e, "TaskQueue::finish: rejected transition");
                }
                let cancel = self.park_retry(&task).await;
                drop(in_flight);

                self.metrics.record_retried();
                warn!(
                    %task_id,
                    attempt = task.attempt_count,
                    max_attempts = task.max_attempts,
                    ?delay,
                    error = %err,
                    "Task failed, retrying"
                );
                self.reporter.milestone(ActivityKind::Retrying, &task, duration);
                self.spawn_retry_timer(task.id, delay, cancel);
            }
            RetryDecision::Fail => {
                drop(in_flight);
                if let Err(e) = task.transition(TaskStatus::Failed) {
                    warn!(%task_id, error = %e, "TaskQueue::finish: rejected transition");
                }
                self.metrics.record_failed();
                error!(
                    %task_id,
                    task_type = %task.task_type(),
                    attempts = task.attempt_count,
                    error = %err,
                    "Task failed permanently"
                );
                self.reporter.milestone(ActivityKind::Failed, &task, duration);
            }
        }
    }

    /// Record a retrying task; the caller holds the in-flight lock
    async fn park_retry(&self, task: &Task) -> CancellationToken {
        let cancel = self.shutdown.child_token();
        self.retry_waits.lock().await.insert(
            task.id.clone(),
            RetryWait {
                task: task.clone(),
                cancel: cancel.clone(),
            },
        );
        cancel
    }

    /// Re-insert a parked task after `delay` without holding a worker
    fn spawn_retry_timer(self: &Arc<Self>, task_id: String, delay: Duration, cancel: CancellationToken) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if queue.shutdown.is_cancelled() {
                        queue.retry_waits.lock().await.remove(&task_id);
                        debug!(%task_id, "Retry abandoned on shutdown");
                    }
                }
                _ = tokio::time::sleep(delay) => queue.requeue(&task_id).await,
            }
        });
    }

    async fn requeue(&self, task_id: &str) {
        let mut pending = self.pending.lock().await;
        let Some(wait) = self.retry_waits.lock().await.remove(task_id) else {
            debug!(%task_id, "TaskQueue::requeue: retry already cancelled");
            return;
        };
        let mut task = wait.task;
        if let Err(e) = task.transition(TaskStatus::Queued) {
            warn!(%task_id, error = %e, "TaskQueue::requeue: rejected transition");
        }
        pending.push(task.clone());
        drop(pending);

        debug!(%task_id, priority = %task.priority, "TaskQueue::requeue: back in queue");
        self.reporter.status(&task);
        self.wake.notify_one();
    }

    /// Cancel a task that has not started executing
    pub async fn cancel(&self, task_id: &str) -> CancelOutcome {
        debug!(%task_id, "TaskQueue::cancel: called");
        let mut pending = self.pending.lock().await;

        if let Some(mut task) = pending.take(task_id) {
            drop(pending);
            if let Err(e) = task.transition(TaskStatus::Cancelled) {
                warn!(%task_id, error = %e, "TaskQueue::cancel: rejected transition");
            }
            self.settle_cancelled(&task);
            return CancelOutcome::Cancelled;
        }

        if self.in_flight.lock().await.contains_key(task_id) {
            debug!(%task_id, "TaskQueue::cancel: in flight, cannot cancel");
            return CancelOutcome::InFlight;
        }

        let wait = self.retry_waits.lock().await.remove(task_id);
        drop(pending);

        match wait {
            Some(wait) => {
                wait.cancel.cancel();
                let mut task = wait.task;
                for next in [TaskStatus::Queued, TaskStatus::Cancelled] {
                    if let Err(e) = task.transition(next) {
                        warn!(%task_id, error = %e, "TaskQueue::cancel: rejected transition");
                    }
                }
                self.settle_cancelled(&task);
                CancelOutcome::RetryCancelled
            }
            None => {
                debug!(%task_id, "TaskQueue::cancel: not found");
                CancelOutcome::NotFound
            }
        }
    }

    fn settle_cancelled(&self, task: &Task) {
        info!(task_id = %task.id, "Task cancelled");
        self.metrics.record_cancelled();
        self.reporter.milestone(ActivityKind::Cancelled, task, Duration::ZERO);
    }

    pub async fn stats(&self) -> QueueStats {
        let pending = self.pending.lock().await;
        let in_flight = self.in_flight.lock().await;
        let retry_waits = self.retry_waits.lock().await;
        self.metrics.snapshot(pending.heap.len(), in_flight.len(), retry_waits.len())
    }

    /// Every live task, most urgent first
    pub async fn details(&self) -> Vec<QueueEntry> {
        let mut entries: Vec<QueueEntry> = {
            let pending = self.pending.lock().await;
            let in_flight = self.in_flight.lock().await;
            let retry_waits = self.retry_waits.lock().await;
            pending
                .heap
                .iter()
                .map(|q| QueueEntry::from(&q.task))
                .chain(in_flight.values().map(QueueEntry::from))
                .chain(retry_waits.values().map(|w| QueueEntry::from(&w.task)))
                .collect()
        };

        entries.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.created_at.cmp(&b.created_at)));
        entries
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.heap.len()
    }

    /// Abandon scheduled retries; pending tasks stay where they are
    pub fn close(&self) {
        debug!("TaskQueue::close: called");
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::MemoryActivityLog;
    use crate::domain::{Priority, TaskPayload};
    use crate::hub::{Hub, HubConfig};

    fn test_queue(config: QueueConfig) -> (Arc<TaskQueue>, Arc<MemoryActivityLog>) {
        let activity = Arc::new(MemoryActivityLog::new());
        let hub = Hub::new(HubConfig::default()).handle();
        let reporter = Reporter::new(activity.clone(), hub);
        (TaskQueue::new(config, reporter, CancellationToken::new()), activity)
    }

    fn task(id: &str, priority: i32) -> NewTask {
        NewTask::new(TaskPayload::StaleManagement { stale_after_days: 30 })
            .with_id(id)
            .with_priority(Priority(priority))
    }

    fn failed() -> TaskError {
        TaskError::Failed("boom".to_string())
    }

    #[tokio::test]
    async fn test_enqueue_fills_defaults_and_reports() {
        let (queue, activity) = test_queue(QueueConfig::default());

        let result = queue
            .enqueue(NewTask::new(TaskPayload::StaleManagement { stale_after_days: 30 }))
            .await;
        let task = result.into_task().unwrap();

        assert!(task.id.starts_with("stale-management-"));
        assert_eq!(task.max_attempts, 3);
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(activity.count(ActivityKind::Enqueued), 1);
        assert_eq!(queue.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn test_priority_order_with_equal_ties() {
        let (queue, _) = test_queue(QueueConfig::default());
        queue.enqueue(task("A", 1)).await;
        queue.enqueue(task("B", 5)).await;
        queue.enqueue(task("C", 1)).await;

        let first = queue.dequeue().await.unwrap();
        let second = queue.dequeue().await.unwrap();
        let third = queue.dequeue().await.unwrap();

        assert!(["A", "C"].contains(&first.id.as_str()));
        assert!(["A", "C"].contains(&second.id.as_str()));
        assert_ne!(first.id, second.id);
        assert_eq!(third.id, "B");
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_dequeue_moves_task_in_flight() {
        let (queue, _) = test_queue(QueueConfig::default());
        queue.enqueue(task("A", 5)).await;

        let task = queue.dequeue().await.unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.started_at.is_some());

        let stats = queue.stats().await;
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.in_flight, 1);
    }

    #[tokio::test]
    async fn test_duplicate_rejection() {
        let (queue, _) = test_queue(QueueConfig::default());
        assert!(queue.enqueue(task("same", 5)).await.is_enqueued());
        assert!(matches!(
            queue.enqueue(task("same", 1)).await,
            EnqueueResult::Duplicate { .. }
        ));

        queue.dequeue().await.unwrap();
        assert!(!queue.enqueue(task("same", 1)).await.is_enqueued());
    }

    #[tokio::test]
    async fn test_cancel_pending_in_flight_and_unknown() {
        let (queue, activity) = test_queue(QueueConfig::default());
        queue.enqueue(task("running", 1)).await;
        queue.enqueue(task("waiting", 5)).await;
        queue.dequeue().await.unwrap();

        assert_eq!(queue.cancel("waiting").await, CancelOutcome::Cancelled);
        assert_eq!(queue.cancel("running").await, CancelOutcome::InFlight);
        assert_eq!(queue.cancel("ghost").await, CancelOutcome::NotFound);
        assert_eq!(queue.cancel("waiting").await, CancelOutcome::NotFound);

        assert_eq!(activity.count(ActivityKind::Cancelled), 1);
        let stats = queue.stats().await;
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total_cancelled, 1);
    }

    #[tokio::test]
    async fn test_finish_success_completes_once() {
        let (queue, activity) = test_queue(QueueConfig::default());
        queue.enqueue(task("A", 5)).await;
        let task = queue.dequeue().await.unwrap();

        queue
            .finish(&task.id, Ok(Some(serde_json::json!({"ok": true}))), Duration::from_millis(40))
            .await;

        let stats = queue.stats().await;
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.total_failed, 0);
        assert!((stats.average_duration_ms - 40.0).abs() < 1e-6);
        assert_eq!(activity.count(ActivityKind::Completed), 1);
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reinserts_after_delay_with_lower_urgency() {
        let config = QueueConfig {
            retry_delay_ms: 1000,
            ..Default::default()
        };
        let (queue, activity) = test_queue(config);
        queue.enqueue(task("A", 5)).await;
        let task = queue.dequeue().await.unwrap();

        queue.finish(&task.id, Err(failed()), Duration::from_millis(1)).await;
        let stats = queue.stats().await;
        assert_eq!(stats.retrying, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total_retried, 1);
        assert_eq!(activity.count(ActivityKind::Retrying), 1);

        tokio::time::sleep(Duration::from_millis(1001)).await;

        let retried = queue.dequeue().await.unwrap();
        assert_eq!(retried.id, "A");
        assert_eq!(retried.attempt_count, 1);
        assert_eq!(retried.priority, Priority(6));
        assert_eq!(retried.last_error.as_deref(), Some("boom"));
        assert_eq!(queue.stats().await.retrying, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_wait() {
        let config = QueueConfig {
            retry_delay_ms: 1000,
            ..Default::default()
        };
        let (queue, activity) = test_queue(config);
        queue.enqueue(task("A", 5)).await;
        let task = queue.dequeue().await.unwrap();
        queue.finish(&task.id, Err(failed()), Duration::from_millis(1)).await;

        assert_eq!(queue.cancel("A").await, CancelOutcome::RetryCancelled);
        assert_eq!(activity.count(ActivityKind::Cancelled), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(queue.dequeue().await.is_none());
        assert_eq!(queue.stats().await.retrying, 0);
    }

    #[tokio::test]
    async fn test_missing_processor_fails_without_retry() {
        let (queue, activity) = test_queue(QueueConfig::default());
        queue.enqueue(task("A", 5)).await;
        let task = queue.dequeue().await.unwrap();

        let err = TaskError::NoProcessor {
            task_type: task.task_type(),
        };
        queue.finish(&task.id, Err(err), Duration::from_millis(1)).await;

        let stats = queue.stats().await;
        assert_eq!(stats.retrying, 0);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(activity.count(ActivityKind::Failed), 1);
        let record = activity.records().into_iter().last().unwrap();
        assert!(record.error.unwrap().contains("no processor"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_abandons_retries() {
        let config = QueueConfig {
            retry_delay_ms: 1000,
            ..Default::default()
        };
        let (queue, _) = test_queue(config);
        queue.enqueue(task("A", 5)).await;
        let task = queue.dequeue().await.unwrap();
        queue.finish(&task.id, Err(failed()), Duration::from_millis(1)).await;

        queue.close();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(queue.dequeue().await.is_none());
        assert_eq!(queue.stats().await.retrying, 0);
    }

    #[tokio::test]
    async fn test_details_lists_every_live_task() {
        let (queue, _) = test_queue(QueueConfig::default());
        queue.enqueue(task("low", 8)).await;
        queue.enqueue(task("high", 2)).await;
        queue.enqueue(task("mid", 5)).await;
        queue.dequeue().await.unwrap();

        let details = queue.details().await;
        let ids: Vec<&str> = details.iter().map(|e| e.task_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
        assert_eq!(details[0].status, TaskStatus::Processing);
        assert_eq!(details[1].status, TaskStatus::Queued);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_id_rejected_while_failure_settles() {
        let config = QueueConfig {
            retry_delay_ms: 60_000,
            ..Default::default()
        };
        let (queue, _) = test_queue(config);

        for round in 0..200 {
            let id = format!("same-{}", round);
            assert!(queue.enqueue(task(&id, 5)).await.is_enqueued());
            let running = queue.dequeue().await.unwrap();

            let settle = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    queue
                        .finish(&running.id, Err(failed()), Duration::from_millis(1))
                        .await
                })
            };
            let resubmit = {
                let queue = Arc::clone(&queue);
                let id = id.clone();
                tokio::spawn(async move {
                    let mut accepted = 0;
                    loop {
                        if queue.enqueue(task(&id, 5)).await.is_enqueued() {
                            accepted += 1;
                        }
                        let details = queue.details().await;
                        let copies: Vec<_> = details.iter().filter(|e| e.task_id == id).collect();
                        assert_eq!(copies.len(), 1, "{} listed {} times", id, copies.len());
                        if copies[0].status == TaskStatus::Retrying {
                            return accepted;
                        }
                        tokio::task::yield_now().await;
                    }
                })
            };

            settle.await.unwrap();
            assert_eq!(resubmit.await.unwrap(), 0, "duplicate of {} accepted", id);
            assert_eq!(queue.cancel(&id).await, CancelOutcome::RetryCancelled);
        }

        let stats = queue.stats().await;
        assert_eq!(stats.pending + stats.in_flight + stats.retrying, 0);
        assert_eq!(stats.total_enqueued, 200);
        queue.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_never_misses_task_while_failure_settles() {
        let config = QueueConfig {
            retry_delay_ms: 60_000,
            ..Default::default()
        };
        let (queue, activity) = test_queue(config);

        for round in 0..200 {
            let id = format!("cancel-{}", round);
            queue.enqueue(task(&id, 5)).await;
            let running = queue.dequeue().await.unwrap();

            let settle = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    queue
                        .finish(&running.id, Err(failed()), Duration::from_millis(1))
                        .await
                })
            };
            let outcome = queue.cancel(&id).await;
            settle.await.unwrap();

            match outcome {
                CancelOutcome::RetryCancelled => {}
                CancelOutcome::InFlight => {
                    assert_eq!(queue.cancel(&id).await, CancelOutcome::RetryCancelled);
                }
                other => panic!("cancel of {} returned {:?}", id, other),
            }
        }

        assert_eq!(queue.stats().await.retrying, 0);
        assert_eq!(activity.count(ActivityKind::Cancelled), 200);
        queue.close();
    }
}
