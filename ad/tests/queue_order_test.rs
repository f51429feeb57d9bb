//! Property tests for dispatch order
//!
//! Whatever mix of priorities is enqueued, dequeue must yield them by
//! ascending priority value, FIFO among equals.

use std::sync::Arc;

use autodev::activity::MemoryActivityLog;
use autodev::domain::{NewTask, Priority, TaskPayload};
use autodev::hub::{Hub, HubConfig};
use autodev::queue::{QueueConfig, Reporter, TaskQueue};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn queue() -> Arc<TaskQueue> {
    let reporter = Reporter::new(
        Arc::new(MemoryActivityLog::new()),
        Hub::new(HubConfig::default()).handle(),
    );
    TaskQueue::new(QueueConfig::default(), reporter, CancellationToken::new())
}

fn drain_order(priorities: &[i32]) -> Vec<(i32, usize)> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let queue = queue();
        for (index, priority) in priorities.iter().enumerate() {
            let task = NewTask::new(TaskPayload::StaleManagement { stale_after_days: 30 })
                .with_id(format!("task-{}", index))
                .with_priority(Priority(*priority));
            assert!(queue.enqueue(task).await.is_enqueued());
        }

        let mut order = Vec::new();
        while let Some(task) = queue.dequeue().await {
            let index: usize = task.id.trim_start_matches("task-").parse().unwrap();
            order.push((task.priority.0, index));
        }
        order
    })
}

proptest! {
    #[test]
    fn dequeue_is_priority_then_fifo(priorities in prop::collection::vec(1i32..=10, 0..40)) {
        let order = drain_order(&priorities);

        prop_assert_eq!(order.len(), priorities.len());
        let mut expected: Vec<(i32, usize)> = priorities.iter().copied().zip(0..).collect();
        expected.sort();
        prop_assert_eq!(order, expected);
    }

    #[test]
    fn duplicate_ids_never_double_queue(ids in prop::collection::vec(0u8..8, 1..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (accepted, pending) = runtime.block_on(async {
            let queue = queue();
            let mut accepted = 0;
            for id in &ids {
                let task = NewTask::new(TaskPayload::StaleManagement { stale_after_days: 30 })
                    .with_id(format!("dup-{}", id));
                if queue.enqueue(task).await.is_enqueued() {
                    accepted += 1;
                }
            }
            (accepted, queue.pending_len().await)
        });

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(accepted, unique.len());
        prop_assert_eq!(pending, unique.len());
    }
}
