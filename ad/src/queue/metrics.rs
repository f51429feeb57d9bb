//! Lock-free queue counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::entry::{PoolStatus, QueueStats};

/// Weight kept from the previous average on each sample
const EMA_KEEP: f64 = 0.9;

/// Cumulative counters updated on the hot path
///
/// The moving average is stored as nanoseconds; zero means no sample yet.
#[derive(Debug, Default)]
pub(crate) struct QueueMetrics {
    enqueued: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    cancelled: AtomicU64,
    avg_duration_nanos: AtomicU64,
    workers: AtomicUsize,
}

impl QueueMetrics {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// One finished execution attempt, successful or not
    pub fn record_execution(&self, duration: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);

        let sample = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX).max(1);
        let _ = self
            .avg_duration_nanos
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                if current == 0 {
                    Some(sample)
                } else {
                    Some((current as f64 * EMA_KEEP + sample as f64 * (1.0 - EMA_KEEP)) as u64)
                }
            });
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.workers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn worker_stopped(&self) {
        let _ = self
            .workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
    }

    pub fn average_duration(&self) -> Duration {
        Duration::from_nanos(self.avg_duration_nanos.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self, pending: usize, in_flight: usize, retrying: usize) -> QueueStats {
        let workers = self.workers.load(Ordering::SeqCst);
        QueueStats {
            pending,
            in_flight,
            retrying,
            workers,
            total_enqueued: self.enqueued.load(Ordering::Relaxed),
            total_processed: self.processed.load(Ordering::Relaxed),
            total_failed: self.failed.load(Ordering::Relaxed),
            total_retried: self.retried.load(Ordering::Relaxed),
            total_cancelled: self.cancelled.load(Ordering::Relaxed),
            average_duration_ms: self.average_duration().as_secs_f64() * 1000.0,
            status: if workers > 0 {
                PoolStatus::Running
            } else {
                PoolStatus::Stopped
            },
        }
    }
}
