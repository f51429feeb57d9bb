//! Activity log sink
//!
//! Every enqueue, completion, retry, terminal failure and cancellation is
//! emitted as an [`ActivityRecord`]. Sinks must not block the caller.

mod logger;
mod record;

use std::sync::Mutex;

pub use logger::{JsonlActivityLog, read_activity};
pub use record::{ActivityKind, ActivityRecord};

/// Destination for activity records
pub trait ActivityLog: Send + Sync {
    fn record(&self, record: ActivityRecord);
}

/// Keeps records in memory; useful for embedding and tests
#[derive(Default)]
pub struct MemoryActivityLog {
    records: Mutex<Vec<ActivityRecord>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: ActivityKind) -> usize {
        self.records
            .lock()
            .map(|r| r.iter().filter(|rec| rec.kind == kind).count())
            .unwrap_or_default()
    }
}

impl ActivityLog for MemoryActivityLog {
    fn record(&self, record: ActivityRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
