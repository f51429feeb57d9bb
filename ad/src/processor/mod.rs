//! Task processors
//!
//! A processor is the external, pluggable handler for one or more task types.
//! The core only asks whether it can handle a type and then calls `process`
//! inside a cancellable, deadline-bound scope.

mod dry_run;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{Task, TaskType};

pub use dry_run::DryRunProcessor;

/// Scope handed to a processor for one attempt
///
/// The token is cancelled when the attempt times out or the service stops.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    cancel: CancellationToken,
    deadline: Instant,
    attempt: u32,
}

impl ProcessContext {
    pub fn new(cancel: CancellationToken, timeout: Duration, attempt: u32) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + timeout,
            attempt,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the attempt should stop
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Pluggable handler for task types
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, task_type: TaskType) -> bool;

    /// Execute one attempt; an `Ok` value is stored as the advisory result
    async fn process(&self, ctx: &ProcessContext, task: &Task) -> eyre::Result<Option<serde_json::Value>>;
}

/// Maps task types to processors
///
/// Lookup returns the first registered processor that can handle the type.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Arc<dyn Processor>) {
        debug!(name = processor.name(), "ProcessorRegistry::register: called");
        self.processors.push(processor);
    }

    pub fn with(mut self, processor: Arc<dyn Processor>) -> Self {
        self.register(processor);
        self
    }

    pub fn find(&self, task_type: TaskType) -> Option<Arc<dyn Processor>> {
        self.processors.iter().find(|p| p.can_handle(task_type)).cloned()
    }

    /// Task types at least one processor claims
    pub fn handled_types(&self) -> Vec<TaskType> {
        TaskType::ALL
            .into_iter()
            .filter(|t| self.find(*t).is_some())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
