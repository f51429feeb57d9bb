//! autodev - priority task scheduler for repository automation
//!
//! Events from a development platform (issues, pull requests, approval
//! requests) and periodic timers become prioritized tasks. A fixed pool of
//! workers drains the queue, retrying failures with linear backoff, while a
//! notification hub fans live updates out to observers.
//!
//! # Modules
//!
//! - [`domain`] - Task, payloads, priorities and trigger events
//! - [`queue`] - Priority queue, retry policy and worker pool
//! - [`processor`] - Processor trait and registry
//! - [`hub`] - Observer fan-out and its Unix socket front end
//! - [`periodic`] - Daily and hourly triggers
//! - [`activity`] - Append-only activity log
//! - [`service`] - Lifecycle owner tying it all together
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod activity;
pub mod cli;
pub mod config;
pub mod domain;
pub mod hub;
pub mod periodic;
pub mod processor;
pub mod queue;
pub mod service;

// Re-export commonly used types
pub use activity::{ActivityKind, ActivityLog, ActivityRecord, JsonlActivityLog, MemoryActivityLog};
pub use config::Config;
pub use domain::{NewTask, Priority, RepoRef, Task, TaskPayload, TaskStatus, TaskType, TriggerEvent};
pub use hub::{Hub, HubHandle, HubMessage, MessageType, Observer};
pub use periodic::{PeriodicScheduler, RepositoryLister, StaticRepositoryLister};
pub use processor::{DryRunProcessor, ProcessContext, Processor, ProcessorRegistry};
pub use queue::{CancelOutcome, EnqueueResult, QueueConfig, QueueStats, TaskError, TaskQueue, WorkerPool};
pub use service::{AutomationService, Dispatcher, FeatureToggles, ServiceError};
