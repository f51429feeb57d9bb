//! Coordinating service
//!
//! Owns creation and shutdown order of the queue, worker pool, hub and
//! periodic triggers, and translates external events into tasks.

mod config;
mod core;
mod dispatch;
mod error;

pub use config::{FeatureToggles, ServiceConfig};
pub use core::AutomationService;
pub use dispatch::{Dispatcher, task_for_event};
pub use error::ServiceError;
