//! Periodic trigger scheduler
//!
//! Two fixed-interval timers: the daily one enqueues a report per known
//! repository, the hourly one a single stale-management sweep.

mod config;
mod core;

pub use config::PeriodicConfig;
pub use core::{PeriodicScheduler, RepositoryLister, StaticRepositoryLister};
