//! Periodic trigger scheduler

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::PeriodicConfig;
use crate::domain::{RepoRef, ScheduledTrigger, TriggerEvent};
use crate::queue::EnqueueResult;
use crate::service::Dispatcher;

/// Source of the repositories the daily trigger covers
#[async_trait]
pub trait RepositoryLister: Send + Sync {
    async fn list_repositories(&self) -> eyre::Result<Vec<RepoRef>>;
}

/// Fixed repository list, typically from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticRepositoryLister {
    repositories: Vec<RepoRef>,
}

impl StaticRepositoryLister {
    pub fn new(repositories: Vec<RepoRef>) -> Self {
        Self { repositories }
    }
}

#[async_trait]
impl RepositoryLister for StaticRepositoryLister {
    async fn list_repositories(&self) -> eyre::Result<Vec<RepoRef>> {
        Ok(self.repositories.clone())
    }
}

/// Fires the daily and hourly maintenance triggers
pub struct PeriodicScheduler {
    config: PeriodicConfig,
    lister: Arc<dyn RepositoryLister>,
    dispatcher: Dispatcher,
}

impl PeriodicScheduler {
    pub fn new(config: PeriodicConfig, lister: Arc<dyn RepositoryLister>, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            lister,
            dispatcher,
        }
    }

    pub fn config(&self) -> &PeriodicConfig {
        &self.config
    }

    /// One daily-report task per known repository; returns how many were queued
    pub async fn fire_daily(&self) -> eyre::Result<usize> {
        let repositories = self.lister.list_repositories().await?;
        debug!(repositories = repositories.len(), "PeriodicScheduler::fire_daily: called");

        let mut queued = 0;
        for repo in repositories {
            let event = TriggerEvent::Scheduled(ScheduledTrigger::DailyReport { repo });
            if let Some(EnqueueResult::Enqueued(_)) = self.dispatcher.enqueue_for(event).await {
                queued += 1;
            }
        }

        info!(queued, "Daily trigger fired");
        Ok(queued)
    }

    /// A single stale-management task; returns whether it was queued
    pub async fn fire_hourly(&self) -> bool {
        let event = TriggerEvent::Scheduled(ScheduledTrigger::StaleManagement {
            stale_after_days: self.config.stale_after_days,
        });
        let queued = matches!(self.dispatcher.enqueue_for(event).await, Some(EnqueueResult::Enqueued(_)));
        info!(queued, "Hourly trigger fired");
        queued
    }

    /// Start both timers; they stop when `cancel` fires
    ///
    /// Timers first fire one full interval after start.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            daily = ?self.config.daily_interval(),
            hourly = ?self.config.hourly_interval(),
            "Starting periodic triggers"
        );

        let daily = tokio::spawn(Arc::clone(self).run_daily(cancel.child_token()));
        let hourly = tokio::spawn(Arc::clone(self).run_hourly(cancel.child_token()));
        vec![daily, hourly]
    }

    async fn run_daily(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = ticker(self.config.daily_interval());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.fire_daily().await {
                        warn!(error = %e, "Daily trigger failed to list repositories");
                    }
                }
            }
        }
        debug!("daily timer stopped");
    }

    async fn run_hourly(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = ticker(self.config.hourly_interval());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.fire_hourly().await;
                }
            }
        }
        debug!("hourly timer stopped");
    }
}

/// Interval whose first tick is one period away
fn ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
