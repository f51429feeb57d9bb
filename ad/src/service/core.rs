//! Coordinating service: owns lifecycle and shutdown order of every component

use std::sync::Arc;

use eyre::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatch::Dispatcher;
use super::error::ServiceError;
use crate::activity::ActivityLog;
use crate::config::Config;
use crate::domain::{NewTask, TriggerEvent};
use crate::hub::{Hub, HubHandle, HubMessage, MessageType};
use crate::periodic::{PeriodicScheduler, RepositoryLister};
use crate::processor::ProcessorRegistry;
use crate::queue::{CancelOutcome, EnqueueResult, QueueStats, Reporter, TaskQueue, WorkerPool};

/// Background tasks owned while the service runs
struct Running {
    hub: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
}

/// Lifecycle of the service
enum State {
    /// Built; the hub is parked until `start`
    Ready(Hub),
    Running(Running),
    Stopped,
}

/// The AutomationService wires the queue, workers, hub and periodic triggers
///
/// Start order: hub, workers, periodic timers, monitor. Stop cancels the
/// root token, waits for workers up to the shutdown timeout, then shuts the
/// hub down last so final updates still reach observers. A stopped service
/// cannot be restarted.
pub struct AutomationService {
    config: Arc<Config>,
    queue: Arc<TaskQueue>,
    registry: Arc<ProcessorRegistry>,
    dispatcher: Dispatcher,
    periodic: Arc<PeriodicScheduler>,
    hub: HubHandle,
    root: CancellationToken,
    state: Mutex<State>,
}

impl AutomationService {
    pub fn new(
        config: Config,
        registry: ProcessorRegistry,
        activity: Arc<dyn ActivityLog>,
        lister: Arc<dyn RepositoryLister>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        debug!(processors = registry.len(), "AutomationService::new: called");

        let root = CancellationToken::new();
        let hub = Hub::new(config.hub.clone());
        let hub_handle = hub.handle();

        let reporter = Reporter::new(activity, hub_handle.clone());
        let queue = TaskQueue::new(config.queue.clone(), reporter, root.child_token());
        let dispatcher = Dispatcher::new(Arc::clone(&queue), config.service.features);
        let periodic = Arc::new(PeriodicScheduler::new(
            config.periodic.clone(),
            lister,
            dispatcher.clone(),
        ));

        Ok(Self {
            config,
            queue,
            registry: Arc::new(registry),
            dispatcher,
            periodic,
            hub: hub_handle,
            root,
            state: Mutex::new(State::Ready(hub)),
        })
    }

    pub async fn start(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let hub = match std::mem::replace(&mut *state, State::Stopped) {
            State::Ready(hub) => hub,
            other => {
                *state = other;
                return Err(ServiceError::AlreadyStarted);
            }
        };

        info!(
            workers = self.config.queue.workers,
            periodic = self.config.periodic.enabled,
            "Starting automation service"
        );

        let hub = tokio::spawn(hub.run());
        let workers = WorkerPool::spawn(
            Arc::clone(&self.queue),
            Arc::clone(&self.registry),
            self.config.queue.workers,
            self.root.child_token(),
        );

        let mut background = Vec::new();
        if self.config.periodic.enabled {
            background.extend(self.periodic.spawn(self.root.child_token()));
        }
        background.push(tokio::spawn(monitor_loop(
            Arc::clone(&self.queue),
            self.hub.clone(),
            self.config.service.monitor_interval(),
            self.root.child_token(),
        )));

        *state = State::Running(Running {
            hub,
            workers,
            background,
        });
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let running = match std::mem::replace(&mut *state, State::Stopped) {
            State::Running(running) => running,
            other => {
                *state = other;
                return Err(ServiceError::NotStarted);
            }
        };
        drop(state);

        info!("Stopping automation service");
        self.root.cancel();

        let timeout = self.config.service.shutdown_timeout();
        let workers = futures::future::join_all(running.workers);
        if tokio::time::timeout(timeout, workers).await.is_err() {
            warn!(?timeout, "Workers did not finish before the shutdown timeout");
        }
        futures::future::join_all(running.background).await;

        self.hub
            .broadcast(HubMessage::of(MessageType::QueueStats, &self.queue.stats().await));
        if let Err(e) = self.hub.shutdown().await {
            debug!(error = %e, "Hub already stopped");
        }
        let _ = running.hub.await;

        info!("Automation service stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, State::Running(_))
    }

    /// Translate an event into a task; `None` when its category is disabled
    pub async fn enqueue_for(&self, event: TriggerEvent) -> Option<EnqueueResult> {
        self.dispatcher.enqueue_for(event).await
    }

    /// Enqueue a caller-built task, bypassing feature toggles
    pub async fn enqueue(&self, task: NewTask) -> EnqueueResult {
        self.queue.enqueue(task).await
    }

    pub async fn cancel(&self, task_id: &str) -> CancelOutcome {
        self.queue.cancel(task_id).await
    }

    pub async fn stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    pub fn periodic(&self) -> &Arc<PeriodicScheduler> {
        &self.periodic
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Child of the service's root token, for tasks that share its lifetime
    pub fn shutdown_token(&self) -> CancellationToken {
        self.root.child_token()
    }
}

/// Push queue stats to observers on a fixed interval
async fn monitor_loop(
    queue: Arc<TaskQueue>,
    hub: HubHandle,
    period: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let stats = queue.stats().await;
                debug!(pending = stats.pending, in_flight = stats.in_flight, "monitor: sampled queue");
                hub.broadcast(HubMessage::of(MessageType::QueueStats, &stats));
            }
        }
    }
    debug!("monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityKind, MemoryActivityLog};
    use crate::domain::{IssueSnapshot, RepoRef};
    use crate::periodic::StaticRepositoryLister;
    use crate::processor::DryRunProcessor;
    use crate::queue::PoolStatus;
    use std::time::Duration;

    fn service(config: Config) -> (AutomationService, Arc<MemoryActivityLog>) {
        let activity = Arc::new(MemoryActivityLog::new());
        let registry = ProcessorRegistry::new().with(Arc::new(DryRunProcessor));
        let lister = Arc::new(StaticRepositoryLister::new(vec![RepoRef::new(1, 1, "acme/one")]));
        (
            AutomationService::new(config, registry, activity.clone(), lister).unwrap(),
            activity,
        )
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.queue.poll_interval_ms = 5;
        config.periodic.enabled = false;
        config
    }

    fn issue_event(number: i64) -> TriggerEvent {
        TriggerEvent::IssueCreated {
            repo: RepoRef::new(1, 1, "acme/one"),
            issue: IssueSnapshot {
                number,
                title: "Broken".to_string(),
                author: "octo".to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let (service, _) = service(fast_config());

        assert_eq!(service.stop().await, Err(ServiceError::NotStarted));
        service.start().await.unwrap();
        assert!(service.is_running().await);
        assert_eq!(service.start().await, Err(ServiceError::AlreadyStarted));

        service.stop().await.unwrap();
        assert!(!service.is_running().await);
        assert_eq!(service.stop().await, Err(ServiceError::NotStarted));
        assert_eq!(service.start().await, Err(ServiceError::AlreadyStarted));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.queue.workers = 0;
        let result = AutomationService::new(
            config,
            ProcessorRegistry::new(),
            Arc::new(MemoryActivityLog::new()),
            Arc::new(StaticRepositoryLister::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_events_flow_to_completion() {
        let (service, activity) = service(fast_config());
        service.start().await.unwrap();

        for n in 0..4 {
            assert!(service.enqueue_for(issue_event(n)).await.unwrap().is_enqueued());
        }

        for _ in 0..500 {
            if service.stats().await.total_processed == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let stats = service.stats().await;
        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.workers, 3);
        assert_eq!(stats.status, PoolStatus::Running);
        assert_eq!(activity.count(ActivityKind::Completed), 4);

        service.stop().await.unwrap();
        assert_eq!(service.stats().await.status, PoolStatus::Stopped);
    }

    #[tokio::test]
    async fn test_monitor_pushes_queue_stats() {
        let mut config = fast_config();
        config.service.monitor_interval_secs = 1;
        let (service, _) = service(config);
        service.start().await.unwrap();

        let mut observer = service.hub().register(None).await.unwrap();
        let message = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                match observer.recv().await {
                    Some(m) if m.kind == MessageType::QueueStats && m.data["workers"] == 3 => return m,
                    Some(_) => continue,
                    None => panic!("observer dropped"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(message.data["status"], "running");

        service.stop().await.unwrap();
    }
}
