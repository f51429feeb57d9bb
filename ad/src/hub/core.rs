//! Main Hub task implementation

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::HubConfig;
use super::handle::HubHandle;
use super::messages::{HubMessage, HubMetrics, HubRequest};
use crate::domain::RepoId;

/// Which observers a message is meant for
#[derive(Debug, Clone, Copy)]
enum Audience {
    Everyone,
    Unfiltered,
    Repo(RepoId),
}

/// One registered observer as seen by the hub
struct ObserverSlot {
    tx: mpsc::Sender<Arc<HubMessage>>,
    repo_filter: Option<RepoId>,
}

impl ObserverSlot {
    fn wants(&self, audience: Audience) -> bool {
        match audience {
            Audience::Everyone => true,
            Audience::Unfiltered => self.repo_filter.is_none(),
            Audience::Repo(repo_id) => self.repo_filter.is_none_or(|r| r == repo_id),
        }
    }
}

/// The Hub fans state changes out to live observers
///
/// All registry mutations and broadcasts are serialized through this task.
/// Each observer has its own bounded buffer; an observer whose buffer is full
/// is dropped instead of stalling the broadcaster.
pub struct Hub {
    config: HubConfig,
    tx: mpsc::Sender<HubRequest>,
    rx: mpsc::Receiver<HubRequest>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        Self { config, tx, rx }
    }

    /// Create a cloneable handle for broadcasters and observers
    pub fn handle(&self) -> HubHandle {
        HubHandle::new(self.tx.clone(), self.config.observer_buffer)
    }

    /// Run the Hub task
    ///
    /// Consumes the Hub and runs until shutdown is requested or every handle
    /// has been dropped.
    pub async fn run(self) {
        let Hub { config, tx, mut rx } = self;
        drop(tx);

        let mut observers: HashMap<String, ObserverSlot> = HashMap::new();
        let mut metrics = HubMetrics::default();

        let period = config.heartbeat_interval();
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(?period, "Hub started");

        loop {
            tokio::select! {
                req = rx.recv() => {
                    let Some(req) = req else {
                        debug!("Hub: all handles dropped");
                        break;
                    };

                    match req {
                        HubRequest::Register { observer_id, repo_filter, tx } => {
                            debug!(%observer_id, ?repo_filter, "Registering observer");
                            observers.insert(observer_id, ObserverSlot { tx, repo_filter });
                            metrics.observers = observers.len();
                        }

                        HubRequest::Unregister { observer_id } => {
                            debug!(%observer_id, "Unregistering observer");
                            observers.remove(&observer_id);
                            metrics.observers = observers.len();
                        }

                        HubRequest::SetFilter { observer_id, repo_filter } => {
                            match observers.get_mut(&observer_id) {
                                Some(slot) => {
                                    debug!(%observer_id, ?repo_filter, "Updating observer filter");
                                    slot.repo_filter = repo_filter;
                                }
                                None => debug!(%observer_id, "SetFilter for unknown observer"),
                            }
                        }

                        HubRequest::Broadcast { message, repo_id } => {
                            metrics.messages_broadcast += 1;
                            let audience = match repo_id {
                                Some(repo_id) => Audience::Repo(repo_id),
                                None => Audience::Unfiltered,
                            };
                            deliver(&mut observers, &mut metrics, &message, audience);
                        }

                        HubRequest::GetMetrics { reply_tx } => {
                            let _ = reply_tx.send(metrics.clone());
                        }

                        HubRequest::Shutdown => {
                            info!("Hub shutdown requested");
                            break;
                        }
                    }
                }

                _ = heartbeat.tick() => {
                    let message = Arc::new(HubMessage::heartbeat(observers.len()));
                    deliver(&mut observers, &mut metrics, &message, Audience::Everyone);
                }
            }
        }

        let remaining = observers.len();
        observers.clear();
        info!(released = remaining, "Hub stopped");
    }
}

/// Push a message into each matching observer's buffer without waiting
fn deliver(
    observers: &mut HashMap<String, ObserverSlot>,
    metrics: &mut HubMetrics,
    message: &Arc<HubMessage>,
    audience: Audience,
) {
    let mut disconnected = Vec::new();

    for (observer_id, slot) in observers.iter() {
        if !slot.wants(audience) {
            continue;
        }
        match slot.tx.try_send(Arc::clone(message)) {
            Ok(()) => metrics.messages_delivered += 1,
            Err(TrySendError::Full(_)) => {
                warn!(%observer_id, kind = %message.kind, "Observer buffer full, disconnecting");
                metrics.messages_dropped += 1;
                metrics.observers_disconnected += 1;
                disconnected.push(observer_id.clone());
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%observer_id, "Observer went away");
                disconnected.push(observer_id.clone());
            }
        }
    }

    for observer_id in disconnected {
        observers.remove(&observer_id);
    }
    metrics.observers = observers.len();
}
