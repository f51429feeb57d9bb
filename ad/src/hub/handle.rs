//! HubHandle - client interface for broadcasters and observers

use std::sync::Arc;

use eyre::{Result, eyre};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use super::messages::{HubMessage, HubMetrics, HubRequest};
use crate::domain::RepoId;

/// Cloneable handle to the Hub task
///
/// Broadcasting never waits: if the hub's request queue is full the message
/// is dropped and logged.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubRequest>,
    observer_buffer: usize,
}

impl HubHandle {
    pub(crate) fn new(tx: mpsc::Sender<HubRequest>, observer_buffer: usize) -> Self {
        Self {
            tx,
            observer_buffer: observer_buffer.max(1),
        }
    }

    /// Register an observer with the configured buffer size
    pub async fn register(&self, repo_filter: Option<RepoId>) -> Result<Observer> {
        self.register_with_capacity(repo_filter, self.observer_buffer).await
    }

    /// Register an observer with an explicit buffer size
    pub async fn register_with_capacity(&self, repo_filter: Option<RepoId>, capacity: usize) -> Result<Observer> {
        let observer_id = Uuid::now_v7().to_string();
        debug!(%observer_id, ?repo_filter, capacity, "HubHandle::register: called");
        let (tx, rx) = mpsc::channel(capacity.max(1));

        self.tx
            .send(HubRequest::Register {
                observer_id: observer_id.clone(),
                repo_filter,
                tx,
            })
            .await
            .map_err(|_| eyre!("Hub channel closed"))?;

        Ok(Observer { id: observer_id, rx })
    }

    pub async fn unregister(&self, observer_id: &str) -> Result<()> {
        debug!(%observer_id, "HubHandle::unregister: called");
        self.tx
            .send(HubRequest::Unregister {
                observer_id: observer_id.to_string(),
            })
            .await
            .map_err(|_| eyre!("Hub channel closed"))?;
        Ok(())
    }

    /// Restrict an observer to one repository, or clear its filter with `None`
    pub async fn set_filter(&self, observer_id: &str, repo_filter: Option<RepoId>) -> Result<()> {
        debug!(%observer_id, ?repo_filter, "HubHandle::set_filter: called");
        self.tx
            .send(HubRequest::SetFilter {
                observer_id: observer_id.to_string(),
                repo_filter,
            })
            .await
            .map_err(|_| eyre!("Hub channel closed"))?;
        Ok(())
    }

    /// Send to unfiltered observers
    pub fn broadcast(&self, message: HubMessage) {
        self.publish(message, None);
    }

    /// Send to observers filtered on `repo_id` plus unfiltered observers
    pub fn broadcast_repo(&self, repo_id: RepoId, message: HubMessage) {
        self.publish(message, Some(repo_id));
    }

    /// Route by optional repository
    pub fn publish(&self, message: HubMessage, repo_id: Option<RepoId>) {
        let kind = message.kind;
        let request = HubRequest::Broadcast {
            message: Arc::new(message),
            repo_id,
        };
        match self.tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(%kind, ?repo_id, "Hub request queue full, message dropped"),
            Err(TrySendError::Closed(_)) => debug!(%kind, "Hub stopped, message dropped"),
        }
    }

    pub async fn metrics(&self) -> Result<HubMetrics> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(HubRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| eyre!("Hub channel closed"))?;
        reply_rx.await.map_err(|_| eyre!("Hub dropped metrics request"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        debug!("HubHandle::shutdown: called");
        self.tx
            .send(HubRequest::Shutdown)
            .await
            .map_err(|_| eyre!("Hub channel closed"))?;
        Ok(())
    }
}

/// Receiving end of one observer registration
///
/// `recv` returns `None` once the hub has dropped this observer (buffer
/// overflow, unregister or shutdown).
pub struct Observer {
    id: String,
    rx: mpsc::Receiver<Arc<HubMessage>>,
}

impl Observer {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn recv(&mut self) -> Option<Arc<HubMessage>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<HubMessage>> {
        self.rx.try_recv().ok()
    }
}
