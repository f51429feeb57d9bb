//! Message types for the notification hub

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::domain::RepoId;

/// Envelope `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Activity,
    QueueStats,
    TaskUpdate,
    Heartbeat,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Activity => "activity",
            Self::QueueStats => "queue_stats",
            Self::TaskUpdate => "task_update",
            Self::Heartbeat => "heartbeat",
        };
        f.write_str(s)
    }
}

/// Envelope delivered to observers: `{type, timestamp, data}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl HubMessage {
    pub fn new(kind: MessageType, data: serde_json::Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Serialize `data` into an envelope; unserializable data becomes null
    pub fn of<T: Serialize>(kind: MessageType, data: &T) -> Self {
        Self::new(kind, serde_json::to_value(data).unwrap_or(serde_json::Value::Null))
    }

    pub fn heartbeat(observers: usize) -> Self {
        Self::new(MessageType::Heartbeat, serde_json::json!({ "observers": observers }))
    }
}

/// Filter request sent by an observer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FilterRequest {
    SubscribeRepo {
        repo_id: RepoId,
    },
    UnsubscribeRepo {
        #[serde(default)]
        repo_id: Option<RepoId>,
    },
}

impl FilterRequest {
    /// The filter the observer ends up with
    pub fn repo_filter(&self) -> Option<RepoId> {
        match self {
            Self::SubscribeRepo { repo_id } => Some(*repo_id),
            Self::UnsubscribeRepo { .. } => None,
        }
    }
}

/// Hub counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubMetrics {
    pub observers: usize,
    pub messages_broadcast: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
    pub observers_disconnected: u64,
}

/// Internal requests to the hub task
#[derive(Debug)]
pub enum HubRequest {
    Register {
        observer_id: String,
        repo_filter: Option<RepoId>,
        tx: mpsc::Sender<Arc<HubMessage>>,
    },

    Unregister {
        observer_id: String,
    },

    SetFilter {
        observer_id: String,
        repo_filter: Option<RepoId>,
    },

    /// `repo_id: None` reaches unfiltered observers only
    Broadcast {
        message: Arc<HubMessage>,
        repo_id: Option<RepoId>,
    },

    GetMetrics {
        reply_tx: oneshot::Sender<HubMetrics>,
    },

    /// Release every observer and stop the hub task
    Shutdown,
}
