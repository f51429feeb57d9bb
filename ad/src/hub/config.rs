//! Notification hub configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Messages buffered per observer before it is disconnected
    #[serde(rename = "observer-buffer")]
    pub observer_buffer: usize,

    /// Pending requests (broadcasts, registrations) the hub task will hold
    #[serde(rename = "channel-buffer")]
    pub channel_buffer: usize,

    /// Heartbeat period in seconds
    #[serde(rename = "heartbeat-secs")]
    pub heartbeat_secs: u64,

    /// Unix socket observers connect to
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            observer_buffer: 256,
            channel_buffer: 1024,
            heartbeat_secs: 30,
            socket_path: None,
        }
    }
}

impl HubConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    /// Configured socket path, or the runtime-dir default
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(default_socket_path)
    }
}

/// Default observer socket location
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("autodev")
        .join("observers.sock")
}
