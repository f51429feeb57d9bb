//! Notification hub
//!
//! A single task owns the observer registry. Broadcasters talk to it through
//! [`HubHandle`] and never wait on observers; each observer drains its own
//! bounded buffer and is disconnected when that buffer overflows.

mod config;
mod core;
mod handle;
mod messages;
pub mod socket;

pub use config::{HubConfig, default_socket_path};
pub use core::Hub;
pub use handle::{HubHandle, Observer};
pub use messages::{FilterRequest, HubMessage, HubMetrics, MessageType};
