//! Unix socket transport for hub observers
//!
//! Each connection is registered as an observer and receives one JSON
//! envelope per line. The client may write filter requests, also one per
//! line. The connection closes when the hub drops the observer.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::HubHandle;
use super::messages::{FilterRequest, HubMessage};
use crate::domain::RepoId;

/// Longest filter request line accepted from a client
const MAX_REQUEST_SIZE: usize = 1024;

/// Bind the observer socket, replacing any stale file from a previous run
pub fn bind_observer_socket(socket_path: &Path) -> Result<UnixListener> {
    debug!(?socket_path, "bind_observer_socket: called");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "bind_observer_socket: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind observer socket")?;
    info!(?socket_path, "Observer socket listening");
    Ok(listener)
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Accept observer connections until cancelled
pub async fn serve_observers(listener: UnixListener, hub: HubHandle, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("serve_observers: cancelled");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let hub = hub.clone();
                    let cancel = cancel.child_token();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, hub, cancel).await {
                            debug!(error = %e, "Observer connection ended with error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Failed to accept observer connection"),
            }
        }
    }
}

/// Pump hub messages to one client and apply its filter requests
async fn handle_connection(stream: UnixStream, hub: HubHandle, cancel: CancellationToken) -> Result<()> {
    let mut observer = hub.register(None).await?;
    let observer_id = observer.id().to_string();
    debug!(%observer_id, "Observer connected");

    let (read_half, mut write_half) = stream.into_split();
    let mut requests = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_REQUEST_SIZE));

    let result = async {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = observer.recv() => {
                    let Some(message) = message else {
                        debug!(%observer_id, "Hub released observer, closing connection");
                        break;
                    };
                    write_message(&mut write_half, &message).await?;
                }
                request = requests.next() => match request {
                    Some(Ok(line)) => apply_filter_request(&hub, &observer_id, &line).await?,
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!(%observer_id, limit = MAX_REQUEST_SIZE, "Filter request too long, closing connection");
                        break;
                    }
                    Some(Err(LinesCodecError::Io(e))) => return Err(e).context("Failed to read from observer"),
                    None => {
                        debug!(%observer_id, "Observer closed connection");
                        break;
                    }
                },
            }
        }
        Ok::<_, eyre::Report>(())
    }
    .await;

    let _ = hub.unregister(&observer_id).await;
    result
}

async fn apply_filter_request(hub: &HubHandle, observer_id: &str, line: &str) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<FilterRequest>(line) {
        Ok(request) => hub.set_filter(observer_id, request.repo_filter()).await,
        Err(e) => {
            warn!(%observer_id, error = %e, "Ignoring malformed filter request");
            Ok(())
        }
    }
}

async fn write_message(writer: &mut OwnedWriteHalf, message: &HubMessage) -> Result<()> {
    let json = serde_json::to_string(message).context("Failed to serialize hub message")?;
    writer.write_all(json.as_bytes()).await.context("Failed to write hub message")?;
    writer.write_all(b"\n").await.context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush hub message")?;
    Ok(())
}

/// Client side of the observer socket
pub struct ObserverClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ObserverClient {
    pub async fn connect(socket_path: impl Into<PathBuf>) -> Result<Self> {
        let socket_path = socket_path.into();
        debug!(?socket_path, "ObserverClient::connect: called");
        let stream = UnixStream::connect(&socket_path)
            .await
            .context(format!("Failed to connect to {}", socket_path.display()))?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        })
    }

    /// Limit delivery to one repository, or lift the filter with `None`
    pub async fn set_filter(&mut self, repo_id: Option<RepoId>) -> Result<()> {
        let request = match repo_id {
            Some(repo_id) => FilterRequest::SubscribeRepo { repo_id },
            None => FilterRequest::UnsubscribeRepo { repo_id: None },
        };
        let json = serde_json::to_string(&request)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next envelope, or `None` when the server closed the connection
    pub async fn next_message(&mut self) -> Result<Option<HubMessage>> {
        loop {
            let Some(line) = self.lines.next_line().await.context("Failed to read hub message")? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            let message = serde_json::from_str(&line).context("Failed to parse hub message")?;
            return Ok(Some(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Hub, HubConfig, MessageType};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn wait_for_observers(hub: &HubHandle, count: usize) {
        for _ in 0..200 {
            if hub.metrics().await.unwrap().observers == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("observer count never reached {}", count);
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_file() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("nested").join("observers.sock");
        std::fs::create_dir_all(socket_path.parent().unwrap()).unwrap();
        std::fs::write(&socket_path, "stale").unwrap();

        let _listener = bind_observer_socket(&socket_path).unwrap();
        assert!(socket_path.exists());

        cleanup_socket(&socket_path);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_socket_round_trip_with_filter() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("observers.sock");

        let hub = Hub::new(HubConfig::default());
        let handle = hub.handle();
        tokio::spawn(hub.run());

        let listener = bind_observer_socket(&socket_path).unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(serve_observers(listener, handle.clone(), cancel.clone()));

        let mut client = ObserverClient::connect(&socket_path).await.unwrap();
        wait_for_observers(&handle, 1).await;

        client.set_filter(Some(11)).await.unwrap();
        // Give the connection task time to forward the filter
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.metrics().await.unwrap();

        handle.broadcast(HubMessage::new(MessageType::Activity, serde_json::json!({ "n": 1 })));
        handle.broadcast_repo(12, HubMessage::new(MessageType::Activity, serde_json::json!({ "n": 2 })));
        handle.broadcast_repo(11, HubMessage::new(MessageType::TaskUpdate, serde_json::json!({ "n": 3 })));

        let message = tokio::time::timeout(Duration::from_secs(2), client.next_message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(message.kind, MessageType::TaskUpdate);
        assert_eq!(message.data["n"], 3);

        cancel.cancel();
        let closed = tokio::time::timeout(Duration::from_secs(2), client.next_message())
            .await
            .unwrap()
            .unwrap();
        assert!(closed.is_none());
        wait_for_observers(&handle, 0).await;
    }

    #[tokio::test]
    async fn test_unterminated_request_closes_connection() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("observers.sock");

        let hub = Hub::new(HubConfig::default());
        let handle = hub.handle();
        tokio::spawn(hub.run());

        let listener = bind_observer_socket(&socket_path).unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(serve_observers(listener, handle.clone(), cancel.clone()));

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        wait_for_observers(&handle, 1).await;

        // No newline, so the server never sees a complete request
        stream.write_all(&vec![b'x'; MAX_REQUEST_SIZE * 4]).await.unwrap();
        stream.flush().await.unwrap();

        wait_for_observers(&handle, 0).await;
        cancel.cancel();
    }
}
