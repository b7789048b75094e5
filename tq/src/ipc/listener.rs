//! IPC listener - the daemon side of the socket protocol
//!
//! Accepts connections, reads one request line per connection, and answers.
//! `Subscribe` keeps the connection open and streams `Event` lines; a broken
//! write is treated as a client disconnect, which ends that stream and
//! nothing else.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::QueueApi;

use super::messages::{Request, Response};

/// Maximum request line size
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Create and bind a Unix Domain Socket listener
///
/// Handles cleanup of stale socket files from previous runs.
pub fn create_listener_at(socket_path: &Path) -> Result<UnixListener> {
    debug!(?socket_path, "create_listener: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener: socket bound");
    Ok(listener)
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &PathBuf) {
    if socket_path.exists() {
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Accept connections until a `Shutdown` request arrives
///
/// Each connection is handled on its own task, so a long-lived subscription
/// never blocks the accept loop.
pub async fn serve(listener: UnixListener, api: Arc<QueueApi>) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    info!("IPC listener serving");

    loop {
        let accepted = tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, _addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let api = Arc::clone(&api);
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, api, shutdown_tx).await {
                debug!(error = %e, "connection ended with error");
            }
        });
    }

    info!("IPC listener stopped");
    Ok(())
}

/// Handle one connection: read a request, answer it
async fn handle_connection(
    mut stream: UnixStream,
    api: Arc<QueueApi>,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let request = read_request(&mut stream).await?;
    debug!(?request, "handle_connection: request");

    match request {
        Request::Queue {
            task_type,
            payload,
            task_id,
        } => {
            let response = match api.queue_task(&task_type, crate::api::QueueRequest { task_id, payload }) {
                Ok(queued) => Response::Queued {
                    task_id: queued.task_id,
                    status: queued.status,
                    message: queued.message,
                },
                Err(e) => Response::Error { message: e.to_string() },
            };
            send_response(&mut stream, &response).await
        }

        Request::Status { task_id } => {
            let status = api.task_status(&task_id).await;
            send_response(
                &mut stream,
                &Response::Status {
                    task_id: status.task_id,
                    status: status.status,
                    result: status.result,
                },
            )
            .await
        }

        Request::Subscribe { task_id } => stream_events(&mut stream, &api, &task_id).await,

        Request::Ping => {
            send_response(
                &mut stream,
                &Response::Pong {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            )
            .await
        }

        Request::Shutdown => {
            send_response(&mut stream, &Response::Ok).await?;
            info!("shutdown requested over IPC");
            let _ = shutdown_tx.send(true);
            Ok(())
        }
    }
}

/// Forward stream frames as `Event` lines until the terminal one
///
/// Dropping the api-side receiver on return is what signals disconnect to
/// the bridge loop, so an early write failure cleans up the stream too.
async fn stream_events(stream: &mut UnixStream, api: &QueueApi, task_id: &str) -> Result<()> {
    let mut frames = api.subscribe(task_id);

    while let Some(frame) = frames.recv().await {
        let terminal = frame.event.is_terminal();
        send_response(stream, &Response::event(frame)).await?;
        if terminal {
            break;
        }
    }
    Ok(())
}

/// Read a single request line with a size limit
async fn read_request(stream: &mut UnixStream) -> Result<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    let bytes_read = reader.read_line(&mut line).await.context("Failed to read IPC request")?;

    if bytes_read > MAX_MESSAGE_SIZE {
        return Err(eyre::eyre!("Request too large: {} bytes", bytes_read));
    }
    if line.is_empty() {
        return Err(eyre::eyre!("Empty request received"));
    }

    serde_json::from_str(line.trim()).context("Failed to parse IPC request")
}

/// Send one response line
async fn send_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
    let json = serde_json::to_string(response).context("Failed to serialize response")?;
    stream.write_all(json.as_bytes()).await.context("Failed to write response")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush response")?;
    Ok(())
}
