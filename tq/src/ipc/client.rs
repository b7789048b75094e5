//! IPC client - the CLI side of the socket protocol

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::get_socket_path;
use super::messages::{Request, Response};

/// Default timeout for single-reply operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for talking to the daemon over its Unix socket
#[derive(Debug, Clone)]
pub struct QueueClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for QueueClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueClient {
    /// Create a client with the default socket path
    pub fn new() -> Self {
        Self {
            socket_path: get_socket_path(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a client with a custom socket path
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout for single-reply operations
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Submit a task; returns (task_id, status)
    pub async fn queue(
        &self,
        task_type: &str,
        payload: &str,
        task_id: Option<&str>,
    ) -> Result<(String, String)> {
        let response = self
            .send_request(Request::Queue {
                task_type: task_type.to_string(),
                payload: payload.to_string(),
                task_id: task_id.map(String::from),
            })
            .await?;

        match response {
            Response::Queued { task_id, status, .. } => Ok((task_id, status)),
            Response::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            other => Err(eyre::eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Resolve a task's status; returns (status, result)
    pub async fn status(&self, task_id: &str) -> Result<(String, Option<serde_json::Value>)> {
        let response = self
            .send_request(Request::Status {
                task_id: task_id.to_string(),
            })
            .await?;

        match response {
            Response::Status { status, result, .. } => Ok((status, result)),
            Response::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            other => Err(eyre::eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Check if the daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        match self.send_request(Request::Ping).await? {
            Response::Pong { version } => Ok(version),
            Response::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            other => Err(eyre::eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Request the daemon to shut down gracefully
    pub async fn shutdown(&self) -> Result<()> {
        match self.send_request(Request::Shutdown).await? {
            Response::Ok => Ok(()),
            Response::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            other => Err(eyre::eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Follow a task's event stream, invoking `on_response` per line
    ///
    /// Returns when the terminal event has been delivered or the daemon
    /// closes the connection. No timeout is applied between events - a task
    /// may legitimately run for a long time.
    pub async fn watch(&self, task_id: &str, mut on_response: impl FnMut(&Response)) -> Result<()> {
        debug!(%task_id, "QueueClient::watch");
        let mut stream = self.connect().await?;
        write_line(
            &mut stream,
            &Request::Subscribe {
                task_id: task_id.to_string(),
            },
        )
        .await?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await.context("Failed to read event")?;
            if bytes_read == 0 {
                // daemon closed the stream
                return Ok(());
            }

            let response: Response =
                serde_json::from_str(line.trim()).context("Failed to parse event line")?;
            let terminal = response.is_terminal_event();
            on_response(&response);
            if terminal {
                return Ok(());
            }
        }
    }

    async fn connect(&self) -> Result<UnixStream> {
        tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")
    }

    /// Send a request and wait for its single response line
    async fn send_request(&self, request: Request) -> Result<Response> {
        debug!(?self.socket_path, ?request, "QueueClient::send_request");
        let mut stream = self.connect().await?;

        tokio::time::timeout(self.timeout, write_line(&mut stream, &request))
            .await
            .context("Write timeout")??;

        let mut reader = BufReader::new(&mut stream);
        let mut line = String::new();
        tokio::time::timeout(self.timeout, reader.read_line(&mut line))
            .await
            .context("Read timeout")?
            .context("Failed to read response")?;

        let response: Response =
            serde_json::from_str(line.trim()).context("Failed to parse daemon response")?;
        debug!(?response, "QueueClient: received response");
        Ok(response)
    }
}

/// Serialize one request line onto the stream
async fn write_line(stream: &mut UnixStream, request: &Request) -> Result<()> {
    let json = serde_json::to_string(request).context("Failed to serialize request")?;
    stream.write_all(json.as_bytes()).await.context("Failed to write request")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_client_default_path() {
        let client = QueueClient::default();
        assert!(client.socket_path.ends_with("queue.sock"));
    }

    #[test]
    fn test_client_with_custom_path() {
        let path = PathBuf::from("/custom/queue.sock");
        let client = QueueClient::with_socket_path(path.clone());
        assert_eq!(client.socket_path, path);
    }

    #[test]
    fn test_client_with_timeout() {
        let client = QueueClient::new().with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_socket_exists_false() {
        let temp = TempDir::new().unwrap();
        let client = QueueClient::with_socket_path(temp.path().join("nope.sock"));
        assert!(!client.socket_exists());
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket_fails() {
        let temp = TempDir::new().unwrap();
        let client = QueueClient::with_socket_path(temp.path().join("nope.sock"))
            .with_timeout(Duration::from_millis(200));
        assert!(client.ping().await.is_err());
    }
}
