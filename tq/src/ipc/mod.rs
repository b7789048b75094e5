//! Serving layer - the queue's surface over a Unix Domain Socket
//!
//! HTTP routing is a collaborator, not part of the core, so the daemon speaks
//! a minimal JSON-over-newline protocol instead: one request line in, one or
//! more response lines out. `Subscribe` is the streaming case - the
//! connection stays open and receives one `Event` line per lifecycle event
//! until the terminal one.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::QueueClient;
pub use listener::{cleanup_socket, create_listener_at, serve};
pub use messages::{Request, Response};

/// Get the default socket path for the daemon
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("taskqueue")
        .join("queue.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_queue_sock() {
        let path = get_socket_path();
        assert!(path.ends_with("taskqueue/queue.sock"));
    }
}
