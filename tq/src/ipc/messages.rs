//! IPC message types
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON
//! followed by `\n`. Requests get exactly one response line, except
//! `Subscribe`, which streams `Event` lines until a terminal event.

use serde::{Deserialize, Serialize};

use crate::domain::{EventKind, StreamFrame};

/// Requests from the CLI/clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Submit a task of the given type
    Queue {
        task_type: String,
        payload: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },

    /// Resolve the status of a task
    Status { task_id: String },

    /// Stream a task's lifecycle events
    Subscribe { task_id: String },

    /// Check if the daemon is alive
    Ping,

    /// Ask the daemon to stop gracefully
    Shutdown,
}

/// Responses from the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// A task was accepted
    Queued {
        task_id: String,
        status: String,
        message: String,
    },

    /// Resolved task status
    Status {
        task_id: String,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },

    /// One lifecycle event on a subscribed stream
    Event {
        event: EventKind,
        data: serde_json::Value,
    },

    /// Acknowledgment
    Ok,

    /// Pong response to ping
    Pong { version: String },

    /// Error response
    Error { message: String },
}

impl Response {
    /// Wrap a stream frame for the wire
    pub fn event(frame: StreamFrame) -> Self {
        Self::Event {
            event: frame.event,
            data: frame.data,
        }
    }

    /// Whether this line ends a subscription stream
    pub fn is_terminal_event(&self) -> bool {
        matches!(
            self,
            Self::Event {
                event: EventKind::Complete | EventKind::Error,
                ..
            }
        )
    }
}
