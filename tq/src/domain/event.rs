//! Lifecycle events - live notifications of state transitions
//!
//! Events are append-only and ephemeral: they exist on the bus for whoever is
//! subscribed at publish time and are never replayed. Within one task `start`
//! always precedes the terminal event, and at most one terminal event is ever
//! published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::TaskOutcome;

/// Kind of a lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The task transitioned pending -> running
    Start,
    /// Terminal: the task succeeded
    Complete,
    /// Terminal: the task failed
    Error,
}

impl EventKind {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One lifecycle notification as it travels over the bus
///
/// `ts` is internal bookkeeping; clients receive only the [`StreamFrame`]
/// projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Event kind
    pub event: EventKind,

    /// Result-or-error body (outcome JSON for terminal events)
    pub data: serde_json::Value,

    /// Publish timestamp
    pub ts: DateTime<Utc>,
}

impl TaskEvent {
    /// Start event for a task
    pub fn start(task_id: &str) -> Self {
        Self {
            event: EventKind::Start,
            data: serde_json::json!({ "task_id": task_id }),
            ts: Utc::now(),
        }
    }

    /// Terminal event carrying the task's outcome
    ///
    /// Serializing a `TaskOutcome` cannot fail (plain strings and a tag), so
    /// the conversion is infallible.
    pub fn terminal(outcome: &TaskOutcome) -> Self {
        let event = if outcome.is_success() {
            EventKind::Complete
        } else {
            EventKind::Error
        };
        Self {
            event,
            data: serde_json::to_value(outcome).unwrap_or(serde_json::Value::Null),
            ts: Utc::now(),
        }
    }

    /// Project to the client-facing frame
    pub fn into_frame(self) -> StreamFrame {
        StreamFrame {
            event: self.event,
            data: self.data,
        }
    }
}

/// What a stream subscriber actually receives: event kind + JSON data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFrame {
    pub event: EventKind,
    pub data: serde_json::Value,
}

impl StreamFrame {
    /// A synthesized error frame for internal stream faults
    pub fn fault(task_id: &str, error: impl std::fmt::Display, error_type: &str) -> Self {
        Self {
            event: EventKind::Error,
            data: serde_json::to_value(TaskOutcome::error(task_id, error.to_string(), error_type))
                .unwrap_or(serde_json::Value::Null),
        }
    }
}
