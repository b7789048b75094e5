//! Task event bus - lifecycle events over per-task topics
//!
//! Thin domain layer over [`taskbroker::TopicBus`]: serializes [`TaskEvent`]s
//! onto `task_stream:{task_id}` topics and deserializes them on the way out.
//! The topic namespace is distinct from the result-store key namespace, so
//! the two can never collide.

use thiserror::Error;
use tracing::debug;

use taskbroker::{BusError, TopicBus, TopicSubscription};

use crate::domain::TaskEvent;

/// Topic a task's lifecycle events are published on
pub fn stream_topic(task_id: &str) -> String {
    format!("task_stream:{task_id}")
}

/// Errors on the subscriber side of the event bus
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The subscriber fell behind and missed events
    #[error("subscription lagged, skipped {skipped} events")]
    Lagged { skipped: u64 },

    /// The topic closed underneath the subscriber
    #[error("topic closed")]
    Closed,

    /// A message on the topic was not a valid event
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Publish/subscribe access to task lifecycle events
#[derive(Clone, Default)]
pub struct TaskBus {
    topics: TopicBus,
}

impl TaskBus {
    pub fn new(topics: TopicBus) -> Self {
        Self { topics }
    }

    /// Publish a lifecycle event for a task
    ///
    /// Fire-and-forget: a task nobody is streaming has no subscribers, and
    /// that is the normal case, not an error. Returns the number of
    /// subscribers reached.
    pub fn publish(&self, task_id: &str, event: &TaskEvent) -> usize {
        let topic = stream_topic(task_id);
        // TaskEvent is a plain struct of serializable fields; encoding cannot fail
        let payload = serde_json::to_string(event).unwrap_or_default();
        let delivered = self.topics.publish(&topic, payload);
        debug!(%task_id, event = %event.event, delivered, "TaskBus::publish");
        delivered
    }

    /// Subscribe to a task's lifecycle events
    ///
    /// Events published after this call returns are guaranteed to be
    /// observable on the returned subscription.
    pub fn subscribe(&self, task_id: &str) -> EventSubscription {
        EventSubscription {
            inner: self.topics.subscribe(&stream_topic(task_id)),
        }
    }

    /// Number of live subscribers for a task
    pub fn subscriber_count(&self, task_id: &str) -> usize {
        self.topics.subscriber_count(&stream_topic(task_id))
    }
}

/// A live subscription to one task's events
///
/// Dropping it unsubscribes; the underlying topic is pruned when its last
/// subscriber leaves.
pub struct EventSubscription {
    inner: TopicSubscription,
}

impl EventSubscription {
    /// Wait for the next lifecycle event
    pub async fn recv(&mut self) -> Result<TaskEvent, EventBusError> {
        let raw = self.inner.recv().await.map_err(|e| match e {
            BusError::Lagged { skipped } => EventBusError::Lagged { skipped },
            BusError::Closed => EventBusError::Closed,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}
