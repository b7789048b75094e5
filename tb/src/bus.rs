//! Topic bus - per-topic pub/sub channels
//!
//! Each topic is backed by its own tokio broadcast channel. Topics come into
//! existence when the first subscriber arrives and are pruned when the last
//! subscription is dropped, so an idle bus holds no state. Publishing to a
//! topic nobody listens on delivers nowhere - messages are ephemeral and are
//! never replayed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors observed on the receiving side of a subscription
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// The subscriber fell behind and `skipped` messages were dropped
    #[error("subscriber lagged, skipped {skipped} messages")]
    Lagged { skipped: u64 },

    /// The topic's channel closed underneath the subscriber
    #[error("topic closed")]
    Closed,
}

/// Shared topic table
struct BusInner {
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

/// Per-topic publish/subscribe bus
///
/// Cloning is cheap; all clones share the same topic table. Multiple
/// subscribers on one topic each receive their own copy of every message
/// published after they subscribed.
#[derive(Clone)]
pub struct TopicBus {
    inner: Arc<BusInner>,
}

impl TopicBus {
    /// Create a bus whose topics buffer up to `capacity` messages per subscriber
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: Mutex::new(HashMap::new()),
                capacity,
            }),
        }
    }

    /// Subscribe to a topic, creating it if this is the first subscriber
    ///
    /// Messages published after this call returns are guaranteed to reach the
    /// returned subscription (until it lags past the channel capacity).
    pub fn subscribe(&self, topic: &str) -> TopicSubscription {
        let mut topics = self.inner.topics.lock().expect("topic table poisoned");
        let tx = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0);
        let rx = tx.subscribe();
        debug!(%topic, subscribers = tx.receiver_count(), "TopicBus::subscribe");
        TopicSubscription {
            inner: Arc::clone(&self.inner),
            topic: topic.to_string(),
            rx: Some(rx),
        }
    }

    /// Publish a message to a topic, returning how many subscribers got it
    ///
    /// A topic with no subscribers swallows the message; that is not an error.
    pub fn publish(&self, topic: &str, message: impl Into<String>) -> usize {
        let topics = self.inner.topics.lock().expect("topic table poisoned");
        match topics.get(topic) {
            Some(tx) => tx.send(message.into()).unwrap_or(0),
            None => {
                debug!(%topic, "TopicBus::publish: no such topic, message dropped");
                0
            }
        }
    }

    /// Number of live subscriptions on a topic (0 if the topic does not exist)
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.inner.topics.lock().expect("topic table poisoned");
        topics.get(topic).map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    /// Number of live topics
    pub fn topic_count(&self) -> usize {
        let topics = self.inner.topics.lock().expect("topic table poisoned");
        topics.len()
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TOPIC_CAPACITY)
    }
}

/// A live subscription to one topic
///
/// Dropping the subscription unsubscribes and prunes the topic if it was the
/// last subscriber. That makes cleanup a scope property rather than something
/// callers have to remember on every exit path.
pub struct TopicSubscription {
    inner: Arc<BusInner>,
    topic: String,
    rx: Option<broadcast::Receiver<String>>,
}

impl TopicSubscription {
    /// The topic this subscription is attached to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message on the topic
    pub async fn recv(&mut self) -> Result<String, BusError> {
        let rx = self.rx.as_mut().ok_or(BusError::Closed)?;
        match rx.recv().await {
            Ok(msg) => Ok(msg),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Err(BusError::Lagged { skipped }),
            Err(broadcast::error::RecvError::Closed) => Err(BusError::Closed),
        }
    }

    /// Receive a message if one is already buffered
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.as_mut()?.try_recv().ok()
    }
}

impl Drop for TopicSubscription {
    fn drop(&mut self) {
        // Release the receiver before inspecting the count so this
        // subscription no longer counts itself. Never panic in drop, even if
        // the table was poisoned.
        self.rx.take();
        let Ok(mut topics) = self.inner.topics.lock() else {
            return;
        };
        if let Some(tx) = topics.get(&self.topic) {
            if tx.receiver_count() == 0 {
                debug!(topic = %self.topic, "TopicSubscription::drop: pruning empty topic");
                topics.remove(&self.topic);
            }
        }
    }
}
