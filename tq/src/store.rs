//! Result store - the durable record of terminal outcomes
//!
//! After the live event window closes this is the only source of truth for a
//! task's fate. The trait keeps the engine honest about what it needs from a
//! backing store (put with TTL, get) and lets tests inject a failing store to
//! exercise the executor's retry and swallow paths.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use taskbroker::ExpiringStore;

use crate::domain::TaskOutcome;

/// Key a task's outcome is stored under
///
/// A different namespace than the event-bus topics, so storage keys and topic
/// names never collide.
pub fn response_key(task_id: &str) -> String {
    format!("task_response:{task_id}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored value was not a valid outcome
    #[error("corrupt stored outcome: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable key/value record of terminal outcomes, with expiry
///
/// Writes are single-writer-per-key (only the executor writes, exactly once
/// per task) and reads are idempotent, so implementations need no locking
/// promises beyond their own internal consistency.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist a terminal outcome with a bounded time-to-live
    async fn put(&self, outcome: &TaskOutcome, ttl: Duration) -> Result<(), StoreError>;

    /// Fetch the outcome for a task, if one was persisted and has not expired
    async fn get(&self, task_id: &str) -> Result<Option<TaskOutcome>, StoreError>;
}

/// In-process implementation over [`taskbroker::ExpiringStore`]
pub struct BrokerStore {
    store: Arc<ExpiringStore>,
}

impl BrokerStore {
    pub fn new(store: Arc<ExpiringStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResultStore for BrokerStore {
    async fn put(&self, outcome: &TaskOutcome, ttl: Duration) -> Result<(), StoreError> {
        let payload = serde_json::to_string(outcome)?;
        debug!(task_id = %outcome.task_id(), ttl_secs = ttl.as_secs(), "BrokerStore::put");
        self.store.set(&response_key(outcome.task_id()), payload, ttl);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<TaskOutcome>, StoreError> {
        match self.store.get(&response_key(task_id)) {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespace() {
        assert_eq!(response_key("t1"), "task_response:t1");
        assert_ne!(response_key("t1"), crate::bus::stream_topic("t1"));
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = BrokerStore::new(Arc::new(ExpiringStore::new()));
        let outcome = TaskOutcome::success("t1", "done");

        store.put(&outcome, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("t1").await.unwrap(), Some(outcome));
    }

    #[tokio::test]
    async fn test_get_miss() {
        let store = BrokerStore::new(Arc::new(ExpiringStore::new()));
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_outcome_is_a_miss() {
        let store = BrokerStore::new(Arc::new(ExpiringStore::new()));
        let outcome = TaskOutcome::error("t1", "boom", "Exception");

        store.put(&outcome, Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.get("t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_value_is_reported() {
        let backing = Arc::new(ExpiringStore::new());
        backing.set(&response_key("t1"), "not json", Duration::from_secs(60));

        let store = BrokerStore::new(backing);
        assert!(matches!(store.get("t1").await, Err(StoreError::Corrupt(_))));
    }
}
