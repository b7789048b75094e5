//! TaskBroker - in-process pub/sub topics and expiring key/value storage
//!
//! Provides the two collaborators a task queue needs without reaching out of
//! process: ephemeral per-topic fan-out channels for live notifications, and
//! a string key/value store whose entries expire after a bounded TTL.
//!
//! # Architecture
//!
//! ```text
//! TopicBus
//! └── {topic}  ->  broadcast channel   # created by the first subscriber,
//!                                      # pruned when the last one leaves
//! ExpiringStore
//! └── {key}    ->  (value, deadline)   # lazily expired on read
//! ```
//!
//! # Example
//!
//! ```ignore
//! use taskbroker::{TopicBus, ExpiringStore};
//!
//! let bus = TopicBus::new(64);
//! let mut sub = bus.subscribe("task_stream:abc");
//! bus.publish("task_stream:abc", "{\"event\":\"start\"}");
//! let msg = sub.recv().await?;
//! ```

mod bus;
mod store;

pub use bus::{BusError, TopicBus, TopicSubscription};
pub use store::{ExpiringStore, StoreStats};

/// Default per-topic channel capacity (messages)
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Default entry time-to-live (1 hour)
pub const DEFAULT_TTL_SECS: u64 = 3600;
