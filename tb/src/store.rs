//! Expiring key/value store
//!
//! String keys, string values, per-entry TTL. Expired entries are dropped
//! lazily when a read touches them; `purge_expired` exists for callers that
//! want to reclaim memory eagerly (a periodic sweep, tests).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// One stored value and its expiry deadline
struct Entry {
    value: String,
    deadline: Instant,
}

/// Statistics for a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Live (unexpired) entries
    pub live: usize,
    /// Entries dropped because their TTL elapsed
    pub expired: u64,
}

/// In-memory key/value store with per-entry time-to-live
#[derive(Default)]
pub struct ExpiringStore {
    entries: Mutex<HashMap<String, Entry>>,
    expired: Mutex<u64>,
}

impl ExpiringStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`, replacing any previous value
    pub fn set(&self, key: &str, value: impl Into<String>, ttl: Duration) {
        let mut entries = self.entries.lock().expect("store poisoned");
        debug!(%key, ttl_secs = ttl.as_secs(), "ExpiringStore::set");
        entries.insert(
            key.to_string(),
            Entry {
                value: value.into(),
                deadline: Instant::now() + ttl,
            },
        );
    }

    /// Fetch the value under `key`, if present and unexpired
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("store poisoned");
        match entries.get(key) {
            Some(entry) if entry.deadline > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                debug!(%key, "ExpiringStore::get: entry expired");
                entries.remove(key);
                *self.expired.lock().expect("store poisoned") += 1;
                None
            }
            None => None,
        }
    }

    /// Remove an entry, returning whether it existed (expired or not)
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().expect("store poisoned");
        entries.remove(key).is_some()
    }

    /// Drop every expired entry now, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().expect("store poisoned");
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.deadline > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "ExpiringStore::purge_expired");
            *self.expired.lock().expect("store poisoned") += purged as u64;
        }
        purged
    }

    /// Current statistics
    pub fn stats(&self) -> StoreStats {
        let entries = self.entries.lock().expect("store poisoned");
        let now = Instant::now();
        StoreStats {
            live: entries.values().filter(|e| e.deadline > now).count(),
            expired: *self.expired.lock().expect("store poisoned"),
        }
    }
}
