//! Task kind registry
//!
//! Maps a task kind tag to the backend client that executes it. Built once
//! during startup (mutable), then shared immutably behind an `Arc` - no locks
//! on the submit path.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::clients::MessageClient;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate task kind: {0}")]
    DuplicateKind(String),
}

/// Registry of known task kinds
#[derive(Default)]
pub struct TaskRegistry {
    kinds: HashMap<String, Arc<dyn MessageClient>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self { kinds: HashMap::new() }
    }

    /// Register a client for a task kind
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        client: Arc<dyn MessageClient>,
    ) -> Result<(), RegistryError> {
        let kind = kind.into();
        if self.kinds.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        self.kinds.insert(kind, client);
        Ok(())
    }

    /// Look up the client for a kind
    pub fn get(&self, kind: &str) -> Option<Arc<dyn MessageClient>> {
        self.kinds.get(kind).cloned()
    }

    /// Whether a kind is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kind tags, sorted for stable output
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<_> = self.kinds.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
