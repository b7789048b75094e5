//! Task identity and the submitted unit of work

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier, unique for the lifetime of the system
///
/// Callers may supply their own id at submission; otherwise one is generated
/// from a UUIDv7 (time-ordered, collision probability negligible).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh id
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wrap a caller-supplied id
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for TaskId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

/// One submitted unit of work
///
/// Immutable after submission. The payload is opaque to the queue; only the
/// registered handler for `kind` interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Tracking identifier
    pub id: TaskId,

    /// Registered task kind tag
    pub kind: String,

    /// Opaque input blob
    pub payload: String,
}

impl Task {
    pub fn new(id: TaskId, kind: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_caller_supplied_id_is_preserved() {
        let id = TaskId::from_string("t1".to_string());
        assert_eq!(id.as_str(), "t1");
        assert_eq!(id.to_string(), "t1");
    }

    #[test]
    fn test_task_id_serializes_as_bare_string() {
        let id = TaskId::from("t1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"t1\"");

        let back: TaskId = serde_json::from_str("\"t2\"").unwrap();
        assert_eq!(back.as_str(), "t2");
    }
}
