//! Terminal outcome - the one entity persisted beyond process lifetime
//!
//! The wire shapes are fixed:
//! - `{"status":"success","content":<string>,"task_id":<string>}`
//! - `{"status":"error","error":<string>,"error_type":<string>,"task_id":<string>}`
//!
//! An outcome owns no references to the live task or its events; it is
//! reconstructed independently so status resolution works even after the
//! execution substrate has forgotten the task.

use serde::{Deserialize, Serialize};

use super::state::TaskState;

/// Durable record of how a task terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskOutcome {
    /// The work function returned a result
    Success {
        content: String,
        task_id: String,
    },
    /// The work function failed
    Error {
        error: String,
        error_type: String,
        task_id: String,
    },
}

impl TaskOutcome {
    pub fn success(task_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Success {
            content: content.into(),
            task_id: task_id.into(),
        }
    }

    pub fn error(
        task_id: impl Into<String>,
        error: impl Into<String>,
        error_type: impl Into<String>,
    ) -> Self {
        Self::Error {
            error: error.into(),
            error_type: error_type.into(),
            task_id: task_id.into(),
        }
    }

    /// The id of the task this outcome belongs to
    pub fn task_id(&self) -> &str {
        match self {
            Self::Success { task_id, .. } | Self::Error { task_id, .. } => task_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The terminal state this outcome records
    pub fn state(&self) -> TaskState {
        match self {
            Self::Success { .. } => TaskState::Succeeded,
            Self::Error { .. } => TaskState::Failed,
        }
    }
}
