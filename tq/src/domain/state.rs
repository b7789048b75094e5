//! Task lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task
///
/// Transitions are monotonic: pending -> running -> succeeded | failed.
/// The terminal states are immutable once reached; no state is entered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Submitted, not yet picked up by a worker
    #[default]
    Pending,
    /// A worker is executing the task body
    Running,
    /// Terminal: the work function returned a result
    Succeeded,
    /// Terminal: the work function raised or the worker faulted
    Failed,
}

impl TaskState {
    /// Whether this state is terminal (immutable once reached)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
