//! Task dispatcher - the submit path
//!
//! Validates the kind against the registry, assigns an identifier, resolves
//! the capability once, and hands the task to the worker pool. Returns before
//! the task makes any lifecycle progress; validation failures happen before
//! an id is generated or the substrate is touched, so a rejected submission
//! has no observable side effect.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Task, TaskId};
use crate::registry::TaskRegistry;
use crate::worker::{SubmitError, WorkerPool};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The kind is not in the registry - client error, nothing was created
    #[error("unsupported task type: {0}")]
    UnknownTaskType(String),

    /// The submission queue is at capacity
    #[error("submission queue full")]
    QueueFull,

    /// The pool is shutting down
    #[error("queue is shutting down")]
    ShuttingDown,
}

/// Accepts submissions and hands them to the execution substrate
pub struct TaskDispatcher {
    registry: Arc<TaskRegistry>,
    pool: Arc<WorkerPool>,
}

impl TaskDispatcher {
    pub fn new(registry: Arc<TaskRegistry>, pool: Arc<WorkerPool>) -> Self {
        Self { registry, pool }
    }

    /// Submit a task, returning its tracking id immediately
    ///
    /// `task_id` is honored when supplied; otherwise a fresh one is generated
    /// after validation so an invalid submission never consumes an id.
    pub fn submit(
        &self,
        kind: &str,
        payload: &str,
        task_id: Option<String>,
    ) -> Result<TaskId, DispatchError> {
        let client = self
            .registry
            .get(kind)
            .ok_or_else(|| DispatchError::UnknownTaskType(kind.to_string()))?;

        let id = match task_id {
            Some(id) => TaskId::from_string(id),
            None => TaskId::generate(),
        };
        debug!(task_id = %id, %kind, "TaskDispatcher::submit");

        self.pool
            .submit(Task::new(id.clone(), kind, payload), client)
            .map_err(|e| match e {
                SubmitError::QueueFull => DispatchError::QueueFull,
                SubmitError::ShuttingDown => DispatchError::ShuttingDown,
            })?;

        info!(task_id = %id, %kind, "task submitted");
        Ok(id)
    }
}
