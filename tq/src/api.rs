//! API surface - the operations a transport layer exposes
//!
//! Typed request/response shapes and the three handlers a router would bind:
//! queue a task, read its status, subscribe to its event stream. The
//! transport itself (HTTP, the bundled socket listener, a test harness) is a
//! collaborator; everything here is transport-agnostic.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use taskbroker::{ExpiringStore, TopicBus};

use crate::bus::TaskBus;
use crate::config::Config;
use crate::dispatcher::{DispatchError, TaskDispatcher};
use crate::domain::{StreamFrame, TaskState};
use crate::executor::TaskExecutor;
use crate::registry::TaskRegistry;
use crate::resolver::StatusResolver;
use crate::store::{BrokerStore, ResultStore};
use crate::stream::StreamBridge;
use crate::worker::WorkerPool;

/// Buffered frames per stream subscriber
const STREAM_BUFFER: usize = 64;

/// Request body for task submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRequest {
    /// Custom task id for tracking; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Opaque input handed to the task's backend
    pub payload: String,
}

/// Response to a successful submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    pub task_id: String,
    pub status: String,
    pub message: String,
}

/// Response to a status query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: String,

    /// pending | running | completed | failed
    pub status: String,

    /// The stored outcome, present for terminal states
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Errors surfaced to transport layers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client error: the task type is not registered
    #[error("Unsupported task type: {0}")]
    UnknownTaskType(String),

    /// The queue cannot accept work right now
    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    /// Whether the caller is at fault (a 4xx in HTTP terms)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownTaskType(_))
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::UnknownTaskType(kind) => Self::UnknownTaskType(kind),
            DispatchError::QueueFull | DispatchError::ShuttingDown => Self::Unavailable(e.to_string()),
        }
    }
}

/// Transport-facing status string for a resolved state
fn api_status(state: TaskState) -> &'static str {
    match state {
        TaskState::Pending => "pending",
        TaskState::Running => "running",
        TaskState::Succeeded => "completed",
        TaskState::Failed => "failed",
    }
}

/// The wired-up queue: dispatcher, resolver, and stream bridge over one
/// broker and one worker pool
pub struct QueueApi {
    dispatcher: TaskDispatcher,
    resolver: StatusResolver,
    bridge: StreamBridge,
    pool: Arc<WorkerPool>,
}

impl QueueApi {
    /// Wire the engine from configuration and a populated registry
    pub fn build(config: &Config, registry: TaskRegistry) -> Self {
        let bus = TaskBus::new(TopicBus::default());
        let store: Arc<dyn ResultStore> = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let executor = Arc::new(TaskExecutor::new(
            bus.clone(),
            Arc::clone(&store),
            config.queue.result_ttl(),
        ));
        let pool = Arc::new(WorkerPool::spawn(
            config.queue.workers,
            config.queue.capacity,
            executor,
        ));

        Self {
            dispatcher: TaskDispatcher::new(Arc::new(registry), Arc::clone(&pool)),
            resolver: StatusResolver::new(store, Arc::clone(&pool)),
            bridge: StreamBridge::new(bus).with_tick(config.queue.poll_tick()),
            pool,
        }
    }

    /// `POST /queue/{task_type}` - submit and return immediately
    pub fn queue_task(&self, kind: &str, request: QueueRequest) -> Result<QueueResponse, ApiError> {
        let id = self.dispatcher.submit(kind, &request.payload, request.task_id)?;
        Ok(QueueResponse {
            task_id: id.to_string(),
            status: "pending".to_string(),
            message: "Task submitted successfully".to_string(),
        })
    }

    /// `GET /task/{task_id}` - resolve the current status
    pub async fn task_status(&self, task_id: &str) -> TaskStatusResponse {
        let status = self.resolver.status(task_id).await;
        TaskStatusResponse {
            task_id: task_id.to_string(),
            status: api_status(status.state).to_string(),
            result: status
                .outcome
                .map(|o| serde_json::to_value(&o).unwrap_or(serde_json::Value::Null)),
        }
    }

    /// `GET /subscribe/{task_id}` - attach a live event stream
    ///
    /// The subscription exists before this returns; events published from
    /// this moment on are delivered. Dropping the receiver is the disconnect
    /// signal and ends the bridge loop within one poll tick.
    pub fn subscribe(&self, task_id: &str) -> mpsc::Receiver<StreamFrame> {
        debug!(%task_id, "QueueApi::subscribe");
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let sub = self.bridge.open(task_id);
        let bridge = self.bridge.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            bridge.run(&task_id, sub, tx).await;
        });
        rx
    }

    /// Drain in-flight work and stop the workers
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
