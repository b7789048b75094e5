//! TaskQueue - async task queue with durable results and live event streaming
//!
//! A client submits a unit of work, gets a tracking id back immediately, and
//! learns the outcome later - by polling or by subscribing to a live event
//! stream. Work runs on a bounded pool; lifecycle transitions are published
//! to per-task topics; terminal outcomes are written once to an expiring
//! result store, which is the source of truth after the live window closes.
//!
//! # Core Concepts
//!
//! - **Submit returns immediately**: validation happens on the request path,
//!   execution never does
//! - **Exactly one terminal event**: each run publishes one `complete` or
//!   `error`, and one outcome is persisted per task
//! - **Two-tier status**: the result store answers first, the worker pool's
//!   bookkeeping covers the window before the outcome lands
//! - **Streams are scoped**: a bridge loop per subscriber, unsubscribed on
//!   terminal event, disconnect, and fault alike
//!
//! # Modules
//!
//! - [`domain`] - tasks, states, events, outcomes
//! - [`clients`] - the backend capability trait and its implementations
//! - [`registry`] - task kind -> capability mapping
//! - [`dispatcher`] / [`worker`] / [`executor`] - the submit and execution path
//! - [`resolver`] / [`stream`] - the read side
//! - [`api`] - transport-agnostic handlers
//! - [`ipc`] - the bundled Unix-socket surface
//! - [`config`] / [`cli`] - process configuration

pub mod api;
pub mod bus;
pub mod cli;
pub mod clients;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod executor;
pub mod ipc;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod stream;
pub mod worker;

// Re-export commonly used types
pub use api::{ApiError, QueueApi, QueueRequest, QueueResponse, TaskStatusResponse};
pub use bus::{EventBusError, EventSubscription, TaskBus};
pub use clients::{AnthropicClient, ClientError, DummyClient, MessageClient, create_client};
pub use config::{BackendConfig, Config, IpcConfig, QueueConfig};
pub use dispatcher::{DispatchError, TaskDispatcher};
pub use domain::{EventKind, StreamFrame, Task, TaskEvent, TaskId, TaskOutcome, TaskState};
pub use executor::{ExecutionReport, TaskExecutor};
pub use ipc::QueueClient;
pub use registry::{RegistryError, TaskRegistry};
pub use resolver::{StatusResolver, TaskStatus};
pub use store::{BrokerStore, ResultStore, StoreError};
pub use stream::{StreamBridge, StreamEnd};
pub use worker::{SubmitError, WorkerPool, WorkerState};
