//! Worker pool - the execution substrate
//!
//! A bounded queue feeding N workers, one task body per worker at a time.
//! The pool keeps its own bookkeeping of every task it has seen so status
//! can be answered for tasks the result store does not know yet. Entries for
//! durably-stored outcomes are evicted; the store is the source of truth from
//! then on, and the resolver is specified to tolerate the eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clients::MessageClient;
use crate::domain::{Task, TaskOutcome};
use crate::executor::TaskExecutor;

/// Substrate-side view of a task
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerState {
    /// Accepted, waiting for a worker
    Queued,
    /// A worker is executing the task body
    Running,
    /// Terminated, but the outcome is not (yet) in the result store
    Finished { outcome: TaskOutcome },
    /// The task body panicked; no terminal event was produced
    Faulted { error: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The submission queue is at capacity
    #[error("submission queue full")]
    QueueFull,

    /// The pool is shutting down and takes no new work
    #[error("worker pool shutting down")]
    ShuttingDown,
}

/// A validated task together with its resolved capability
struct QueuedTask {
    task: Task,
    client: Arc<dyn MessageClient>,
}

struct PoolInner {
    bookkeeping: Mutex<HashMap<String, WorkerState>>,
}

impl PoolInner {
    fn set_state(&self, task_id: &str, state: WorkerState) {
        let mut map = self.bookkeeping.lock().expect("bookkeeping poisoned");
        map.insert(task_id.to_string(), state);
    }

    fn evict(&self, task_id: &str) {
        let mut map = self.bookkeeping.lock().expect("bookkeeping poisoned");
        map.remove(task_id);
    }
}

/// Handle to the worker pool
///
/// Cheap to share behind an `Arc`; `submit` and `snapshot` are safe for
/// unbounded concurrent use.
pub struct WorkerPool {
    tx: mpsc::Sender<QueuedTask>,
    // Keeps the channel alive even with zero live workers, so a full queue is
    // reported as full rather than closed.
    #[allow(dead_code)]
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedTask>>>,
    inner: Arc<PoolInner>,
    shutdown_tx: watch::Sender<bool>,
    joins: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `workers` workers over a queue of the given capacity
    pub fn spawn(workers: usize, capacity: usize, executor: Arc<TaskExecutor>) -> Self {
        let (tx, rx) = mpsc::channel::<QueuedTask>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(PoolInner {
            bookkeeping: Mutex::new(HashMap::new()),
        });

        let mut joins = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let executor = Arc::clone(&executor);
            let inner = Arc::clone(&inner);
            let mut shutdown_rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, rx, executor, inner, &mut shutdown_rx).await;
            }));
        }

        Self {
            tx,
            rx,
            inner,
            shutdown_tx,
            joins: Mutex::new(joins),
        }
    }

    /// Hand a task to the pool without waiting for execution
    ///
    /// Non-blocking relative to task execution time: the task is queued (or
    /// rejected) and the call returns immediately.
    pub fn submit(&self, task: Task, client: Arc<dyn MessageClient>) -> Result<(), SubmitError> {
        if *self.shutdown_tx.borrow() {
            return Err(SubmitError::ShuttingDown);
        }

        let task_id = task.id.to_string();
        self.inner.set_state(&task_id, WorkerState::Queued);

        match self.tx.try_send(QueuedTask { task, client }) {
            Ok(()) => {
                debug!(%task_id, "WorkerPool::submit: queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.inner.evict(&task_id);
                Err(SubmitError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.inner.evict(&task_id);
                Err(SubmitError::ShuttingDown)
            }
        }
    }

    /// The substrate's current view of a task, if it remembers one
    pub fn snapshot(&self, task_id: &str) -> Option<WorkerState> {
        let map = self.inner.bookkeeping.lock().expect("bookkeeping poisoned");
        map.get(task_id).cloned()
    }

    /// Number of tasks the pool currently remembers
    pub fn tracked(&self) -> usize {
        let map = self.inner.bookkeeping.lock().expect("bookkeeping poisoned");
        map.len()
    }

    /// Stop taking new work and wait for in-flight tasks to drain
    pub async fn shutdown(&self) {
        debug!("WorkerPool::shutdown: requested");
        // ignore send error: workers may already be gone
        let _ = self.shutdown_tx.send(true);

        let joins = {
            let mut guard = self.joins.lock().expect("join table poisoned");
            std::mem::take(&mut *guard)
        };
        futures::future::join_all(joins).await;
        debug!("WorkerPool::shutdown: workers drained");
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedTask>>>,
    executor: Arc<TaskExecutor>,
    inner: Arc<PoolInner>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Hold the receiver lock only while waiting; workers take turns.
        let queued = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = shutdown_rx.changed() => continue,
                queued = rx.recv() => queued,
            }
        };

        let Some(queued) = queued else {
            // channel closed: no more submissions can ever arrive
            break;
        };

        let task_id = queued.task.id.to_string();
        inner.set_state(&task_id, WorkerState::Running);
        debug!(worker_id, %task_id, "worker picked up task");

        // Run the body in its own task so a panic faults this task, not the worker.
        let exec = Arc::clone(&executor);
        let task = queued.task.clone();
        let client = Arc::clone(&queued.client);
        let result = tokio::spawn(async move { exec.run(&task, client).await }).await;

        match result {
            Ok(report) => {
                if report.persisted {
                    // The store is authoritative now; forget the task.
                    inner.evict(&task_id);
                } else {
                    inner.set_state(&task_id, WorkerState::Finished { outcome: report.outcome });
                }
            }
            Err(join_err) => {
                warn!(worker_id, %task_id, error = %join_err, "task body panicked");
                inner.set_state(
                    &task_id,
                    WorkerState::Faulted {
                        error: join_err.to_string(),
                    },
                );
            }
        }
    }
    debug!(worker_id, "worker stopped");
}
