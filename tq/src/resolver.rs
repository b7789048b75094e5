//! Status resolver - answers "what is the state of task X now"
//!
//! Two-tier lookup: the result store first (a hit is authoritative and
//! terminal), then the worker pool's own bookkeeping. This tolerates the
//! store being the last writer but not the first responder, and tolerates the
//! pool forgetting a task once its outcome is durably stored.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{TaskOutcome, TaskState};
use crate::store::ResultStore;
use crate::worker::{WorkerPool, WorkerState};

/// Resolved view of a task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub state: TaskState,
    pub outcome: Option<TaskOutcome>,
}

impl TaskStatus {
    fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            outcome: None,
        }
    }

    fn terminal(outcome: TaskOutcome) -> Self {
        Self {
            state: outcome.state(),
            outcome: Some(outcome),
        }
    }
}

/// Read-side consumer of the result store and the substrate bookkeeping
///
/// Stateless; safe for unbounded concurrent use. Resolving the same
/// terminated task twice returns identical outcomes.
pub struct StatusResolver {
    store: Arc<dyn ResultStore>,
    pool: Arc<WorkerPool>,
}

impl StatusResolver {
    pub fn new(store: Arc<dyn ResultStore>, pool: Arc<WorkerPool>) -> Self {
        Self { store, pool }
    }

    /// Resolve the current state of a task
    ///
    /// An id neither the store nor the pool has seen resolves to `pending` -
    /// the same answer a genuinely queued-but-unstarted task gets. The two
    /// cases are indistinguishable here by design; callers that need
    /// existence checks must track submitted ids themselves.
    pub async fn status(&self, task_id: &str) -> TaskStatus {
        match self.store.get(task_id).await {
            Ok(Some(outcome)) => {
                debug!(%task_id, "StatusResolver: store hit");
                return TaskStatus::terminal(outcome);
            }
            Ok(None) => {}
            Err(e) => {
                // Degraded mode: fall through to the substrate's view.
                warn!(%task_id, error = %e, "StatusResolver: store unavailable");
            }
        }

        match self.pool.snapshot(task_id) {
            None | Some(WorkerState::Queued) => TaskStatus::pending(),
            Some(WorkerState::Running) => TaskStatus {
                state: TaskState::Running,
                outcome: None,
            },
            Some(WorkerState::Finished { outcome }) => {
                debug!(%task_id, "StatusResolver: substrate holds unflushed outcome");
                TaskStatus::terminal(outcome)
            }
            Some(WorkerState::Faulted { error }) => {
                TaskStatus::terminal(TaskOutcome::error(task_id, error, "Panic"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::TaskBus;
    use crate::clients::mock::MockClient;
    use crate::executor::TaskExecutor;
    use crate::store::BrokerStore;
    use crate::store::testing::FlakyStore;
    use crate::domain::{Task, TaskId};
    use std::time::Duration;
    use taskbroker::ExpiringStore;

    fn fixture(store: Arc<dyn ResultStore>) -> (StatusResolver, Arc<WorkerPool>) {
        let executor = Arc::new(TaskExecutor::new(
            TaskBus::default(),
            Arc::clone(&store),
            Duration::from_secs(60),
        ));
        let pool = Arc::new(WorkerPool::spawn(1, 16, executor));
        (StatusResolver::new(store, Arc::clone(&pool)), pool)
    }

    #[tokio::test]
    async fn test_unknown_id_is_pending() {
        let store: Arc<dyn ResultStore> = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let (resolver, pool) = fixture(store);

        let status = resolver.status("never-seen").await;
        assert_eq!(status.state, TaskState::Pending);
        assert_eq!(status.outcome, None);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_store_hit_is_authoritative() {
        let store: Arc<dyn ResultStore> = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let outcome = TaskOutcome::success("t1", "done");
        store.put(&outcome, Duration::from_secs(60)).await.unwrap();

        let (resolver, pool) = fixture(store);
        let status = resolver.status("t1").await;
        assert_eq!(status.state, TaskState::Succeeded);
        assert_eq!(status.outcome, Some(outcome));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let store: Arc<dyn ResultStore> = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        store
            .put(&TaskOutcome::error("t1", "boom", "Exception"), Duration::from_secs(60))
            .await
            .unwrap();

        let (resolver, pool) = fixture(store);
        let first = resolver.status("t1").await;
        let second = resolver.status("t1").await;
        assert_eq!(first, second);
        assert_eq!(first.state, TaskState::Failed);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_running_task_reports_running() {
        let store: Arc<dyn ResultStore> = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let executor = Arc::new(TaskExecutor::new(
            TaskBus::default(),
            Arc::clone(&store),
            Duration::from_secs(60),
        ));
        let pool = Arc::new(WorkerPool::spawn(1, 16, executor));
        let resolver = StatusResolver::new(store, Arc::clone(&pool));

        let slow = Arc::new(crate::clients::DummyClient::new(Duration::from_secs(30)));
        pool.submit(Task::new(TaskId::from("t1"), "dummy", "hi"), slow).unwrap();

        // Wait for the worker to pick the task up.
        let mut saw_running = false;
        for _ in 0..200 {
            if resolver.status("t1").await.state == TaskState::Running {
                saw_running = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(saw_running);
    }

    #[tokio::test]
    async fn test_substrate_view_when_store_misses() {
        // Store writes always fail, so only the pool remembers the result.
        let store = Arc::new(FlakyStore::new(usize::MAX));
        let (resolver, pool) = fixture(store);

        pool.submit(
            Task::new(TaskId::from("t1"), "dummy", "hi"),
            Arc::new(MockClient::ok("from-substrate")),
        )
        .unwrap();

        let mut status = resolver.status("t1").await;
        for _ in 0..400 {
            if status.state.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            status = resolver.status("t1").await;
        }

        assert_eq!(status.state, TaskState::Succeeded);
        assert_eq!(status.outcome, Some(TaskOutcome::success("t1", "from-substrate")));
        pool.shutdown().await;
    }
}
