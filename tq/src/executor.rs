//! Task executor - drives one task through its lifecycle
//!
//! One `run` call is one execution attempt: publish `start`, await the work
//! capability, publish exactly one terminal event, persist the outcome. The
//! executor never retries the work itself (retry policy belongs to the
//! execution substrate) and never lets a failure escape as a process fault -
//! every error degrades to a recorded or logged outcome.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::bus::TaskBus;
use crate::clients::MessageClient;
use crate::domain::{Task, TaskEvent, TaskOutcome};
use crate::store::ResultStore;

/// Attempts to persist an outcome before giving up
const PERSIST_RETRIES: u32 = 3;

/// Initial backoff between persist attempts
const PERSIST_BACKOFF_MS: u64 = 100;

/// What one execution attempt produced
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// The terminal outcome (also published and, if possible, persisted)
    pub outcome: TaskOutcome,

    /// Whether the outcome made it into the result store
    ///
    /// `false` means the store was unavailable through every retry; live
    /// subscribers were still informed, and the substrate keeps its own
    /// record so status resolution degrades instead of lying.
    pub persisted: bool,
}

/// Executes task bodies and records their fate
///
/// Receives its collaborators at construction; holds no ambient state.
pub struct TaskExecutor {
    bus: TaskBus,
    store: Arc<dyn ResultStore>,
    result_ttl: Duration,
}

impl TaskExecutor {
    pub fn new(bus: TaskBus, store: Arc<dyn ResultStore>, result_ttl: Duration) -> Self {
        Self { bus, store, result_ttl }
    }

    /// Run one task to termination
    ///
    /// Publishes `start`, awaits the capability once, publishes the terminal
    /// event before persisting (liveness first - a persist failure must not
    /// suppress the event), then persists with bounded retry.
    pub async fn run(&self, task: &Task, client: Arc<dyn MessageClient>) -> ExecutionReport {
        let task_id = task.id.as_str();
        debug!(%task_id, kind = %task.kind, "TaskExecutor::run: starting");
        self.bus.publish(task_id, &TaskEvent::start(task_id));

        let outcome = match client.send_message(&task.payload).await {
            Ok(content) => {
                info!(%task_id, "task succeeded");
                TaskOutcome::success(task_id, content)
            }
            Err(e) => {
                info!(%task_id, error = %e, error_type = e.kind(), "task failed");
                TaskOutcome::error(task_id, e.to_string(), e.kind())
            }
        };

        self.bus.publish(task_id, &TaskEvent::terminal(&outcome));
        let persisted = self.persist_with_retry(&outcome).await;

        ExecutionReport { outcome, persisted }
    }

    /// Persist the outcome, retrying transient store failures
    ///
    /// Exhausting the retries is logged and swallowed: the live event already
    /// went out, and there is no further recovery action available here.
    async fn persist_with_retry(&self, outcome: &TaskOutcome) -> bool {
        for attempt in 0..=PERSIST_RETRIES {
            if attempt > 0 {
                let base = PERSIST_BACKOFF_MS * 2u64.pow(attempt - 1);
                let jitter = rand::rng().random_range(0..=base / 4);
                tokio::time::sleep(Duration::from_millis(base + jitter)).await;
            }

            match self.store.put(outcome, self.result_ttl).await {
                Ok(()) => {
                    debug!(task_id = %outcome.task_id(), attempt, "outcome persisted");
                    return true;
                }
                Err(e) => {
                    warn!(task_id = %outcome.task_id(), attempt, error = %e, "persist attempt failed");
                }
            }
        }

        warn!(task_id = %outcome.task_id(), "outcome not persisted, result store unavailable");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::MockClient;
    use crate::domain::{EventKind, TaskId};
    use crate::store::BrokerStore;
    use crate::store::testing::FlakyStore;
    use taskbroker::ExpiringStore;

    fn task(id: &str) -> Task {
        Task::new(TaskId::from(id), "dummy", "hello")
    }

    fn executor_with(store: Arc<dyn ResultStore>) -> (TaskExecutor, TaskBus) {
        let bus = TaskBus::default();
        (TaskExecutor::new(bus.clone(), store, Duration::from_secs(60)), bus)
    }

    #[tokio::test]
    async fn test_success_publishes_start_then_complete() {
        let store = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let (executor, bus) = executor_with(store.clone());
        let mut sub = bus.subscribe("t1");

        let report = executor.run(&task("t1"), Arc::new(MockClient::ok("result"))).await;

        assert!(report.persisted);
        assert!(report.outcome.is_success());

        let first = sub.recv().await.unwrap();
        assert_eq!(first.event, EventKind::Start);
        let second = sub.recv().await.unwrap();
        assert_eq!(second.event, EventKind::Complete);
        assert_eq!(second.data["content"], "result");
    }

    #[tokio::test]
    async fn test_success_outcome_is_stored() {
        let store = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let (executor, _bus) = executor_with(store.clone());

        executor.run(&task("t1"), Arc::new(MockClient::ok("result"))).await;

        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored, TaskOutcome::success("t1", "result"));
    }

    #[tokio::test]
    async fn test_failure_publishes_error_and_stores_it() {
        let store = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let (executor, bus) = executor_with(store.clone());
        let mut sub = bus.subscribe("t1");

        let report = executor
            .run(&task("t1"), Arc::new(MockClient::failing("Error", "Exception")))
            .await;

        assert!(!report.outcome.is_success());
        assert_eq!(sub.recv().await.unwrap().event, EventKind::Start);
        let terminal = sub.recv().await.unwrap();
        assert_eq!(terminal.event, EventKind::Error);
        assert_eq!(terminal.data["error_type"], "Exception");

        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored, TaskOutcome::error("t1", "Error", "Exception"));
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let store = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let (executor, bus) = executor_with(store);
        let mut sub = bus.subscribe("t1");

        executor.run(&task("t1"), Arc::new(MockClient::ok("result"))).await;

        let mut terminals = 0;
        while let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_millis(50), sub.recv()).await
        {
            if event.event.is_terminal() {
                terminals += 1;
            }
        }
        assert_eq!(terminals, 1);
    }

    #[tokio::test]
    async fn test_persist_retries_until_store_recovers() {
        let store = Arc::new(FlakyStore::new(2));
        let (executor, _bus) = executor_with(store.clone());

        let report = executor.run(&task("t1"), Arc::new(MockClient::ok("result"))).await;

        assert!(report.persisted);
        assert_eq!(store.put_attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(store.get("t1").await.unwrap(), Some(report.outcome));
    }

    #[tokio::test]
    async fn test_persist_failure_is_swallowed_after_event() {
        // Store never recovers; the event must still reach subscribers and
        // run must return instead of erroring.
        let store = Arc::new(FlakyStore::new(usize::MAX));
        let (executor, bus) = executor_with(store);
        let mut sub = bus.subscribe("t1");

        let report = executor.run(&task("t1"), Arc::new(MockClient::ok("result"))).await;

        assert!(!report.persisted);
        assert_eq!(sub.recv().await.unwrap().event, EventKind::Start);
        assert_eq!(sub.recv().await.unwrap().event, EventKind::Complete);
    }

    #[tokio::test]
    async fn test_events_flow_even_with_no_subscribers() {
        let store = Arc::new(BrokerStore::new(Arc::new(ExpiringStore::new())));
        let (executor, _bus) = executor_with(store.clone());

        // Nobody is listening; the run must still terminate and persist.
        let report = executor.run(&task("t1"), Arc::new(MockClient::ok("result"))).await;
        assert!(report.persisted);
        assert!(store.get("t1").await.unwrap().is_some());
    }
}
