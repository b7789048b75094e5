//! Integration tests for the task queue
//!
//! These exercise the wired-up engine end to end: submit over the API
//! surface, observe lifecycle events on a live stream, and resolve status
//! against the durable store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use taskqueue::api::{QueueApi, QueueRequest};
use taskqueue::clients::DummyClient;
use taskqueue::config::Config;
use taskqueue::domain::EventKind;
use taskqueue::registry::TaskRegistry;

/// Engine with a fast dummy backend
fn api(delay: Duration) -> QueueApi {
    let mut registry = TaskRegistry::new();
    registry
        .register("dummy", Arc::new(DummyClient::new(delay)))
        .expect("register dummy");
    QueueApi::build(&Config::default(), registry)
}

fn request(task_id: &str, payload: &str) -> QueueRequest {
    QueueRequest {
        task_id: Some(task_id.to_string()),
        payload: payload.to_string(),
    }
}

/// Poll the status until it turns terminal or the deadline passes
async fn await_terminal(api: &QueueApi, task_id: &str) -> taskqueue::api::TaskStatusResponse {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let status = api.task_status(task_id).await;
        if status.status == "completed" || status.status == "failed" {
            return status;
        }
        assert!(Instant::now() < deadline, "task {task_id} never terminated");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_answers_before_the_task_finishes() {
    let api = api(Duration::from_millis(200));

    let started = Instant::now();
    let response = api.queue_task("dummy", request("t1", "hello")).unwrap();
    assert!(started.elapsed() < Duration::from_millis(200));

    assert_eq!(response.task_id, "t1");
    assert_eq!(response.status, "pending");

    // The task is genuinely still in flight at this point.
    let early = api.task_status("t1").await;
    assert_ne!(early.status, "completed");

    await_terminal(&api, "t1").await;
    api.shutdown().await;
}

#[tokio::test]
async fn test_submit_generates_an_id_when_absent() {
    let api = api(Duration::from_millis(5));
    let response = api
        .queue_task(
            "dummy",
            QueueRequest {
                task_id: None,
                payload: "hello".to_string(),
            },
        )
        .unwrap();
    assert!(!response.task_id.is_empty());
    api.shutdown().await;
}

#[tokio::test]
async fn test_unknown_type_is_rejected_without_side_effects() {
    let api = api(Duration::from_millis(5));

    let err = api.queue_task("bogus", request("t-bogus", "hello")).unwrap_err();
    assert!(err.is_client_error());

    // No task was created: the id still resolves to the uniform pending.
    let status = api.task_status("t-bogus").await;
    assert_eq!(status.status, "pending");
    assert!(status.result.is_none());

    // And no event ever shows up for it.
    let mut stream = api.subscribe("t-bogus");
    let got = tokio::time::timeout(Duration::from_millis(100), stream.recv()).await;
    assert!(got.is_err(), "no events expected for a rejected submission");

    api.shutdown().await;
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[tokio::test]
async fn test_success_scenario() {
    let api = api(Duration::from_millis(20));

    let response = api.queue_task("dummy", request("t1", "hello")).unwrap();
    assert_eq!(response.task_id, "t1");
    assert_eq!(response.status, "pending");

    let status = await_terminal(&api, "t1").await;
    assert_eq!(status.task_id, "t1");
    assert_eq!(status.status, "completed");

    let result = status.result.expect("completed task carries its result");
    assert_eq!(result["status"], "success");
    assert_eq!(result["task_id"], "t1");
    assert!(result["content"].as_str().unwrap().contains("hello"));

    api.shutdown().await;
}

#[tokio::test]
async fn test_failure_scenario() {
    let api = api(Duration::from_millis(20));

    api.queue_task("dummy", request("t1", "this will error out")).unwrap();

    let status = await_terminal(&api, "t1").await;
    assert_eq!(status.status, "failed");

    let result = status.result.expect("failed task carries its outcome");
    assert_eq!(result["status"], "error");
    assert_eq!(result["error"], "Error");
    assert_eq!(result["error_type"], "Exception");
    assert_eq!(result["task_id"], "t1");

    api.shutdown().await;
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_subscriber_sees_start_then_terminal_exactly() {
    let api = api(Duration::from_millis(20));

    let mut stream = api.subscribe("t1");
    api.queue_task("dummy", request("t1", "hello")).unwrap();

    let mut kinds = Vec::new();
    while let Some(frame) = stream.recv().await {
        kinds.push(frame.event);
    }
    assert_eq!(kinds, vec![EventKind::Start, EventKind::Complete]);

    api.shutdown().await;
}

#[tokio::test]
async fn test_stream_carries_the_outcome_payload() {
    let api = api(Duration::from_millis(20));

    let mut stream = api.subscribe("t1");
    api.queue_task("dummy", request("t1", "please error")).unwrap();

    let start = stream.recv().await.unwrap();
    assert_eq!(start.event, EventKind::Start);
    assert_eq!(start.data["task_id"], "t1");

    let terminal = stream.recv().await.unwrap();
    assert_eq!(terminal.event, EventKind::Error);
    assert_eq!(terminal.data["status"], "error");
    assert_eq!(terminal.data["error_type"], "Exception");

    api.shutdown().await;
}

#[tokio::test]
async fn test_late_subscriber_gets_nothing_replayed() {
    let api = api(Duration::from_millis(5));

    api.queue_task("dummy", request("t1", "hello")).unwrap();
    let status = await_terminal(&api, "t1").await;

    // The bridge does not replay past events; the resolver is the read path
    // for anyone who attaches after termination.
    let mut stream = api.subscribe("t1");
    let got = tokio::time::timeout(Duration::from_millis(100), stream.recv()).await;
    assert!(got.is_err(), "terminated task must not replay events");
    assert_eq!(status.status, "completed");

    api.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_subscribers_each_get_every_event() {
    let api = api(Duration::from_millis(30));

    let mut stream_a = api.subscribe("t1");
    let mut stream_b = api.subscribe("t1");
    api.queue_task("dummy", request("t1", "hello")).unwrap();

    for stream in [&mut stream_a, &mut stream_b] {
        assert_eq!(stream.recv().await.unwrap().event, EventKind::Start);
        assert_eq!(stream.recv().await.unwrap().event, EventKind::Complete);
    }

    api.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_does_not_cancel_the_task() {
    let api = api(Duration::from_millis(50));

    let stream = api.subscribe("t1");
    api.queue_task("dummy", request("t1", "hello")).unwrap();

    // Client walks away mid-task.
    drop(stream);

    // The task still runs to completion and persists its outcome.
    let status = await_terminal(&api, "t1").await;
    assert_eq!(status.status, "completed");

    api.shutdown().await;
}

// =============================================================================
// Terminal-state properties
// =============================================================================

#[tokio::test]
async fn test_exactly_one_terminal_event() {
    let api = api(Duration::from_millis(10));

    let mut stream = api.subscribe("t1");
    api.queue_task("dummy", request("t1", "hello")).unwrap();

    let mut terminals = 0;
    while let Some(frame) = stream.recv().await {
        if frame.event.is_terminal() {
            terminals += 1;
        }
    }
    assert_eq!(terminals, 1);

    api.shutdown().await;
}

#[tokio::test]
async fn test_status_resolution_is_idempotent() {
    let api = api(Duration::from_millis(10));

    api.queue_task("dummy", request("t1", "hello")).unwrap();
    let first = await_terminal(&api, "t1").await;
    let second = api.task_status("t1").await;

    assert_eq!(first.status, second.status);
    assert_eq!(first.result, second.result);

    api.shutdown().await;
}

#[tokio::test]
async fn test_many_tasks_in_parallel() {
    let api = api(Duration::from_millis(20));

    for i in 0..12 {
        api.queue_task("dummy", request(&format!("t{i}"), &format!("payload {i}")))
            .unwrap();
    }

    for i in 0..12 {
        let status = await_terminal(&api, &format!("t{i}")).await;
        assert_eq!(status.status, "completed");
        assert_eq!(status.result.unwrap()["task_id"], format!("t{i}"));
    }

    api.shutdown().await;
}
