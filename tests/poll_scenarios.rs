//! End-to-end polling scenarios through the suspension controller.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use waitpoint::testing::ScriptedRemoteApi;
use waitpoint::{
    JobHandle, Outcome, PollConfig, SuspensionController, TaskStatus, WaitConfig, WaitMode,
    WaitpointError,
};

fn controller(api: Arc<ScriptedRemoteApi>) -> SuspensionController {
    SuspensionController::builder()
        .remote_api(api)
        .callback_base_url("https://host.example.com/resume")
        .build()
        .unwrap()
}

fn poll_config(interval_secs: u64, max_attempts: u32) -> WaitConfig {
    WaitConfig::default()
        .with_poll(PollConfig::new(Duration::from_secs(interval_secs), max_attempts, None).unwrap())
}

/// Two PROCESSING observations, then SUCCESS: the result carries the
/// payload after exactly two inter-attempt waits.
#[tokio::test(start_paused = true)]
async fn poll_succeeds_after_two_waits() {
    let api = Arc::new(ScriptedRemoteApi::new("task-1"));
    api.push_status(TaskStatus::processing());
    api.push_status(TaskStatus::processing());
    api.push_status(TaskStatus::success(json!({"url": "x"})));

    let controller = controller(api.clone());
    let started = Instant::now();
    let result = controller
        .submit_and_await(json!({"input": "video.mp4"}), WaitMode::Poll, poll_config(5, 3))
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.payload, Some(json!({"url": "x"})));
    assert_eq!(result.handle, JobHandle::new("task-1"));
    assert_eq!(api.fetch_count(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

/// Every allowed attempt reports PROCESSING: the wait times out and the
/// budget is not exceeded.
#[tokio::test(start_paused = true)]
async fn poll_times_out_when_budget_is_exhausted() {
    let api = Arc::new(ScriptedRemoteApi::new("task-1"));
    for _ in 0..3 {
        api.push_status(TaskStatus::processing());
    }

    let controller = controller(api.clone());
    let result = controller
        .submit_and_await(json!({}), WaitMode::Poll, poll_config(5, 3))
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::TimedOut);
    assert_eq!(api.fetch_count(), 3);
    assert!(matches!(
        result.into_result(),
        Err(WaitpointError::Timeout(_))
    ));
}

/// A FAILED phase surfaces as a structured failure carrying the remote
/// diagnostic, not as a timeout.
#[tokio::test(start_paused = true)]
async fn poll_surfaces_remote_failure() {
    let api = Arc::new(ScriptedRemoteApi::new("task-1"));
    api.push_status(TaskStatus::processing());
    api.push_status(TaskStatus::failed(json!({"reason": "unsupported codec"})));

    let controller = controller(api.clone());
    let result = controller
        .submit_and_await(json!({}), WaitMode::Poll, poll_config(5, 10))
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Failed);
    assert_eq!(result.error, Some(json!({"reason": "unsupported codec"})));
    assert!(matches!(
        result.into_result(),
        Err(WaitpointError::RemoteTaskFailed { .. })
    ));
}

/// Cancelling mid-interval stops polling: no further status fetch occurs
/// and the outcome is Cancelled.
#[tokio::test(start_paused = true)]
async fn cancel_mid_interval_stops_polling() {
    let api = Arc::new(ScriptedRemoteApi::new("task-1"));
    for _ in 0..5 {
        api.push_status(TaskStatus::processing());
    }

    let controller = Arc::new(controller(api.clone()));
    let waiting = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .submit_and_await(json!({}), WaitMode::Poll, poll_config(5, 5))
                .await
        })
    };

    // Let the wait take its first fetch and park on the interval sleep
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(api.fetch_count(), 1);

    assert!(controller.cancel(&JobHandle::new("task-1")));
    let result = waiting.await.unwrap().unwrap();
    assert_eq!(result.outcome, Outcome::Cancelled);
    assert_eq!(api.fetch_count(), 1);

    // Cancellation is idempotent; the wait is already gone
    assert!(!controller.cancel(&JobHandle::new("task-1")));
}

/// Transient fetch errors are retried; the final allowed attempt's error
/// propagates unchanged.
#[tokio::test(start_paused = true)]
async fn final_transient_error_propagates() {
    let api = Arc::new(ScriptedRemoteApi::new("task-1"));
    api.push_fetch_error("connection reset");
    api.push_fetch_error("upstream 503");

    let controller = controller(api.clone());
    let err = controller
        .submit_and_await(json!({}), WaitMode::Poll, poll_config(5, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, WaitpointError::TransientFetch(_)));
    assert_eq!(api.fetch_count(), 2);
}

/// A non-waiting check is a single round trip.
#[tokio::test]
async fn check_status_fetches_once() {
    let api = Arc::new(ScriptedRemoteApi::new("task-1"));
    api.push_status(TaskStatus::processing());

    let controller = controller(api.clone());
    let status = controller
        .check_status(&JobHandle::new("task-1"))
        .await
        .unwrap();
    assert_eq!(status.phase, waitpoint::TaskPhase::Processing);
    assert_eq!(api.fetch_count(), 1);
}
