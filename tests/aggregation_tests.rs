//! Integration tests for the periodic aggregation loop
//!
//! All tests run on tokio's paused clock, so timer behavior is exact.

use renderscope::config::ProfilerConfig;
use renderscope::engine::Instrumentation;
use renderscope::timing_event::{RenderPhase, TimingEvent};
use std::time::Duration;

fn event(key: &str, actual: f64) -> TimingEvent {
    TimingEvent::new(key, RenderPhase::Updated, actual, actual, 0.0, actual)
}

fn scope(period_ms: u64) -> Instrumentation {
    Instrumentation::new(
        ProfilerConfig::default()
            .with_max_samples(10)
            .with_aggregation_period_ms(period_ms),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_no_publication_before_first_period() {
    let scope = scope(500);
    let _task = scope.start_aggregation();

    scope.capture(event("Widget", 10.0));
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(scope.snapshot().is_empty());
    assert_eq!(scope.passes_published(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_each_period_publishes_whole_buffer() {
    let scope = scope(100);
    let task = scope.start_aggregation();

    scope.capture(event("Widget", 10.0));
    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(scope.snapshot().get("Widget").unwrap().sample_count, 1);

    scope.capture(event("Widget", 20.0));
    scope.capture(event("Widget", 30.0));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = scope.snapshot();
    let stats = snapshot.get("Widget").unwrap();
    assert_eq!(stats.sample_count, 3);
    assert!((stats.mean_actual_duration - 20.0).abs() < 1e-9);
    assert_eq!(snapshot.events_folded, 3);

    task.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_buffer_never_publishes() {
    let scope = scope(50);
    let task = scope.start_aggregation();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(scope.passes_published(), 0);
    task.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_wakes_on_pass() {
    let scope = scope(200);
    let task = scope.start_aggregation();
    let mut rx = scope.subscribe();

    scope.capture(event("Form", 5.0));
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().get("Form").unwrap().sample_count, 1);

    task.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reset_between_passes() {
    let scope = scope(100);
    let task = scope.start_aggregation();

    scope.capture(event("Widget", 10.0));
    tokio::time::sleep(Duration::from_millis(110)).await;
    assert!(!scope.snapshot().is_empty());

    scope.reset();
    assert!(scope.snapshot().is_empty());

    // Next pass sees an empty buffer and leaves the empty snapshot alone
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(scope.snapshot().is_empty());

    scope.capture(event("Widget", 40.0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = scope.snapshot();
    let stats = snapshot.get("Widget").unwrap();
    assert_eq!(stats.sample_count, 1);
    assert_eq!(stats.mean_actual_duration, 40.0);

    task.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_one_scope() {
    let scope = scope(100);
    let writer = scope.clone();
    let task = scope.start_aggregation();

    writer.capture(event("Widget", 1.0));
    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(scope.snapshot().get("Widget").unwrap().sample_count, 1);

    task.shutdown().await;
}
