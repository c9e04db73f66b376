use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use notification_service::clients::cache::CacheClient;
use notification_service::models::notification::Channel;
use notification_service::scheduler::Scheduler;

use crate::support::inquiry_request;

fn scheduler() -> (Scheduler, mpsc::Receiver<notification_service::models::notification::NotificationRequest>) {
    let cache = Arc::new(CacheClient::disabled("test"));
    let (tx, rx) = mpsc::channel(4);
    (Scheduler::new(cache, tx), rx)
}

/// Test: A fire time in the past dispatches immediately
#[tokio::test]
async fn test_past_fire_time_dispatches_immediately() -> Result<()> {
    let (scheduler, mut rx) = scheduler();

    let request = inquiry_request("u1", vec![Channel::Email]);
    let expected_id = request.id.clone();

    scheduler
        .schedule(request, Utc::now() - ChronoDuration::seconds(5))
        .await?;

    let resubmitted = timeout(Duration::from_millis(100), rx.recv())
        .await?
        .expect("request resubmitted");
    assert_eq!(resubmitted.id, expected_id);

    Ok(())
}

/// Test: A future fire time waits for the timer before resubmitting
#[tokio::test]
async fn test_future_fire_time_waits_for_timer() -> Result<()> {
    let (scheduler, mut rx) = scheduler();

    let request = inquiry_request("u1", vec![Channel::Email]);
    let expected_id = request.id.clone();

    scheduler
        .schedule(request, Utc::now() + ChronoDuration::milliseconds(1200))
        .await?;

    // Nothing fires ahead of time.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    let resubmitted = timeout(Duration::from_secs(3), rx.recv())
        .await?
        .expect("request resubmitted after timer");
    assert_eq!(resubmitted.id, expected_id);

    Ok(())
}

/// Test: Cancellation is unavailable without a reachable cache
#[tokio::test]
async fn test_cancel_without_cache_is_noop() {
    let (scheduler, _rx) = scheduler();

    assert!(!scheduler.cancel("anything").await);
}
