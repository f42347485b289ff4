//! Retry scanner behaviour against an in-memory status store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;

use common::{FakeDelivery, FakeStore};
use mailflow_notifier::retry::{RetryScanner, ScanReport};

fn scanner(delivery: Arc<FakeDelivery>, store: Arc<FakeStore>, max_retries: u32) -> RetryScanner {
    RetryScanner::new(
        "scanner-test",
        delivery,
        store,
        max_retries,
        10,
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn test_only_due_candidates_are_retried() {
    let now = Utc::now();
    let (store, due) = FakeStore::new().with_failed(2, Some(now - ChronoDuration::seconds(30)));
    let (store, future) = store.with_failed(2, Some(now + ChronoDuration::minutes(10)));
    let (store, unscheduled) = store.with_failed(1, None);
    let delivery = Arc::new(FakeDelivery::new());

    let report = scanner(delivery.clone(), Arc::new(store), 5)
        .scan_once(now, &CancellationToken::new())
        .await;

    let retried = delivery.retried();
    assert_eq!(retried, vec![due]);
    assert!(!retried.contains(&future));
    assert!(!retried.contains(&unscheduled));
    assert_eq!(
        report,
        ScanReport {
            candidates: 3,
            retried: 1,
            skipped: 2,
            failed: 0,
        }
    );
}

#[tokio::test]
async fn test_exhausted_message_is_skipped_permanently() {
    let now = Utc::now();
    let (store, exhausted) = FakeStore::new().with_failed(5, Some(now - ChronoDuration::hours(1)));
    let store = Arc::new(store);
    let delivery = Arc::new(FakeDelivery::new());
    let scanner = scanner(delivery.clone(), store, 5);

    // Stays skipped however much later we look.
    for hours in [0, 1, 24, 24 * 30] {
        let report = scanner
            .scan_once(now + ChronoDuration::hours(hours), &CancellationToken::new())
            .await;
        assert_eq!(report.skipped, 1);
    }
    assert!(!delivery.retried().contains(&exhausted));
    assert!(delivery.retried().is_empty());
}

#[tokio::test]
async fn test_store_errors_skip_item_and_continue() {
    let now = Utc::now();
    let (store, _dangling) = FakeStore::new().with_dangling();
    let (store, due) = store.with_failed(0, Some(now));
    let delivery = Arc::new(FakeDelivery::new());

    let report = scanner(delivery.clone(), Arc::new(store), 3)
        .scan_once(now, &CancellationToken::new())
        .await;

    assert_eq!(delivery.retried(), vec![due]);
    assert_eq!(report.failed, 1);
    assert_eq!(report.retried, 1);
}

#[tokio::test]
async fn test_retry_failure_is_counted_not_fatal() {
    let now = Utc::now();
    let (store, flaky) = FakeStore::new().with_failed(1, Some(now));
    let (store, healthy) = store.with_failed(1, Some(now));
    let delivery = Arc::new(FakeDelivery::new().fail_retry_of(flaky));

    let report = scanner(delivery.clone(), Arc::new(store), 5)
        .scan_once(now, &CancellationToken::new())
        .await;

    assert_eq!(delivery.retried(), vec![flaky, healthy]);
    assert_eq!(report.failed, 1);
    assert_eq!(report.retried, 1);
}

#[tokio::test]
async fn test_listing_failure_yields_empty_report() {
    let delivery = Arc::new(FakeDelivery::new());
    let store = Arc::new(FakeStore::broken());

    let report = scanner(delivery.clone(), store.clone(), 5)
        .scan_once(Utc::now(), &CancellationToken::new())
        .await;

    assert_eq!(report, ScanReport::default());
    assert_eq!(store.requested_limits(), vec![10]);
    assert!(delivery.retried().is_empty());
}

#[tokio::test]
async fn test_cancelled_scan_stops_between_candidates() {
    let now = Utc::now();
    let (store, _) = FakeStore::new().with_failed(0, Some(now));
    let delivery = Arc::new(FakeDelivery::new());
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let report = scanner(delivery.clone(), Arc::new(store), 5)
        .scan_once(now, &shutdown)
        .await;

    assert_eq!(report.candidates, 1);
    assert_eq!(report.retried, 0);
    assert!(delivery.retried().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_exits_promptly_on_shutdown() {
    let delivery = Arc::new(FakeDelivery::new());
    let store = Arc::new(FakeStore::new());
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn(scanner(delivery, store.clone(), 5).run(shutdown.clone()));
    tokio::time::sleep(Duration::from_secs(150)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_millis(10), handle)
        .await
        .expect("scanner did not exit")
        .unwrap();
    assert_eq!(store.requested_limits().len(), 2);
}
