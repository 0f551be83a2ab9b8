//! Change-feed loss, reconnect and resync tests

use billsync_partition::Principal;
use billsync_replica::{FeedState, ReplicaError};
use billsync_test_utils::{
    partition, row, test_config, wait_for_feed, wait_for_ids, Harness,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_severed_feed_resubscribes_and_resyncs() {
    let h = Harness::admin();
    let bills = partition("customer_bills");
    h.store.seed(&bills, [row("a", "Budi", 100)]);
    h.activate().await;
    let epoch = h.engine.feed_status().epoch;

    h.store.sever_feeds(&bills);
    // Changed while disconnected; no event will ever carry it
    h.store.seed(&bills, [row("missed", "Siti", 200)]);

    wait_for_ids(&h.engine, &["a", "missed"]).await;
    let status = wait_for_feed(&h.engine, |s| s.is_subscribed()).await;
    assert_eq!(status.epoch, epoch);
    assert_eq!(status.partition, Some(bills));
    assert!(status.last_error.is_some());
}

#[tokio::test]
async fn test_exhausted_retries_wait_for_manual_retry() {
    let h = Harness::admin();
    let bills = partition("customer_bills");
    h.store.seed(&bills, [row("a", "Budi", 100)]);
    h.store.fail_next_subscribes(100);

    h.engine.activate().await.unwrap();
    wait_for_ids(&h.engine, &["a"]).await;

    let status = wait_for_feed(&h.engine, |s| {
        s.state == FeedState::Degraded && s.failed_attempts >= 3
    })
    .await;
    assert!(status.last_error.is_some());

    h.store.fail_next_subscribes(0);
    h.store.seed(&bills, [row("b", "Siti", 200)]);
    assert!(h.engine.retry_feed().await);

    wait_for_feed(&h.engine, |s| s.is_subscribed()).await;
    wait_for_ids(&h.engine, &["a", "b"]).await;
    assert!(!h.engine.retry_feed().await);
}

#[tokio::test]
async fn test_transient_subscribe_failures_recover_on_their_own() {
    let h = Harness::admin();
    let bills = partition("customer_bills");
    h.store.fail_next_subscribes(2);

    h.engine.activate().await.unwrap();
    let status = wait_for_feed(&h.engine, |s| s.is_subscribed()).await;
    assert_eq!(status.failed_attempts, 0);

    h.store.seed(&bills, [row("a", "Budi", 100)]);
    h.engine.refresh().await.unwrap();
    wait_for_ids(&h.engine, &["a"]).await;
}

#[tokio::test]
async fn test_refresh_failure_keeps_current_replica() {
    let h = Harness::admin();
    h.store.seed(&partition("customer_bills"), [row("a", "Budi", 100)]);
    h.activate().await;
    let version = h.engine.version();

    h.store.fail_fetches(true);
    let err = h.engine.refresh().await.unwrap_err();
    assert!(matches!(err, ReplicaError::SnapshotLoad { .. }));
    assert_eq!(h.engine.replica().len(), 1);
    assert_eq!(h.engine.version(), version);
    assert_eq!(h.engine.partition(), Some(partition("customer_bills")));
}

#[tokio::test]
async fn test_periodic_resync_picks_up_silent_changes() {
    let config = test_config().with_resync_interval(Some(Duration::from_secs(1)));
    let h = Harness::with_principal(Principal::admin("owner"), config);
    let bills = partition("customer_bills");
    h.activate().await;

    h.store.seed(&bills, [row("quiet", "Budi", 100)]);
    wait_for_ids(&h.engine, &["quiet"]).await;
}

#[tokio::test]
async fn test_without_resync_on_subscribe_only_events_apply() {
    let config = test_config().with_resync_on_subscribe(false);
    let h = Harness::with_principal(Principal::admin("owner"), config);
    let bills = partition("customer_bills");
    h.activate().await;

    h.store.seed(&bills, [row("silent", "Siti", 1)]);
    h.store.sever_feeds(&bills);
    wait_for_feed(&h.engine, |s| s.is_subscribed() && s.last_error.is_some()).await;

    billsync_replica::RemoteStore::insert(&*h.store, &bills, row("loud", "Budi", 2))
        .await
        .unwrap();
    wait_for_ids(&h.engine, &["loud"]).await;
}

#[tokio::test]
async fn test_shutdown_detaches_feed() {
    let h = Harness::admin();
    h.activate().await;

    h.engine.shutdown().await;
    assert_eq!(h.engine.feed_status().state, FeedState::Disconnected);
    assert_eq!(h.engine.partition(), None);
    assert!(matches!(
        h.engine.select_partition("tagihan_yono").await,
        Err(ReplicaError::Shutdown)
    ));
}
