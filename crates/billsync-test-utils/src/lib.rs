//! Testing utilities for the billsync workspace
//!
//! Shared fixtures, an engine harness over [`MemoryStore`], and wait helpers.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use billsync_partition::{PartitionCatalog, PartitionDescriptor, PartitionName, Principal, Role, Session};
use billsync_record::{keys, BillingRecord, RawRecord, RecordId};
use billsync_replica::{
    BackoffPolicy, ChangeEvent, ChangeOperation, FeedState, FeedStatus, ManualClock, MemoryStore,
    ReplicaConfig, ReplicaEngine,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for every wait helper
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn partition(name: &str) -> PartitionName {
    PartitionName::new(name).unwrap()
}

/// Fixed instant used as "now" by the harness clock: 2024-06-15T00:00:00Z
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()
}

/// Admin-only `customer_bills` plus two employee-visible partitions
pub fn test_catalog() -> PartitionCatalog {
    PartitionCatalog::new()
        .with(PartitionDescriptor::new(partition("customer_bills")).with_roles([Role::Admin]))
        .with(PartitionDescriptor::new(partition("tagihan_yono")))
        .with(PartitionDescriptor::new(partition("tagihan_nia")))
}

/// Fast reconnects for tests
pub fn test_config() -> ReplicaConfig {
    ReplicaConfig::default().with_backoff(
        BackoffPolicy::default()
            .with_base(Duration::from_millis(10))
            .with_max(Duration::from_millis(50))
            .with_max_attempts(3)
            .with_jitter(0.0),
    )
}

/// Builder for raw rows
#[derive(Debug, Clone)]
pub struct RowBuilder {
    row: RawRecord,
}

impl RowBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            row: RawRecord::new().with(keys::ID, id),
        }
    }

    pub fn name(self, name: &str) -> Self {
        self.set(keys::NAME, name)
    }

    pub fn amount(self, amount: u64) -> Self {
        self.set(keys::AMOUNT, amount)
    }

    pub fn paid(self, method: &str) -> Self {
        self.set(keys::STATUS, "paid").set(keys::PAYMENT_METHOD, method)
    }

    pub fn pending(self) -> Self {
        self.set(keys::STATUS, "pending")
    }

    pub fn due(self, due: &str) -> Self {
        self.set(keys::DUE_DATE, due)
    }

    pub fn created(self, created: &str) -> Self {
        self.set(keys::CREATED_AT, created)
    }

    pub fn phone(self, phone: &str) -> Self {
        self.set(keys::PHONE_NUMBER, phone)
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.row.insert(key, value);
        self
    }

    pub fn build(self) -> RawRecord {
        self.row
    }
}

/// Pending row with name and amount
pub fn row(id: &str, name: &str, amount: u64) -> RawRecord {
    RowBuilder::new(id)
        .name(name)
        .amount(amount)
        .created("2024-06-01T00:00:00Z")
        .due("2024-07-01T00:00:00Z")
        .build()
}

pub fn insert_event(partition: &str, record: RawRecord) -> ChangeEvent {
    ChangeEvent::new(ChangeOperation::Insert, partition, record)
}

pub fn update_event(partition: &str, record: RawRecord) -> ChangeEvent {
    ChangeEvent::new(ChangeOperation::Update, partition, record)
}

pub fn delete_event(partition: &str, id: &str) -> ChangeEvent {
    ChangeEvent::new(ChangeOperation::Delete, partition, RawRecord::new().with(keys::ID, id))
}

/// Ids of `records`, sorted
pub fn sorted_ids(records: &[BillingRecord]) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = records.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids
}

/// `records` sorted by id
pub fn sorted_by_id(mut records: Vec<BillingRecord>) -> Vec<BillingRecord> {
    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

/// Engine over a fresh [`MemoryStore`] with a manual clock
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub session: Arc<Session>,
    pub engine: ReplicaEngine,
    resync_on_subscribe: bool,
}

impl Harness {
    pub fn admin() -> Self {
        Self::with_principal(Principal::admin("owner"), test_config())
    }

    pub fn employee(assigned: &str) -> Self {
        Self::with_principal(Principal::employee("clerk", partition(assigned)), test_config())
    }

    pub fn with_principal(principal: Principal, config: ReplicaConfig) -> Self {
        Self::over(Arc::new(MemoryStore::new()), principal, config)
    }

    /// Harness over an existing store
    pub fn over(store: Arc<MemoryStore>, principal: Principal, config: ReplicaConfig) -> Self {
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let session = Arc::new(Session::new(principal));
        let resync_on_subscribe = config.resync_on_subscribe;
        let engine = ReplicaEngine::builder(store.clone(), Arc::new(test_catalog()), Arc::clone(&session))
            .with_config(config)
            .with_clock(clock.clone())
            .build();
        Self {
            store,
            clock,
            session,
            engine,
            resync_on_subscribe,
        }
    }

    /// Activate, wait until the feed is subscribed and, when enabled, until
    /// the post-subscribe resync has been applied
    pub async fn activate(&self) -> PartitionName {
        let partition = self.engine.activate().await.unwrap();
        self.settle().await;
        partition
    }

    /// Select `name` and settle as in [`Self::activate`]
    pub async fn select(&self, name: &str) -> PartitionName {
        let partition = self.engine.select_partition(name).await.unwrap();
        self.settle().await;
        partition
    }

    async fn settle(&self) {
        let baseline = self.engine.version();
        wait_for_feed(&self.engine, FeedStatus::is_subscribed).await;
        if self.resync_on_subscribe {
            wait_for_version(&self.engine, baseline + 1).await;
        }
    }
}

/// Wait until `predicate` holds for the replica; returns the replica
pub async fn wait_for_replica<F>(engine: &ReplicaEngine, mut predicate: F) -> Vec<BillingRecord>
where
    F: FnMut(&[BillingRecord]) -> bool,
{
    let mut versions = engine.watch_version();
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        let records = engine.replica();
        if predicate(&records) {
            return records;
        }
        match tokio::time::timeout_at(deadline, versions.changed()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => panic!("replica engine stopped"),
            Err(_) => panic!("timed out waiting for replica; last state: {records:#?}"),
        }
    }
}

/// Wait until the replica version reaches at least `version`
pub async fn wait_for_version(engine: &ReplicaEngine, version: u64) {
    let mut rx = engine.watch_version();
    let result = tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(|v| *v >= version)).await;
    assert!(
        matches!(result, Ok(Ok(_))),
        "timed out waiting for version {version}; at {}",
        engine.version()
    );
}

/// Wait until the replica holds exactly `ids`
pub async fn wait_for_ids(engine: &ReplicaEngine, ids: &[&str]) -> Vec<BillingRecord> {
    let mut expected: Vec<RecordId> = ids.iter().map(|id| RecordId::new(*id)).collect();
    expected.sort();
    wait_for_replica(engine, |records| sorted_ids(records) == expected).await
}

/// Wait until `predicate` holds for the feed status
pub async fn wait_for_feed<F>(engine: &ReplicaEngine, mut predicate: F) -> FeedStatus
where
    F: FnMut(&FeedStatus) -> bool,
{
    let mut rx = engine.watch_feed();
    let result = tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(|status| predicate(status))).await;
    match result {
        Ok(Ok(status)) => (*status).clone(),
        Ok(Err(_)) => panic!("feed status channel closed"),
        Err(_) => panic!("timed out waiting for feed; last status: {:?}", engine.feed_status()),
    }
}

/// Wait until the feed reaches `state`
pub async fn wait_for_feed_state(engine: &ReplicaEngine, state: FeedState) -> FeedStatus {
    wait_for_feed(engine, |status| status.state == state).await
}

/// Wait until the store has a live subscriber on `partition`
pub async fn wait_for_subscriber(store: &MemoryStore, partition: &PartitionName) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while store.subscriber_count(partition) == 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for a subscriber on {partition}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
