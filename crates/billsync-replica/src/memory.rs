//! In-memory remote store
//!
//! Reference [`RemoteStore`] used by tests, the simulator and local demos.
//! Every successful mutation is broadcast to the partition's subscribers, and
//! faults can be injected to exercise the replica's failure paths.

use crate::error::StoreError;
use crate::event::{ChangeEvent, ChangeOperation};
use crate::remote::{BulkOutcome, ChangeStream, RemoteStore};
use async_trait::async_trait;
use billsync_partition::PartitionName;
use billsync_record::{keys, RawRecord, RecordId};
use dashmap::DashMap;
use futures::StreamExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 1024;

type Table = IndexMap<RecordId, RawRecord>;

#[derive(Debug, Default)]
struct Faults {
    fail_fetch: AtomicBool,
    fail_mutations: AtomicBool,
    failing_subscribes: AtomicU32,
    duplicate_deliveries: AtomicBool,
    subscribe_attempts: AtomicU32,
}

/// In-memory store with per-partition change feeds
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<PartitionName, Table>>,
    feeds: DashMap<PartitionName, broadcast::Sender<ChangeEvent>>,
    faults: Faults,
}

impl MemoryStore {
    /// Create new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rows without emitting events
    pub fn seed(&self, partition: &PartitionName, rows: impl IntoIterator<Item = RawRecord>) {
        let mut tables = self.tables.lock();
        let table = tables.entry(partition.clone()).or_default();
        for row in rows {
            match row.id() {
                Ok(id) => {
                    table.insert(id, row);
                }
                Err(e) => tracing::warn!(partition = %partition, error = %e, "seed row without id skipped"),
            }
        }
    }

    /// Current rows of a partition in storage order
    #[must_use]
    pub fn rows(&self, partition: &PartitionName) -> Vec<RawRecord> {
        self.tables
            .lock()
            .get(partition)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rows in a partition
    #[must_use]
    pub fn len(&self, partition: &PartitionName) -> usize {
        self.tables.lock().get(partition).map_or(0, IndexMap::len)
    }

    /// Check if a partition has no rows
    #[must_use]
    pub fn is_empty(&self, partition: &PartitionName) -> bool {
        self.len(partition) == 0
    }

    /// Make `fetch_all` fail
    pub fn fail_fetches(&self, fail: bool) {
        self.faults.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make every mutation fail
    pub fn fail_mutations(&self, fail: bool) {
        self.faults.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` subscribe calls fail
    pub fn fail_next_subscribes(&self, count: u32) {
        self.faults.failing_subscribes.store(count, Ordering::SeqCst);
    }

    /// Deliver every broadcast event twice
    pub fn duplicate_deliveries(&self, enabled: bool) {
        self.faults.duplicate_deliveries.store(enabled, Ordering::SeqCst);
    }

    /// End every open subscription of a partition
    pub fn sever_feeds(&self, partition: &PartitionName) {
        if self.feeds.remove(partition).is_some() {
            tracing::debug!(partition = %partition, "feeds severed");
        }
    }

    /// Subscribe calls seen so far, failed ones included
    #[must_use]
    pub fn subscribe_attempts(&self) -> u32 {
        self.faults.subscribe_attempts.load(Ordering::SeqCst)
    }

    /// Number of live subscribers of a partition
    #[must_use]
    pub fn subscriber_count(&self, partition: &PartitionName) -> usize {
        self.feeds.get(partition).map_or(0, |tx| tx.receiver_count())
    }

    /// Push an arbitrary event to a partition's subscribers
    pub fn inject(&self, partition: &PartitionName, event: ChangeEvent) {
        self.publish(partition, event);
    }

    fn publish(&self, partition: &PartitionName, event: ChangeEvent) {
        let Some(tx) = self.feeds.get(partition).map(|tx| tx.clone()) else {
            return;
        };
        let copies = if self.faults.duplicate_deliveries.load(Ordering::SeqCst) {
            2
        } else {
            1
        };
        for _ in 0..copies {
            // No receivers is fine
            let _ = tx.send(event.clone());
        }
    }

    fn check_mutations(&self) -> Result<(), StoreError> {
        if self.faults.fail_mutations.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected mutation failure".into()));
        }
        Ok(())
    }

    fn event(partition: &PartitionName, operation: ChangeOperation, record: RawRecord) -> ChangeEvent {
        ChangeEvent::new(operation, partition.as_str(), record)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_all(&self, partition: &PartitionName) -> Result<Vec<RawRecord>, StoreError> {
        if self.faults.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected fetch failure".into()));
        }
        Ok(self.rows(partition))
    }

    async fn insert(&self, partition: &PartitionName, record: RawRecord) -> Result<(), StoreError> {
        self.check_mutations()?;
        let id = record
            .id()
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        {
            let mut tables = self.tables.lock();
            let table = tables.entry(partition.clone()).or_default();
            if table.contains_key(&id) {
                return Err(StoreError::Conflict(id.to_string()));
            }
            table.insert(id, record.clone());
        }
        self.publish(partition, Self::event(partition, ChangeOperation::Insert, record));
        Ok(())
    }

    async fn update(
        &self,
        partition: &PartitionName,
        id: &RecordId,
        patch: RawRecord,
    ) -> Result<(), StoreError> {
        self.check_mutations()?;
        let updated = {
            let mut tables = self.tables.lock();
            let row = tables
                .get_mut(partition)
                .and_then(|t| t.get_mut(id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            row.merge(&patch);
            row.insert(keys::ID, id.as_str());
            row.clone()
        };
        self.publish(partition, Self::event(partition, ChangeOperation::Update, updated));
        Ok(())
    }

    async fn delete(&self, partition: &PartitionName, id: &RecordId) -> Result<(), StoreError> {
        self.check_mutations()?;
        let removed = self
            .tables
            .lock()
            .get_mut(partition)
            .and_then(|t| t.shift_remove(id));
        if removed.is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let record = RawRecord::new().with(keys::ID, id.as_str());
        self.publish(partition, Self::event(partition, ChangeOperation::Delete, record));
        Ok(())
    }

    async fn subscribe(&self, partition: &PartitionName) -> Result<ChangeStream, StoreError> {
        self.faults.subscribe_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.faults.failing_subscribes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.faults.failing_subscribes.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected subscribe failure".into()));
        }

        let rx = self
            .feeds
            .entry(partition.clone())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe();

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(event) => Some((Ok(event), rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => Some((
                    Err(StoreError::Unavailable(format!("subscriber lagged by {skipped} events"))),
                    rx,
                )),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        });
        Ok(stream.boxed())
    }

    /// All-or-nothing: either every row is created or none is
    async fn insert_many(
        &self,
        partition: &PartitionName,
        records: Vec<RawRecord>,
    ) -> Result<BulkOutcome, StoreError> {
        self.check_mutations()?;
        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            ids.push(record.id().map_err(|e| StoreError::Rejected(e.to_string()))?);
        }
        {
            let mut tables = self.tables.lock();
            let table = tables.entry(partition.clone()).or_default();
            let mut seen = HashSet::with_capacity(ids.len());
            for id in &ids {
                if table.contains_key(id) || !seen.insert(id.clone()) {
                    return Err(StoreError::Conflict(id.to_string()));
                }
            }
            for (id, record) in ids.iter().zip(&records) {
                table.insert(id.clone(), record.clone());
            }
        }
        for record in records {
            self.publish(partition, Self::event(partition, ChangeOperation::Insert, record));
        }
        Ok(BulkOutcome {
            succeeded: ids,
            failed: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn partition() -> PartitionName {
        PartitionName::new("customer_bills").unwrap()
    }

    fn row(id: &str) -> RawRecord {
        RawRecord::try_from(json!({ "id": id, "name": "Budi", "amount": 150000 })).unwrap()
    }

    #[tokio::test]
    async fn insert_broadcasts() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe(&partition()).await.unwrap();

        store.insert(&partition(), row("c-1")).await.unwrap();

        let event = feed.next().await.unwrap().unwrap();
        assert_eq!(event.operation, ChangeOperation::Insert);
        assert_eq!(event.partition, "customer_bills");
        assert_eq!(store.len(&partition()), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        store.insert(&partition(), row("c-1")).await.unwrap();
        assert!(matches!(
            store.insert(&partition(), row("c-1")).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_merges_and_missing_is_not_found() {
        let store = MemoryStore::new();
        store.insert(&partition(), row("c-1")).await.unwrap();
        store
            .update(&partition(), &RecordId::new("c-1"), RawRecord::new().with("status", "paid"))
            .await
            .unwrap();

        let rows = store.rows(&partition());
        assert_eq!(rows[0].get("status"), Some(&json!("paid")));
        assert_eq!(rows[0].get("name"), Some(&json!("Budi")));

        assert!(matches!(
            store.update(&partition(), &RecordId::new("ghost"), RawRecord::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn bulk_delete_reports_missing() {
        let store = MemoryStore::new();
        store.insert(&partition(), row("c-1")).await.unwrap();

        let outcome = store
            .delete_many(&partition(), &[RecordId::new("c-1"), RecordId::new("ghost")])
            .await
            .unwrap();
        assert_eq!(outcome.succeeded, vec![RecordId::new("c-1")]);
        assert_eq!(outcome.failed.len(), 1);
        assert!(store.is_empty(&partition()));
    }

    #[tokio::test]
    async fn bulk_insert_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.insert(&partition(), row("c-1")).await.unwrap();

        let result = store.insert_many(&partition(), vec![row("c-2"), row("c-1")]).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.len(&partition()), 1);
    }

    #[tokio::test]
    async fn sever_ends_streams() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe(&partition()).await.unwrap();
        store.sever_feeds(&partition());
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn injected_faults() {
        let store = MemoryStore::new();
        store.fail_next_subscribes(1);
        assert!(store.subscribe(&partition()).await.is_err());
        assert!(store.subscribe(&partition()).await.is_ok());

        store.fail_fetches(true);
        assert!(store.fetch_all(&partition()).await.is_err());

        store.fail_mutations(true);
        assert!(store.insert(&partition(), row("c-1")).await.is_err());
    }
}
