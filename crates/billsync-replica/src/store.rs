//! Replica store
//!
//! In-memory, partition-scoped record collection. Reads take a consistent
//! view under a read lock; writes come only from the applier task.

use crate::event::RecordChange;
use billsync_partition::PartitionName;
use billsync_record::{BillingRecord, RecordId};
use indexmap::IndexMap;
use parking_lot::RwLock;

/// Effect of applying one change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// New record added
    Inserted,
    /// Existing record overwritten
    Replaced,
    /// Record removed
    Removed,
    /// Nothing changed (duplicate delivery, or delete of an absent id)
    Unchanged,
}

impl ApplyOutcome {
    /// Check if the replica changed
    #[inline]
    #[must_use]
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Default)]
struct Inner {
    partition: Option<PartitionName>,
    records: IndexMap<RecordId, BillingRecord>,
    version: u64,
}

impl Inner {
    fn bump(&mut self) {
        self.version += 1;
    }
}

/// Partition-scoped replica
#[derive(Debug, Default)]
pub struct ReplicaStore {
    inner: RwLock<Inner>,
}

impl ReplicaStore {
    /// Create new empty replica bound to no partition
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all contents with a snapshot of `partition`
    pub fn replace(&self, partition: PartitionName, records: Vec<BillingRecord>) {
        let mut inner = self.inner.write();
        inner.records = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        inner.partition = Some(partition);
        inner.bump();
    }

    /// Discard contents and partition binding
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.partition = None;
        inner.bump();
    }

    /// Add, or overwrite in place if present
    pub fn insert(&self, record: BillingRecord) -> ApplyOutcome {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let outcome = match inner.records.get_mut(&record.id) {
            Some(existing) if *existing == record => ApplyOutcome::Unchanged,
            Some(existing) => {
                *existing = record;
                ApplyOutcome::Replaced
            }
            None => {
                inner.records.insert(record.id.clone(), record);
                ApplyOutcome::Inserted
            }
        };
        if outcome.is_change() {
            inner.bump();
        }
        outcome
    }

    /// Replace, or add if absent
    pub fn update(&self, record: BillingRecord) -> ApplyOutcome {
        self.insert(record)
    }

    /// Remove if present
    pub fn delete(&self, id: &RecordId) -> ApplyOutcome {
        let mut inner = self.inner.write();
        if inner.records.shift_remove(id).is_some() {
            inner.bump();
            ApplyOutcome::Removed
        } else {
            ApplyOutcome::Unchanged
        }
    }

    /// Apply a decoded change
    pub fn apply(&self, change: RecordChange) -> ApplyOutcome {
        match change {
            RecordChange::Insert(record) => self.insert(record),
            RecordChange::Update(record) => self.update(record),
            RecordChange::Delete(id) => self.delete(&id),
        }
    }

    /// Copy of all records in replica order
    #[must_use]
    pub fn records(&self) -> Vec<BillingRecord> {
        self.inner.read().records.values().cloned().collect()
    }

    /// Partition, records and version read together
    #[must_use]
    pub fn snapshot(&self) -> (Option<PartitionName>, Vec<BillingRecord>, u64) {
        let inner = self.inner.read();
        (
            inner.partition.clone(),
            inner.records.values().cloned().collect(),
            inner.version,
        )
    }

    /// Look up one record
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<BillingRecord> {
        self.inner.read().records.get(id).cloned()
    }

    /// Partition the replica is bound to
    #[must_use]
    pub fn partition(&self) -> Option<PartitionName> {
        self.inner.read().partition.clone()
    }

    /// Change counter; increases on every effective change
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billsync_record::PaymentMethod;
    use chrono::{TimeZone, Utc};

    fn record(id: &str) -> BillingRecord {
        BillingRecord::new(id, "Budi", 150_000, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn insert_is_idempotent() {
        let store = ReplicaStore::new();
        assert_eq!(store.insert(record("a")), ApplyOutcome::Inserted);
        let version = store.version();

        assert_eq!(store.insert(record("a")), ApplyOutcome::Unchanged);
        assert_eq!(store.len(), 1);
        assert_eq!(store.version(), version);
    }

    #[test]
    fn insert_present_overwrites_in_place() {
        let store = ReplicaStore::new();
        store.insert(record("a"));
        store.insert(record("b"));

        let paid = record("a").paid_by(PaymentMethod::Cash);
        assert_eq!(store.insert(paid.clone()), ApplyOutcome::Replaced);

        let records = store.records();
        assert_eq!(records[0], paid);
        assert_eq!(records[1].id.as_str(), "b");
    }

    #[test]
    fn update_absent_synthesizes_insert() {
        let store = ReplicaStore::new();
        assert_eq!(store.update(record("a")), ApplyOutcome::Inserted);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_absent_is_noop() {
        let store = ReplicaStore::new();
        store.insert(record("a"));
        assert_eq!(store.delete(&RecordId::new("a")), ApplyOutcome::Removed);
        let version = store.version();

        assert_eq!(store.delete(&RecordId::new("a")), ApplyOutcome::Unchanged);
        assert_eq!(store.version(), version);
        assert!(store.is_empty());
    }

    #[test]
    fn replace_and_clear_rebind_partition() {
        let store = ReplicaStore::new();
        let partition = PartitionName::new("customer_bills").unwrap();
        store.replace(partition.clone(), vec![record("a"), record("b")]);
        assert_eq!(store.partition(), Some(partition));
        assert_eq!(store.len(), 2);

        store.clear();
        assert_eq!(store.partition(), None);
        assert!(store.is_empty());
    }
}
