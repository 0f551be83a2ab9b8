//! Remote store seam
//!
//! The source of truth is external. Anything offering create / read / update /
//! delete plus a per-partition change subscription can back the replica.

use crate::error::StoreError;
use crate::event::ChangeEvent;
use async_trait::async_trait;
use billsync_partition::PartitionName;
use billsync_record::{RawRecord, RecordId};
use futures::stream::BoxStream;

/// Live change subscription; ends when the store closes it
pub type ChangeStream = BoxStream<'static, Result<ChangeEvent, StoreError>>;

/// Per-id result of a bulk request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Ids the store accepted
    pub succeeded: Vec<RecordId>,
    /// Ids the store refused, with the reason
    pub failed: Vec<(RecordId, StoreError)>,
}

impl BulkOutcome {
    /// Check if every id succeeded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Record one per-id result
    pub fn push(&mut self, id: RecordId, result: Result<(), StoreError>) {
        match result {
            Ok(()) => self.succeeded.push(id),
            Err(e) => self.failed.push((id, e)),
        }
    }
}

/// Authoritative remote store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch every row of a partition in storage order
    async fn fetch_all(&self, partition: &PartitionName) -> Result<Vec<RawRecord>, StoreError>;

    /// Create one row
    async fn insert(&self, partition: &PartitionName, record: RawRecord) -> Result<(), StoreError>;

    /// Apply a partial update to one row
    async fn update(
        &self,
        partition: &PartitionName,
        id: &RecordId,
        patch: RawRecord,
    ) -> Result<(), StoreError>;

    /// Remove one row
    async fn delete(&self, partition: &PartitionName, id: &RecordId) -> Result<(), StoreError>;

    /// Open a change subscription; returning the stream acknowledges it
    async fn subscribe(&self, partition: &PartitionName) -> Result<ChangeStream, StoreError>;

    /// Create many rows, reporting per-id results
    ///
    /// The default issues one insert per row and keeps going past failures.
    /// Every row must carry an id; otherwise nothing is sent.
    async fn insert_many(
        &self,
        partition: &PartitionName,
        records: Vec<RawRecord>,
    ) -> Result<BulkOutcome, StoreError> {
        let ids = records
            .iter()
            .map(RawRecord::id)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Rejected(e.to_string()))?;

        let mut outcome = BulkOutcome::default();
        for (id, record) in ids.into_iter().zip(records) {
            let result = self.insert(partition, record).await;
            outcome.push(id, result);
        }
        Ok(outcome)
    }

    /// Remove many rows, reporting per-id results
    async fn delete_many(
        &self,
        partition: &PartitionName,
        ids: &[RecordId],
    ) -> Result<BulkOutcome, StoreError> {
        let mut outcome = BulkOutcome::default();
        for id in ids {
            let result = self.delete(partition, id).await;
            outcome.push(id.clone(), result);
        }
        Ok(outcome)
    }
}
