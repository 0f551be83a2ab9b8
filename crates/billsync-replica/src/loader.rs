//! Snapshot loader

use crate::clock::Clock;
use crate::error::ReplicaError;
use crate::remote::RemoteStore;
use billsync_partition::PartitionName;
use billsync_record::{decode_record_at, BillingRecord};
use std::sync::Arc;

/// Bulk-fetches a partition for (re)baselining the replica
#[derive(Clone)]
pub struct SnapshotLoader {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SnapshotLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotLoader").field("clock", &self.clock).finish_non_exhaustive()
    }
}

impl SnapshotLoader {
    /// Create new loader
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Fetch and decode every record of `partition`
    ///
    /// Ordered by `created_at` ascending, ties in storage order. Rows that do
    /// not decode are skipped.
    ///
    /// # Errors
    /// `ReplicaError::SnapshotLoad` on transport failure
    pub async fn load(&self, partition: &PartitionName) -> Result<Vec<BillingRecord>, ReplicaError> {
        let rows = self.store.fetch_all(partition).await.map_err(|e| {
            tracing::error!(partition = %partition, error = %e, "snapshot fetch failed");
            ReplicaError::snapshot_load(partition.as_str(), e)
        })?;

        let now = self.clock.now();
        let total = rows.len();
        let mut records: Vec<BillingRecord> = rows
            .iter()
            .filter_map(|row| match decode_record_at(row, now) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(partition = %partition, error = %e, field = ?e.field(), "skipping undecodable row");
                    None
                }
            })
            .collect();
        records.sort_by_key(|r| r.created_at);

        tracing::debug!(partition = %partition, loaded = records.len(), skipped = total - records.len(), "snapshot loaded");
        Ok(records)
    }
}
