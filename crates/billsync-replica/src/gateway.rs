//! Mutation gateway
//!
//! Issues writes against the session's active partition. The replica is
//! never touched here: writes become visible once the change feed (or a
//! resync) reflects them.

use crate::clock::Clock;
use crate::error::MutationError;
use crate::remote::{BulkOutcome, RemoteStore};
use billsync_partition::{PartitionName, Session};
use billsync_record::{encode_new, encode_patch, NewRecord, RecordId, RecordPatch};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Write path to the remote store
#[derive(Clone)]
pub struct MutationGateway {
    store: Arc<dyn RemoteStore>,
    session: Arc<Session>,
    clock: Arc<dyn Clock>,
    default_due_days: i64,
}

impl std::fmt::Debug for MutationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationGateway")
            .field("partition", &self.session.active())
            .field("default_due_days", &self.default_due_days)
            .finish_non_exhaustive()
    }
}

impl MutationGateway {
    /// Create new gateway
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: Arc<Session>,
        clock: Arc<dyn Clock>,
        default_due_days: i64,
    ) -> Self {
        Self {
            store,
            session,
            clock,
            default_due_days,
        }
    }

    /// Create one record; returns its new id
    ///
    /// # Errors
    /// - `MutationError::InvalidInput` for a blank name or an overflowing due date
    /// - `MutationError::Unconfigured` with no active partition
    /// - `MutationError::Store` if the store refuses
    pub async fn create(&self, record: NewRecord) -> Result<RecordId, MutationError> {
        validate_new(&record)?;
        let partition = self.partition()?;
        let id = RecordId::generate();
        let (created_at, due_date) = self.dates()?;

        self.store
            .insert(&partition, encode_new(&id, &record, created_at, due_date))
            .await?;
        tracing::info!(partition = %partition, id = %id, "record created");
        Ok(id)
    }

    /// Apply a partial update
    ///
    /// # Errors
    /// - `MutationError::InvalidInput` for an empty patch or blank name
    /// - `MutationError::Unconfigured` with no active partition
    /// - `MutationError::Store` if the store refuses
    pub async fn update(&self, id: &RecordId, patch: RecordPatch) -> Result<(), MutationError> {
        if patch.is_empty() {
            return Err(MutationError::invalid_input("empty patch"));
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(MutationError::invalid_input("name must not be blank"));
        }
        let partition = self.partition()?;

        self.store.update(&partition, id, encode_patch(&patch)).await?;
        tracing::info!(partition = %partition, id = %id, "record updated");
        Ok(())
    }

    /// Delete one record
    ///
    /// # Errors
    /// - `MutationError::Unconfigured` with no active partition
    /// - `MutationError::Store` if the store refuses
    pub async fn delete(&self, id: &RecordId) -> Result<(), MutationError> {
        let partition = self.partition()?;
        self.store.delete(&partition, id).await?;
        tracing::info!(partition = %partition, id = %id, "record deleted");
        Ok(())
    }

    /// Delete many records, reporting per-id results
    ///
    /// # Errors
    /// - `MutationError::Unconfigured` with no active partition
    /// - `MutationError::Store` if the whole request fails
    pub async fn delete_many(&self, ids: &[RecordId]) -> Result<BulkOutcome, MutationError> {
        let partition = self.partition()?;
        if ids.is_empty() {
            return Ok(BulkOutcome::default());
        }
        let outcome = self.store.delete_many(&partition, ids).await?;
        tracing::info!(
            partition = %partition,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "bulk delete"
        );
        Ok(outcome)
    }

    /// Create many records, reporting per-id results in input order
    ///
    /// Every name is validated before anything is sent. Stores that create
    /// rows one at a time may accept some and refuse others; the outcome
    /// lists both, and accepted rows arrive through the feed as usual.
    ///
    /// # Errors
    /// - `MutationError::InvalidInput` if any name is blank or the due date overflows
    /// - `MutationError::Unconfigured` with no active partition
    /// - `MutationError::Store` if the whole request fails
    pub async fn import_many(&self, records: Vec<NewRecord>) -> Result<BulkOutcome, MutationError> {
        for (index, record) in records.iter().enumerate() {
            validate_new(record).map_err(|_| MutationError::invalid_input(format!("row {index}: name must not be blank")))?;
        }
        let partition = self.partition()?;
        if records.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let (created_at, due_date) = self.dates()?;
        let rows = records
            .iter()
            .map(|record| encode_new(&RecordId::generate(), record, created_at, due_date))
            .collect();

        let outcome = self.store.insert_many(&partition, rows).await?;
        if outcome.is_complete() {
            tracing::info!(partition = %partition, count = outcome.succeeded.len(), "bulk import");
        } else {
            tracing::warn!(
                partition = %partition,
                succeeded = outcome.succeeded.len(),
                failed = outcome.failed.len(),
                "bulk import partially failed"
            );
        }
        Ok(outcome)
    }

    fn partition(&self) -> Result<PartitionName, MutationError> {
        self.session.active().ok_or(MutationError::Unconfigured)
    }

    fn dates(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), MutationError> {
        let now = self.clock.now();
        let due = Duration::try_days(self.default_due_days)
            .and_then(|offset| now.checked_add_signed(offset))
            .ok_or_else(|| {
                MutationError::invalid_input(format!("due date {} days out is out of range", self.default_due_days))
            })?;
        Ok((now, due))
    }
}

fn validate_new(record: &NewRecord) -> Result<(), MutationError> {
    if record.name.trim().is_empty() {
        return Err(MutationError::invalid_input("name must not be blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use crate::remote::ChangeStream;
    use billsync_record::RawRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use billsync_partition::Principal;
    use billsync_record::{decode_record_at, PaymentMethod, PaymentStatus};
    use chrono::{TimeZone, Utc};

    fn partition() -> PartitionName {
        PartitionName::new("customer_bills").unwrap()
    }

    fn setup(active: bool) -> (Arc<MemoryStore>, MutationGateway) {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(Session::new(Principal::admin("owner")));
        if active {
            session.set_active(Some(partition()));
        }
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()));
        let gateway = MutationGateway::new(store.clone(), session, clock, 30);
        (store, gateway)
    }

    #[tokio::test]
    async fn create_assigns_id_and_dates() {
        let (store, gateway) = setup(true);
        let id = gateway.create(NewRecord::new("Budi", 150_000)).await.unwrap();

        let rows = store.rows(&partition());
        let record = decode_record_at(&rows[0], Utc::now()).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.created_at, Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap());
        assert_eq!(record.due_date, Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap());
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn blank_name_rejected_before_request() {
        let (store, gateway) = setup(true);
        let err = gateway.create(NewRecord::new("   ", 1)).await.unwrap_err();
        assert!(matches!(err, MutationError::InvalidInput(_)));
        assert!(store.is_empty(&partition()));
    }

    #[tokio::test]
    async fn no_active_partition_is_unconfigured() {
        let (_store, gateway) = setup(false);
        assert_eq!(
            gateway.create(NewRecord::new("Budi", 1)).await,
            Err(MutationError::Unconfigured)
        );
        assert_eq!(
            gateway.delete(&RecordId::new("x")).await,
            Err(MutationError::Unconfigured)
        );
    }

    #[tokio::test]
    async fn update_sends_patch() {
        let (store, gateway) = setup(true);
        let id = gateway.create(NewRecord::new("Budi", 150_000)).await.unwrap();
        gateway
            .update(&id, RecordPatch::mark_paid(PaymentMethod::Transfer))
            .await
            .unwrap();

        let record = decode_record_at(&store.rows(&partition())[0], Utc::now()).unwrap();
        assert_eq!(record.effective_payment_method(), Some(PaymentMethod::Transfer));

        assert!(matches!(
            gateway.update(&id, RecordPatch::new()).await,
            Err(MutationError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn import_validates_all_rows_first() {
        let (store, gateway) = setup(true);
        let err = gateway
            .import_many(vec![NewRecord::new("Budi", 1), NewRecord::new("", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::InvalidInput(_)));
        assert!(store.is_empty(&partition()));

        let outcome = gateway
            .import_many(vec![NewRecord::new("Budi", 1), NewRecord::new("Siti", 2)])
            .await
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(store.len(&partition()), 2);
    }

    /// Refuses the n-th insert and forwards everything else
    struct RefusingStore {
        inner: MemoryStore,
        refuse_at: usize,
        inserts: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RemoteStore for RefusingStore {
        async fn fetch_all(&self, partition: &PartitionName) -> Result<Vec<RawRecord>, StoreError> {
            self.inner.fetch_all(partition).await
        }

        async fn insert(&self, partition: &PartitionName, record: RawRecord) -> Result<(), StoreError> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) + 1 == self.refuse_at {
                return Err(StoreError::Unavailable("refused".into()));
            }
            self.inner.insert(partition, record).await
        }

        async fn update(
            &self,
            partition: &PartitionName,
            id: &RecordId,
            patch: RawRecord,
        ) -> Result<(), StoreError> {
            self.inner.update(partition, id, patch).await
        }

        async fn delete(&self, partition: &PartitionName, id: &RecordId) -> Result<(), StoreError> {
            self.inner.delete(partition, id).await
        }

        async fn subscribe(&self, partition: &PartitionName) -> Result<ChangeStream, StoreError> {
            self.inner.subscribe(partition).await
        }
    }

    #[tokio::test]
    async fn import_reports_rows_created_before_a_refusal() {
        let store = Arc::new(RefusingStore {
            inner: MemoryStore::new(),
            refuse_at: 2,
            inserts: AtomicUsize::new(0),
        });
        let session = Arc::new(Session::new(Principal::admin("owner")));
        session.set_active(Some(partition()));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()));
        let gateway = MutationGateway::new(store.clone(), session, clock, 30);

        let outcome = gateway
            .import_many(vec![
                NewRecord::new("Budi", 1),
                NewRecord::new("Siti", 2),
                NewRecord::new("Agus", 3),
            ])
            .await
            .unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert!(matches!(outcome.failed[0].1, StoreError::Unavailable(_)));

        let mut stored: Vec<RecordId> = store
            .inner
            .rows(&partition())
            .iter()
            .map(|row| row.id().unwrap())
            .collect();
        stored.sort();
        let mut succeeded = outcome.succeeded.clone();
        succeeded.sort();
        assert_eq!(stored, succeeded);
    }

    #[tokio::test]
    async fn overflowing_due_date_is_invalid_input() {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(Session::new(Principal::admin("owner")));
        session.set_active(Some(partition()));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()));
        let gateway = MutationGateway::new(store.clone(), session, clock, 1_000_000_000);

        let err = gateway.create(NewRecord::new("Budi", 1)).await.unwrap_err();
        assert!(matches!(err, MutationError::InvalidInput(_)));
        let err = gateway.import_many(vec![NewRecord::new("Siti", 2)]).await.unwrap_err();
        assert!(matches!(err, MutationError::InvalidInput(_)));
        assert!(store.is_empty(&partition()));
    }

    #[tokio::test]
    async fn store_failure_surfaces() {
        let (store, gateway) = setup(true);
        store.fail_mutations(true);
        let err = gateway.create(NewRecord::new("Budi", 1)).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
