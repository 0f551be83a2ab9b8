//! Applier task
//!
//! The only writer of the replica. Commands arrive on one bounded queue and
//! are handled strictly in order, so event application, snapshot loads and
//! resyncs never interleave.

use crate::clock::Clock;
use crate::error::ReplicaError;
use crate::event::ChangeEvent;
use crate::listener::{ListenerRegistry, ReplicaChange};
use crate::loader::SnapshotLoader;
use crate::store::ReplicaStore;
use billsync_aggregate::compute_aggregates;
use billsync_partition::PartitionName;
use billsync_record::BillingRecord;
use chrono::FixedOffset;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Applier command
#[derive(Debug)]
pub(crate) enum Command {
    /// Start a new epoch with an empty, unbound replica
    Clear {
        epoch: u64,
        reply: oneshot::Sender<()>,
    },
    /// Baseline the replica from a snapshot
    Load {
        epoch: u64,
        partition: PartitionName,
        records: Vec<BillingRecord>,
        reply: oneshot::Sender<()>,
    },
    /// Apply one feed event
    Event { epoch: u64, event: ChangeEvent },
    /// Reload the bound partition from the store
    Resync {
        epoch: u64,
        reply: Option<oneshot::Sender<Result<(), ReplicaError>>>,
    },
}

pub(crate) struct Applier {
    store: Arc<ReplicaStore>,
    loader: SnapshotLoader,
    listeners: Arc<ListenerRegistry>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    version: watch::Sender<u64>,
    epoch: u64,
}

impl Applier {
    pub(crate) fn new(
        store: Arc<ReplicaStore>,
        loader: SnapshotLoader,
        listeners: Arc<ListenerRegistry>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
        version: watch::Sender<u64>,
    ) -> Self {
        Self {
            store,
            loader,
            listeners,
            clock,
            offset,
            version,
            epoch: 0,
        }
    }

    pub(crate) fn spawn(self, commands: mpsc::Receiver<Command>) -> JoinHandle<()> {
        tokio::spawn(self.run(commands))
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        tracing::debug!("applier stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Clear { epoch, reply } => {
                self.epoch = epoch;
                self.store.clear();
                self.publish();
                let _ = reply.send(());
            }
            Command::Load {
                epoch,
                partition,
                records,
                reply,
            } => {
                self.epoch = epoch;
                tracing::info!(partition = %partition, epoch, records = records.len(), "replica baselined");
                self.store.replace(partition, records);
                self.publish();
                let _ = reply.send(());
            }
            Command::Event { epoch, event } => self.apply_event(epoch, &event),
            Command::Resync { epoch, reply } => {
                let result = self.resync(epoch).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
        }
    }

    fn apply_event(&mut self, epoch: u64, event: &ChangeEvent) {
        if epoch != self.epoch {
            tracing::debug!(event_epoch = epoch, current = self.epoch, "stale event discarded");
            return;
        }
        let Some(partition) = self.store.partition() else {
            tracing::debug!("event with no bound partition discarded");
            return;
        };
        if event.partition != partition.as_str() {
            tracing::warn!(
                expected = %partition,
                received = %event.partition,
                "event for another partition discarded"
            );
            return;
        }

        let change = match event.decode(self.clock.now()) {
            Ok(change) => change,
            Err(e) => {
                tracing::warn!(
                    partition = %partition,
                    operation = %event.operation,
                    error = %e,
                    "malformed event dropped"
                );
                return;
            }
        };

        let id = change.id().clone();
        let outcome = self.store.apply(change);
        tracing::debug!(partition = %partition, operation = %event.operation, id = %id, ?outcome, "event applied");
        if outcome.is_change() {
            self.publish();
        }
    }

    async fn resync(&mut self, epoch: u64) -> Result<(), ReplicaError> {
        if epoch != self.epoch {
            tracing::debug!(resync_epoch = epoch, current = self.epoch, "stale resync skipped");
            return Ok(());
        }
        let Some(partition) = self.store.partition() else {
            return Ok(());
        };

        match self.loader.load(&partition).await {
            Ok(records) => {
                tracing::info!(partition = %partition, records = records.len(), "replica resynced");
                self.store.replace(partition, records);
                self.publish();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(partition = %partition, error = %e, "resync failed, keeping current replica");
                Err(e)
            }
        }
    }

    fn publish(&self) {
        let (partition, records, version) = self.store.snapshot();
        let now = self.clock.now().with_timezone(&self.offset);
        let change = ReplicaChange {
            partition,
            version,
            record_count: records.len(),
            aggregates: Arc::new(compute_aggregates(&records, &now)),
        };
        self.version.send_replace(version);
        self.listeners.notify(&change);
    }
}
