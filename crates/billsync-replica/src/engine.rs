//! Replica engine
//!
//! Facade over the replica subsystem. Owns the applier task, the change-feed
//! subscriber and the mutation gateway, and serializes partition switches:
//! each activation tears the previous partition down completely (feed
//! detached, replica cleared) before the next one is loaded and attached.
//!
//! Every activation gets a fresh epoch. Commands tagged with an older epoch
//! are discarded by the applier, so late events from a previous partition can
//! never reach the current replica.

use crate::applier::{Applier, Command};
use crate::clock::{Clock, SystemClock};
use crate::config::ReplicaConfig;
use crate::error::ReplicaError;
use crate::gateway::MutationGateway;
use crate::listener::{ListenerId, ListenerRegistry, ReplicaChange};
use crate::loader::SnapshotLoader;
use crate::remote::RemoteStore;
use crate::state::FeedStatus;
use crate::store::ReplicaStore;
use crate::subscriber::ChangeFeedSubscriber;
use billsync_aggregate::{compute_aggregates, AggregateSnapshot};
use billsync_partition::{PartitionCatalog, PartitionName, PartitionRouter, Session};
use billsync_record::{BillingRecord, RecordId};
use chrono::{FixedOffset, Offset, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

/// Builder for [`ReplicaEngine`]
pub struct ReplicaEngineBuilder {
    store: Arc<dyn RemoteStore>,
    catalog: Arc<PartitionCatalog>,
    session: Arc<Session>,
    config: ReplicaConfig,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl std::fmt::Debug for ReplicaEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaEngineBuilder")
            .field("config", &self.config)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl ReplicaEngineBuilder {
    /// Set replica configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: ReplicaConfig) -> Self {
        self.config = config;
        self
    }

    /// Set time source
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the local offset used for monthly bucketing
    #[inline]
    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Spawn the applier and return the engine
    ///
    /// Must be called inside a tokio runtime. No partition is active until
    /// [`ReplicaEngine::activate`] is called.
    #[must_use]
    pub fn build(self) -> ReplicaEngine {
        let replica = Arc::new(ReplicaStore::new());
        let listeners = Arc::new(ListenerRegistry::new());
        let loader = SnapshotLoader::new(Arc::clone(&self.store), Arc::clone(&self.clock));
        let (version_tx, version_rx) = watch::channel(0);
        let (command_tx, command_rx) = mpsc::channel(self.config.effective_queue_capacity());

        let applier = Applier::new(
            Arc::clone(&replica),
            loader.clone(),
            Arc::clone(&listeners),
            Arc::clone(&self.clock),
            self.offset,
            version_tx,
        )
        .spawn(command_rx);

        let feed_status = Arc::new(watch::channel(FeedStatus::disconnected()).0);
        let subscriber = ChangeFeedSubscriber::new(
            Arc::clone(&self.store),
            command_tx.clone(),
            &self.config,
            Arc::clone(&feed_status),
        );
        let gateway = MutationGateway::new(
            Arc::clone(&self.store),
            Arc::clone(&self.session),
            Arc::clone(&self.clock),
            self.config.default_due_days,
        );

        ReplicaEngine {
            router: PartitionRouter::new(self.catalog, Arc::clone(&self.session)),
            session: self.session,
            replica,
            loader,
            gateway,
            listeners,
            commands: command_tx,
            subscriber: Mutex::new(subscriber),
            feed_status,
            version: version_rx,
            epoch: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
            clock: self.clock,
            offset: self.offset,
            applier,
        }
    }
}

/// Partition-scoped live replica of billing records
pub struct ReplicaEngine {
    router: PartitionRouter,
    session: Arc<Session>,
    replica: Arc<ReplicaStore>,
    loader: SnapshotLoader,
    gateway: MutationGateway,
    listeners: Arc<ListenerRegistry>,
    commands: mpsc::Sender<Command>,
    subscriber: Mutex<ChangeFeedSubscriber>,
    feed_status: Arc<watch::Sender<FeedStatus>>,
    version: watch::Receiver<u64>,
    epoch: AtomicU64,
    shut_down: AtomicBool,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    applier: JoinHandle<()>,
}

impl std::fmt::Debug for ReplicaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaEngine")
            .field("partition", &self.session.active())
            .field("records", &self.replica.len())
            .field("version", &self.replica.version())
            .field("feed", &self.feed_status.borrow().state)
            .finish_non_exhaustive()
    }
}

impl ReplicaEngine {
    /// Start building an engine over `store`
    #[must_use]
    pub fn builder(
        store: Arc<dyn RemoteStore>,
        catalog: Arc<PartitionCatalog>,
        session: Arc<Session>,
    ) -> ReplicaEngineBuilder {
        ReplicaEngineBuilder {
            store,
            catalog,
            session,
            config: ReplicaConfig::default(),
            clock: Arc::new(SystemClock),
            offset: Utc.fix(),
        }
    }

    /// Current replica contents, ordered by `created_at`
    #[must_use]
    pub fn replica(&self) -> Vec<BillingRecord> {
        self.replica.records()
    }

    /// Look up one replicated record
    #[must_use]
    pub fn record(&self, id: &RecordId) -> Option<BillingRecord> {
        self.replica.get(id)
    }

    /// Replica version; bumps on every effective change
    #[must_use]
    pub fn version(&self) -> u64 {
        self.replica.version()
    }

    /// Aggregates over the current replica as of now
    #[must_use]
    pub fn aggregates(&self) -> AggregateSnapshot {
        let now = self.clock.now().with_timezone(&self.offset);
        compute_aggregates(&self.replica.records(), &now)
    }

    /// Register a callback fired after every effective replica change
    pub fn on_replica_changed<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ReplicaChange) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(callback))
    }

    /// Unregister a callback
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Current feed status
    #[must_use]
    pub fn feed_status(&self) -> FeedStatus {
        self.feed_status.borrow().clone()
    }

    /// Observe feed status changes
    #[must_use]
    pub fn watch_feed(&self) -> watch::Receiver<FeedStatus> {
        self.feed_status.subscribe()
    }

    /// Observe replica version changes
    #[must_use]
    pub fn watch_version(&self) -> watch::Receiver<u64> {
        self.version.clone()
    }

    /// Write path for the active partition
    #[must_use]
    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    /// Partition the replica is bound to
    #[must_use]
    pub fn partition(&self) -> Option<PartitionName> {
        self.session.active()
    }

    /// Session this engine serves
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Catalog the router resolves against
    #[must_use]
    pub fn catalog(&self) -> &PartitionCatalog {
        self.router.catalog()
    }

    /// Resolve the session's partition, load it and attach its feed
    ///
    /// The previous partition is torn down first, whatever the outcome.
    ///
    /// # Errors
    /// - `ReplicaError::UnconfiguredPartition` if nothing resolves
    /// - `ReplicaError::SnapshotLoad` if the initial fetch fails; the replica
    ///   stays empty and no feed is attached
    /// - `ReplicaError::Shutdown` after [`Self::shutdown`]
    pub async fn activate(&self) -> Result<PartitionName, ReplicaError> {
        self.ensure_running()?;
        let mut subscriber = self.subscriber.lock().await;
        let epoch = self.teardown(&mut subscriber).await?;

        let partition = self.router.resolve_partition()?;
        tracing::info!(partition = %partition, epoch, "activating partition");

        let records = self.loader.load(&partition).await?;
        self.request(|reply| Command::Load {
            epoch,
            partition: partition.clone(),
            records,
            reply,
        })
        .await?;

        self.session.set_active(Some(partition.clone()));
        subscriber.attach(partition.clone(), epoch);
        Ok(partition)
    }

    /// Select a partition (admin only) and activate it
    ///
    /// # Errors
    /// - `ReplicaError::Configuration` if the selection is refused
    /// - anything [`Self::activate`] returns
    pub async fn select_partition(&self, name: &str) -> Result<PartitionName, ReplicaError> {
        self.ensure_running()?;
        self.router.select_partition(name)?;
        self.activate().await
    }

    /// Re-baseline the replica from the store
    ///
    /// With no active partition this is an activation. A failed reload
    /// leaves the current replica untouched.
    ///
    /// # Errors
    /// - `ReplicaError::SnapshotLoad` if the fetch fails
    /// - anything [`Self::activate`] returns when nothing is active
    pub async fn refresh(&self) -> Result<(), ReplicaError> {
        self.ensure_running()?;
        if self.session.active().is_none() {
            return self.activate().await.map(|_| ());
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.request(|reply| Command::Resync {
            epoch,
            reply: Some(reply),
        })
        .await?
    }

    /// Reconnect a degraded feed now; returns whether a retry was triggered
    pub async fn retry_feed(&self) -> bool {
        if self.shut_down.load(Ordering::SeqCst) {
            return false;
        }
        self.subscriber.lock().await.retry()
    }

    /// Detach the feed and clear the replica; later calls fail with `Shutdown`
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut subscriber = self.subscriber.lock().await;
        if let Err(e) = self.teardown(&mut subscriber).await {
            tracing::debug!(error = %e, "applier already stopped during shutdown");
        }
        tracing::info!("replica engine shut down");
    }

    async fn teardown(&self, subscriber: &mut ChangeFeedSubscriber) -> Result<u64, ReplicaError> {
        subscriber.detach();
        self.session.set_active(None);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.request(|reply| Command::Clear { epoch, reply }).await?;
        Ok(epoch)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ReplicaError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| ReplicaError::Shutdown)?;
        rx.await.map_err(|_| ReplicaError::Shutdown)
    }

    fn ensure_running(&self) -> Result<(), ReplicaError> {
        if self.shut_down.load(Ordering::SeqCst) {
            Err(ReplicaError::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl Drop for ReplicaEngine {
    fn drop(&mut self) {
        self.applier.abort();
    }
}
