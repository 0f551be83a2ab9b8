//! Change-feed subscriber
//!
//! One attachment = one partition + one epoch. The feed task forwards every
//! event into the applier queue tagged with its epoch, and reconnects with
//! backoff when the subscription is refused or lost. After `max_attempts`
//! consecutive refusals it parks in `Degraded` until [`ChangeFeedSubscriber::retry`].

use crate::applier::Command;
use crate::backoff::BackoffPolicy;
use crate::config::ReplicaConfig;
use crate::error::StoreError;
use crate::remote::RemoteStore;
use crate::state::{validate_transition, FeedState, FeedStatus};
use billsync_partition::PartitionName;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Status writer bound to one attachment epoch
#[derive(Clone)]
struct StatusHandle {
    tx: Arc<watch::Sender<FeedStatus>>,
    epoch: u64,
}

impl StatusHandle {
    fn transition(&self, to: FeedState, failures: u32, error: Option<String>) -> bool {
        let epoch = self.epoch;
        self.tx.send_if_modified(|status| {
            if status.epoch != epoch {
                return false;
            }
            if let Err(e) = validate_transition(status.state, to) {
                tracing::warn!(error = %e, "feed transition ignored");
                return false;
            }
            tracing::debug!(from = %status.state, %to, epoch, "feed transition");
            status.state = to;
            status.failed_attempts = failures;
            if error.is_some() {
                status.last_error = error;
            }
            true
        })
    }
}

/// Subscribes the replica to one partition's change feed at a time
pub struct ChangeFeedSubscriber {
    store: Arc<dyn RemoteStore>,
    commands: mpsc::Sender<Command>,
    backoff: BackoffPolicy,
    resync_on_subscribe: bool,
    resync_interval: Option<Duration>,
    status: Arc<watch::Sender<FeedStatus>>,
    retry: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for ChangeFeedSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeedSubscriber")
            .field("status", &*self.status.borrow())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl ChangeFeedSubscriber {
    pub(crate) fn new(
        store: Arc<dyn RemoteStore>,
        commands: mpsc::Sender<Command>,
        config: &ReplicaConfig,
        status: Arc<watch::Sender<FeedStatus>>,
    ) -> Self {
        Self {
            store,
            commands,
            backoff: config.backoff.clone(),
            resync_on_subscribe: config.resync_on_subscribe,
            resync_interval: config.resync_interval(),
            status,
            retry: Arc::new(Notify::new()),
            tasks: Vec::new(),
        }
    }

    /// Attach to `partition` under `epoch`, replacing any current attachment
    pub fn attach(&mut self, partition: PartitionName, epoch: u64) {
        self.detach();
        // Unconsumed retry permits belong to the old attachment
        self.retry = Arc::new(Notify::new());

        self.status.send_modify(|status| {
            *status = FeedStatus {
                state: FeedState::Connecting,
                partition: Some(partition.clone()),
                epoch,
                failed_attempts: 0,
                last_error: None,
            };
        });
        tracing::info!(partition = %partition, epoch, "attaching change feed");

        let handle = StatusHandle {
            tx: Arc::clone(&self.status),
            epoch,
        };
        self.tasks.push(tokio::spawn(run_feed(
            Arc::clone(&self.store),
            partition,
            epoch,
            self.commands.clone(),
            handle,
            Arc::clone(&self.retry),
            self.backoff.clone(),
            self.resync_on_subscribe,
        )));

        if let Some(interval) = self.resync_interval {
            self.tasks.push(tokio::spawn(run_resync_ticker(
                self.commands.clone(),
                epoch,
                interval,
            )));
        }
    }

    /// Tear down the current attachment; idempotent
    pub fn detach(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.status.send_if_modified(|status| {
            if status.state == FeedState::Disconnected {
                return false;
            }
            tracing::info!(partition = ?status.partition, epoch = status.epoch, "change feed detached");
            status.state = FeedState::Disconnected;
            status.partition = None;
            status.failed_attempts = 0;
            true
        });
    }

    /// Reconnect now if degraded; returns whether a retry was triggered
    pub fn retry(&self) -> bool {
        if self.status.borrow().state == FeedState::Degraded {
            tracing::info!("manual feed retry requested");
            self.retry.notify_one();
            true
        } else {
            false
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> FeedStatus {
        self.status.borrow().clone()
    }

    /// Observe status changes
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FeedStatus> {
        self.status.subscribe()
    }
}

impl Drop for ChangeFeedSubscriber {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_feed(
    store: Arc<dyn RemoteStore>,
    partition: PartitionName,
    epoch: u64,
    commands: mpsc::Sender<Command>,
    status: StatusHandle,
    retry: Arc<Notify>,
    backoff: BackoffPolicy,
    resync_on_subscribe: bool,
) {
    let mut failures: u32 = 0;

    loop {
        match store.subscribe(&partition).await {
            Ok(mut stream) => {
                failures = 0;
                status.transition(FeedState::Subscribed, 0, None);
                tracing::info!(partition = %partition, epoch, "change feed subscribed");

                if resync_on_subscribe
                    && commands
                        .send(Command::Resync { epoch, reply: None })
                        .await
                        .is_err()
                {
                    return;
                }

                let reason = loop {
                    match stream.next().await {
                        Some(Ok(event)) => {
                            if commands.send(Command::Event { epoch, event }).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(e)) => break e,
                        None => break StoreError::Closed,
                    }
                };
                tracing::warn!(partition = %partition, epoch, error = %reason, "change feed lost");
                status.transition(FeedState::Degraded, failures, Some(reason.to_string()));
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                tracing::warn!(partition = %partition, epoch, attempt = failures, error = %e, "subscribe failed");
                status.transition(FeedState::Degraded, failures, Some(e.to_string()));
            }
        }

        if backoff.is_exhausted(failures) {
            tracing::warn!(partition = %partition, failures, "change feed degraded until manual retry");
            retry.notified().await;
            failures = 0;
        } else {
            let delay = backoff.delay(failures.max(1));
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = retry.notified() => failures = 0,
            }
        }
        status.transition(FeedState::Reconnecting, failures, None);
    }
}

async fn run_resync_ticker(commands: mpsc::Sender<Command>, epoch: u64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        tracing::debug!(epoch, "periodic resync");
        if commands.send(Command::Resync { epoch, reply: None }).await.is_err() {
            break;
        }
    }
}
