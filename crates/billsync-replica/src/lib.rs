//! billsync Replica
//!
//! Keeps a local, partition-scoped replica of billing records in sync with a
//! remote store: bulk snapshot on activation, incremental change-feed events
//! afterwards, and a full resync whenever the feed (re)subscribes.
//!
//! # Architecture
//!
//! ```text
//!  RemoteStore ──fetch_all──► SnapshotLoader ─┐
//!       │                                     ▼
//!       └──subscribe──► ChangeFeedSubscriber ──► applier task ──► ReplicaStore
//!                        (epoch-tagged events)        │
//!                                                     └──► listeners (aggregates)
//!  MutationGateway ──insert/update/delete──► RemoteStore
//! ```
//!
//! The applier is the only writer of the replica. Writes issued through the
//! [`MutationGateway`] become visible when the feed (or a resync) echoes them.

#![warn(unreachable_pub)]

mod applier;
pub mod backoff;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod gateway;
pub mod listener;
pub mod loader;
pub mod memory;
pub mod remote;
pub mod state;
pub mod store;
pub mod subscriber;

pub use backoff::BackoffPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ReplicaConfig, MAX_DUE_DAYS};
pub use engine::{ReplicaEngine, ReplicaEngineBuilder};
pub use error::{MutationError, ReplicaError, StoreError};
pub use event::{ChangeEvent, ChangeOperation, RecordChange};
pub use gateway::MutationGateway;
pub use listener::{ListenerFn, ListenerId, ListenerRegistry, ReplicaChange};
pub use loader::SnapshotLoader;
pub use memory::MemoryStore;
pub use remote::{BulkOutcome, ChangeStream, RemoteStore};
pub use state::{allowed_transitions, validate_transition, FeedState, FeedStatus, TransitionError};
pub use store::{ApplyOutcome, ReplicaStore};
pub use subscriber::ChangeFeedSubscriber;
