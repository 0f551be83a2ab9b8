//! Error types for the replica subsystem
//!
//! Three layers:
//! - [`StoreError`]: transport failures reported by a [`crate::RemoteStore`]
//! - [`MutationError`]: gateway request failures
//! - [`ReplicaError`]: everything the engine surfaces to consumers

use billsync_partition::PartitionError;

/// Remote store transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store unreachable or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Record already exists
    #[error("conflict: {0}")]
    Conflict(String),

    /// Record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Store refused the request
    #[error("rejected: {0}")]
    Rejected(String),

    /// Subscription closed by the store
    #[error("subscription closed")]
    Closed,
}

impl StoreError {
    /// Check if a later attempt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Closed)
    }
}

/// Mutation gateway errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Session has no active partition
    #[error("no active partition")]
    Unconfigured,

    /// Request rejected before being issued
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Store rejected or failed the request
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MutationError {
    /// Create invalid-input error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Check if a later attempt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}

/// Replica engine errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReplicaError {
    /// Principal has no resolvable partition
    #[error("no partition configured for principal '{principal}'")]
    UnconfiguredPartition {
        /// Principal id
        principal: String,
    },

    /// Partition selection or catalog mistake
    #[error("configuration error: {0}")]
    Configuration(PartitionError),

    /// Snapshot fetch failed; replica left empty
    #[error("snapshot load for '{partition}' failed: {source}")]
    SnapshotLoad {
        /// Partition being loaded
        partition: String,
        /// Transport failure
        source: StoreError,
    },

    /// Change feed could not be established
    #[error("change feed for '{partition}' failed: {source}")]
    FeedConnection {
        /// Partition being subscribed
        partition: String,
        /// Transport failure
        source: StoreError,
    },

    /// Gateway request failed
    #[error("mutation failed: {0}")]
    Mutation(#[from] MutationError),

    /// Inbound event could not be decoded
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Engine has been shut down
    #[error("replica engine shut down")]
    Shutdown,
}

impl ReplicaError {
    /// Create snapshot load error
    pub fn snapshot_load(partition: impl Into<String>, source: StoreError) -> Self {
        Self::SnapshotLoad {
            partition: partition.into(),
            source,
        }
    }

    /// Create feed connection error
    pub fn feed_connection(partition: impl Into<String>, source: StoreError) -> Self {
        Self::FeedConnection {
            partition: partition.into(),
            source,
        }
    }

    /// Check if the operation may succeed when retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SnapshotLoad { .. } | Self::FeedConnection { .. } => true,
            Self::Mutation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<PartitionError> for ReplicaError {
    fn from(err: PartitionError) -> Self {
        match err {
            PartitionError::Unconfigured { principal } => Self::UnconfiguredPartition { principal },
            other => Self::Configuration(other),
        }
    }
}
