//! Change-feed events

use billsync_record::{decode_record_at, BillingRecord, CodecError, RawRecord, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    /// Record created
    Insert,
    /// Record modified
    Update,
    /// Record removed
    Delete,
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Event as delivered by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Kind of change
    pub operation: ChangeOperation,
    /// Partition the change happened in
    pub partition: String,
    /// Affected row; for deletes only `id` is required
    pub record: RawRecord,
}

impl ChangeEvent {
    /// Create new event
    #[must_use]
    pub fn new(operation: ChangeOperation, partition: impl Into<String>, record: RawRecord) -> Self {
        Self {
            operation,
            partition: partition.into(),
            record,
        }
    }

    /// Decode into a typed change
    ///
    /// # Errors
    /// `CodecError` if the row cannot be normalized
    pub fn decode(&self, now: DateTime<Utc>) -> Result<RecordChange, CodecError> {
        match self.operation {
            ChangeOperation::Insert => decode_record_at(&self.record, now).map(RecordChange::Insert),
            ChangeOperation::Update => decode_record_at(&self.record, now).map(RecordChange::Update),
            ChangeOperation::Delete => self.record.id().map(RecordChange::Delete),
        }
    }
}

/// Decoded change, ready to apply
#[derive(Debug, Clone, PartialEq)]
pub enum RecordChange {
    /// Add, or overwrite if present
    Insert(BillingRecord),
    /// Replace, or add if absent
    Update(BillingRecord),
    /// Remove if present
    Delete(RecordId),
}

impl RecordChange {
    /// Affected record id
    #[must_use]
    pub fn id(&self) -> &RecordId {
        match self {
            Self::Insert(r) | Self::Update(r) => &r.id,
            Self::Delete(id) => id,
        }
    }
}
