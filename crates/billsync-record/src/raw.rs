//! Raw remote rows
//!
//! [`RawRecord`] is the untyped JSON object exchanged with the remote store.

use crate::error::CodecError;
use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire keys used by the remote store
pub mod keys {
    /// Record identifier
    pub const ID: &str = "id";
    /// Customer name
    pub const NAME: &str = "name";
    /// Bill amount
    pub const AMOUNT: &str = "amount";
    /// `pending` or `paid`
    pub const STATUS: &str = "status";
    /// `cash` or `transfer`
    pub const PAYMENT_METHOD: &str = "paymentMethod";
    /// Accepted on decode only
    pub const PAYMENT_METHOD_ALT: &str = "payment_method";
    /// Free-form notes
    pub const NOTES: &str = "notes";
    /// Due date
    pub const DUE_DATE: &str = "due_date";
    /// Creation time
    pub const CREATED_AT: &str = "created_at";
    /// Contact phone
    pub const PHONE_NUMBER: &str = "phone_number";
    /// Installation address
    pub const ADDRESS: &str = "address";
    /// Subscribed package
    pub const PACKAGE_NAME: &str = "package_name";
    /// Location latitude
    pub const LATITUDE: &str = "latitude";
    /// Location longitude
    pub const LONGITUDE: &str = "longitude";
    /// Photo link
    pub const PHOTO_URL: &str = "photo_url";
}

/// Untyped row as stored remotely
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Empty row
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object
    #[inline]
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Get a field
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a field, returning the previous value
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// With field (builder form of [`Self::insert`])
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove a field
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Overwrite fields with those present in `patch`
    pub fn merge(&mut self, patch: &RawRecord) {
        for (key, value) in &patch.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Extract the identifier, if present and well-formed
    ///
    /// # Errors
    /// - `CodecError::MissingId` if absent, null or empty
    /// - `CodecError::InvalidId` if not a string or integer
    pub fn id(&self) -> Result<RecordId, CodecError> {
        match self.0.get(keys::ID) {
            None | Some(Value::Null) => Err(CodecError::MissingId),
            Some(Value::String(s)) if s.trim().is_empty() => Err(CodecError::MissingId),
            Some(Value::String(s)) => Ok(RecordId::new(s.trim())),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(RecordId::new(n.to_string())),
            Some(other) => Err(CodecError::InvalidId(other.to_string())),
        }
    }

    /// Borrow the underlying map
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no fields are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = CodecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CodecError::NotAnObject(other.to_string())),
        }
    }
}

impl From<RawRecord> for Value {
    fn from(raw: RawRecord) -> Self {
        Value::Object(raw.0)
    }
}
