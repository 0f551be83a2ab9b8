//! billsync Record
//!
//! The billing record model shared by every other crate in the workspace,
//! plus the codec that turns untyped remote rows into it.
//!
//! # Core Concepts
//!
//! - [`BillingRecord`]: normalized record; dates always valid
//! - [`RawRecord`]: JSON object as exchanged with the remote store
//! - [`decode_record_at`]: raw → typed, with default substitution
//! - [`encode_new`] / [`encode_patch`]: typed → outbound request rows
//!
//! # Example
//!
//! ```rust
//! use billsync_record::{decode_record_at, RawRecord, PaymentStatus};
//! use chrono::Utc;
//! use serde_json::json;
//!
//! let raw = RawRecord::try_from(json!({"id": "c-1", "name": "Budi", "amount": 150000})).unwrap();
//! let record = decode_record_at(&raw, Utc::now()).unwrap();
//! assert_eq!(record.status, PaymentStatus::Pending);
//! ```

#![warn(unreachable_pub)]

pub mod codec;
pub mod error;
pub mod raw;
pub mod time;
pub mod types;

pub use codec::{decode_record, decode_record_at, encode_new, encode_patch, encode_record};
pub use error::CodecError;
pub use raw::{keys, RawRecord};
pub use time::{format_timestamp, parse_timestamp, parse_timestamp_str};
pub use types::{
    BillingRecord, GeoPoint, NewRecord, PaymentMethod, PaymentStatus, RecordId, RecordPatch,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
