//! Core billing types
//!
//! Defines the normalized shapes the rest of the workspace works with:
//! - [`BillingRecord`]: one customer's current billing state
//! - [`NewRecord`]: create / import input
//! - [`RecordPatch`]: partial update

use crate::error::CodecError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque record identifier, unique within a partition
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an existing identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier (UUID v4)
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Payment status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet paid
    #[default]
    Pending,
    /// Paid in full
    Paid,
}

impl PaymentStatus {
    /// Wire representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            _ => Err(CodecError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a paid record was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash collected in person
    Cash,
    /// Bank transfer
    Transfer,
}

impl PaymentMethod {
    /// Wire representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Transfer => "transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "transfer" => Ok(Self::Transfer),
            _ => Err(CodecError::InvalidPaymentMethod(s.to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl GeoPoint {
    /// Create new point
    #[inline]
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One customer's current billing state within a partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Partition-scoped identifier
    pub id: RecordId,
    /// Customer name
    pub name: String,
    /// Billed amount in whole currency units
    pub amount: u64,
    /// Payment status
    pub status: PaymentStatus,
    /// Settlement method, only meaningful when paid
    pub payment_method: Option<PaymentMethod>,
    /// Due date
    pub due_date: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Contact number
    pub phone_number: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Subscribed internet package
    pub package_name: Option<String>,
    /// Installation location
    pub location: Option<GeoPoint>,
    /// Customer or installation photo
    pub photo_url: Option<String>,
}

impl BillingRecord {
    /// Create a pending record created and due at `now`
    #[must_use]
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, amount: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            amount,
            status: PaymentStatus::Pending,
            payment_method: None,
            due_date: now,
            created_at: now,
            notes: None,
            phone_number: None,
            address: None,
            package_name: None,
            location: None,
            photo_url: None,
        }
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark as paid with the given method
    #[inline]
    #[must_use]
    pub fn paid_by(mut self, method: PaymentMethod) -> Self {
        self.status = PaymentStatus::Paid;
        self.payment_method = Some(method);
        self
    }

    /// With due date
    #[inline]
    #[must_use]
    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = due_date;
        self
    }

    /// With creation time
    #[inline]
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// With package name
    #[inline]
    #[must_use]
    pub fn with_package(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = Some(package_name.into());
        self
    }

    /// With phone number
    #[inline]
    #[must_use]
    pub fn with_phone(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    /// Check if paid
    #[inline]
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    /// Check if pending
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// Settlement method with the legacy default applied
    ///
    /// Paid rows without a method were settled in cash. Pending rows have no
    /// effective method.
    #[inline]
    #[must_use]
    pub fn effective_payment_method(&self) -> Option<PaymentMethod> {
        if self.is_paid() {
            Some(self.payment_method.unwrap_or(PaymentMethod::Cash))
        } else {
            None
        }
    }

    /// Pending and due strictly before `now`
    #[inline]
    #[must_use]
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.due_date < now
    }
}

/// Create / import input
///
/// `id`, `created_at` and `due_date` are assigned when the request is issued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Customer name
    pub name: String,
    /// Bill amount in whole currency units
    pub amount: u64,
    /// Initial status
    #[serde(default)]
    pub status: PaymentStatus,
    /// Payment method, if already paid
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Contact phone
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Installation address
    #[serde(default)]
    pub address: Option<String>,
    /// Subscribed internet package
    #[serde(default)]
    pub package_name: Option<String>,
    /// Installation location
    #[serde(default)]
    pub location: Option<GeoPoint>,
    /// Customer or installation photo
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl NewRecord {
    /// Pending record with name and amount
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, amount: u64) -> Self {
        Self {
            name: name.into(),
            amount,
            ..Self::default()
        }
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    /// With payment method
    #[inline]
    #[must_use]
    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    /// With package name
    #[inline]
    #[must_use]
    pub fn with_package(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = Some(package_name.into());
        self
    }

    /// With phone number
    #[inline]
    #[must_use]
    pub fn with_phone(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    /// With location
    #[inline]
    #[must_use]
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }
}

/// Partial update; only fields that are set are sent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    /// New name
    pub name: Option<String>,
    /// New amount
    pub amount: Option<u64>,
    /// New status
    pub status: Option<PaymentStatus>,
    /// New payment method
    pub payment_method: Option<PaymentMethod>,
    /// New due date
    pub due_date: Option<DateTime<Utc>>,
    /// New notes
    pub notes: Option<String>,
    /// New phone number
    pub phone_number: Option<String>,
    /// New address
    pub address: Option<String>,
    /// New package
    pub package_name: Option<String>,
    /// New location
    pub location: Option<GeoPoint>,
    /// New photo link
    pub photo_url: Option<String>,
}

impl RecordPatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that settles the record
    #[inline]
    #[must_use]
    pub fn mark_paid(method: PaymentMethod) -> Self {
        Self {
            status: Some(PaymentStatus::Paid),
            payment_method: Some(method),
            ..Self::default()
        }
    }

    /// With name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With amount
    #[inline]
    #[must_use]
    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// With due date
    #[inline]
    #[must_use]
    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Check if nothing is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn status_parses_case_insensitive() {
        assert_eq!("PAID".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert_eq!(" pending ".parse::<PaymentStatus>().unwrap(), PaymentStatus::Pending);
        assert!("lunas".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn method_parses() {
        assert_eq!("Transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::Transfer);
        assert!(matches!(
            "qris".parse::<PaymentMethod>(),
            Err(CodecError::InvalidPaymentMethod(_))
        ));
    }

    #[test]
    fn paid_without_method_counts_as_cash() {
        let mut record = BillingRecord::new("a", "Budi", 1000, now()).with_status(PaymentStatus::Paid);
        assert_eq!(record.effective_payment_method(), Some(PaymentMethod::Cash));

        record.payment_method = Some(PaymentMethod::Transfer);
        assert_eq!(record.effective_payment_method(), Some(PaymentMethod::Transfer));
    }

    #[test]
    fn pending_has_no_effective_method() {
        let mut record = BillingRecord::new("a", "Budi", 1000, now());
        record.payment_method = Some(PaymentMethod::Transfer);
        assert_eq!(record.effective_payment_method(), None);
    }

    #[test]
    fn overdue_is_strict() {
        let record = BillingRecord::new("a", "Budi", 1000, now());
        assert!(!record.is_overdue_at(now()));
        assert!(record.is_overdue_at(now() + Duration::seconds(1)));
        assert!(!record.clone().paid_by(PaymentMethod::Cash).is_overdue_at(now() + Duration::days(3)));
    }

    #[test]
    fn patch_is_empty() {
        assert!(RecordPatch::new().is_empty());
        assert!(!RecordPatch::mark_paid(PaymentMethod::Cash).is_empty());
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }
}
