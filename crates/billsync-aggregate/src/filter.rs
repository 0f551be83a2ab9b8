//! Record filters for list views
//!
//! Quick filters mirror the dashboard tabs; [`RecordFilter`] combines the
//! advanced criteria. Every criterion that is unset matches everything.

use billsync_record::{BillingRecord, PaymentMethod, PaymentStatus};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Dashboard tab filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickFilter {
    /// Everything
    #[default]
    All,
    /// Paid by any method
    Paid,
    /// Paid by transfer
    Transfer,
    /// Pending
    Unpaid,
}

impl QuickFilter {
    /// Check one record
    #[must_use]
    pub fn matches(&self, record: &BillingRecord) -> bool {
        match self {
            Self::All => true,
            Self::Paid => record.is_paid(),
            Self::Transfer => record.effective_payment_method() == Some(PaymentMethod::Transfer),
            Self::Unpaid => record.is_pending(),
        }
    }

    /// Keep matching records, in order
    #[must_use]
    pub fn apply<'a>(&self, records: &'a [BillingRecord]) -> Vec<&'a BillingRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Inclusive time range; either end may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest instant included
    pub start: Option<DateTime<Utc>>,
    /// Latest instant included
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Closed range
    #[inline]
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Whole calendar days in `tz`, from the start of `start` through the
    /// last millisecond of `end`
    #[must_use]
    pub fn days<Tz: TimeZone>(start: Option<NaiveDate>, end: Option<NaiveDate>, tz: &Tz) -> Self {
        let start = start
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|naive| tz.from_local_datetime(&naive).earliest())
            .map(|dt| dt.with_timezone(&Utc));
        let end = end
            .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
            .and_then(|naive| tz.from_local_datetime(&naive).latest())
            .map(|dt| dt.with_timezone(&Utc));
        Self { start, end }
    }

    /// Check if `instant` lies within the range
    #[must_use]
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| *instant >= start)
            && self.end.map_or(true, |end| *instant <= end)
    }
}

/// Advanced list filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    /// Case-insensitive substring of the name
    pub name_contains: Option<String>,
    /// Range over `created_at`
    pub created: Option<DateRange>,
    /// Minimum amount, inclusive
    pub min_amount: Option<u64>,
    /// Maximum amount, inclusive
    pub max_amount: Option<u64>,
    /// Exact status
    pub status: Option<PaymentStatus>,
    /// Case-insensitive substring of the package name
    pub package_contains: Option<String>,
    /// Effective payment method
    pub payment_method: Option<PaymentMethod>,
}

impl RecordFilter {
    /// Filter matching everything
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With name substring
    #[inline]
    #[must_use]
    pub fn with_name(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into());
        self
    }

    /// With creation range
    #[inline]
    #[must_use]
    pub fn with_created(mut self, range: DateRange) -> Self {
        self.created = Some(range);
        self
    }

    /// With amount bounds
    #[inline]
    #[must_use]
    pub fn with_amount_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// With package substring
    #[inline]
    #[must_use]
    pub fn with_package(mut self, needle: impl Into<String>) -> Self {
        self.package_contains = Some(needle.into());
        self
    }

    /// With payment method
    #[inline]
    #[must_use]
    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    /// Check one record against every set criterion
    #[must_use]
    pub fn matches(&self, record: &BillingRecord) -> bool {
        if let Some(needle) = non_blank(self.name_contains.as_deref()) {
            if !contains_ignore_case(&record.name, needle) {
                return false;
            }
        }
        if let Some(range) = &self.created {
            if !range.contains(&record.created_at) {
                return false;
            }
        }
        if self.min_amount.is_some_and(|min| record.amount < min)
            || self.max_amount.is_some_and(|max| record.amount > max)
        {
            return false;
        }
        if self.status.is_some_and(|status| record.status != status) {
            return false;
        }
        if let Some(needle) = non_blank(self.package_contains.as_deref()) {
            let matched = record
                .package_name
                .as_deref()
                .is_some_and(|package| contains_ignore_case(package, needle));
            if !matched {
                return false;
            }
        }
        if let Some(method) = self.payment_method {
            if record.effective_payment_method() != Some(method) {
                return false;
            }
        }
        true
    }

    /// Keep matching records, in order
    #[must_use]
    pub fn apply<'a>(&self, records: &'a [BillingRecord]) -> Vec<&'a BillingRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Paid records created within a range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentsInRange {
    /// Matching records, in replica order
    pub records: Vec<BillingRecord>,
    /// Number of matching records
    pub count: usize,
    /// Sum of their amounts
    pub total_amount: u64,
}

/// Collect paid records whose `created_at` lies in `range`
#[must_use]
pub fn payments_in_range(records: &[BillingRecord], range: &DateRange) -> PaymentsInRange {
    let records: Vec<BillingRecord> = records
        .iter()
        .filter(|r| r.is_paid() && range.contains(&r.created_at))
        .cloned()
        .collect();
    let total_amount = records.iter().fold(0u64, |sum, r| sum.saturating_add(r.amount));
    PaymentsInRange {
        count: records.len(),
        total_amount,
        records,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
