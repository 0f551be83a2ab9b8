//! Trailing monthly series
//!
//! Twelve calendar months ending at the month containing `now`, oldest first,
//! zero-filled. Records are placed by `created_at` as seen in `now`'s time
//! zone.

use billsync_record::{BillingRecord, PaymentMethod};
use chrono::{DateTime, Datelike, TimeZone};
use serde::Serialize;
use std::fmt;

/// Number of months in the series
pub const SERIES_MONTHS: usize = 12;

/// Calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    /// Year
    pub year: i32,
    /// Month, 1-based
    pub month: u32,
}

impl MonthKey {
    /// Create new key
    #[inline]
    #[must_use]
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Month containing `dt`, in `dt`'s own time zone
    #[must_use]
    pub fn containing<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self::new(dt.year(), dt.month())
    }

    /// Month immediately before
    #[must_use]
    pub fn previous(self) -> Self {
        if self.month <= 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// Whole months from `earlier` to `self` (negative if `earlier` is later)
    #[must_use]
    pub fn months_since(self, earlier: Self) -> i64 {
        let ordinal = |k: Self| i64::from(k.year) * 12 + i64::from(k.month) - 1;
        ordinal(self) - ordinal(earlier)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One month of the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyEntry {
    /// Calendar month
    pub month: MonthKey,
    /// Paid records created this month
    pub paid_count: usize,
    /// Pending records created this month
    pub pending_count: usize,
    /// Paid in cash (or with no recorded method)
    pub cash_paid_count: usize,
    /// Paid by transfer
    pub transfer_paid_count: usize,
    /// Sum of paid amounts
    pub paid_amount: u64,
    /// Sum of pending amounts
    pub pending_amount: u64,
    /// All records created this month
    pub total_count: usize,
}

impl MonthlyEntry {
    /// Zeroed entry for `month`
    #[must_use]
    pub fn empty(month: MonthKey) -> Self {
        Self {
            month,
            paid_count: 0,
            pending_count: 0,
            cash_paid_count: 0,
            transfer_paid_count: 0,
            paid_amount: 0,
            pending_amount: 0,
            total_count: 0,
        }
    }

    fn add(&mut self, record: &BillingRecord) {
        self.total_count += 1;
        match record.effective_payment_method() {
            Some(method) => {
                self.paid_count += 1;
                self.paid_amount = self.paid_amount.saturating_add(record.amount);
                match method {
                    PaymentMethod::Cash => self.cash_paid_count += 1,
                    PaymentMethod::Transfer => self.transfer_paid_count += 1,
                }
            }
            None => {
                self.pending_count += 1;
                self.pending_amount = self.pending_amount.saturating_add(record.amount);
            }
        }
    }
}

/// Build the trailing series
#[must_use]
pub fn monthly_series<'a, Tz: TimeZone>(
    records: impl IntoIterator<Item = &'a BillingRecord>,
    now: &DateTime<Tz>,
) -> Vec<MonthlyEntry> {
    let current = MonthKey::containing(now);
    let mut keys = Vec::with_capacity(SERIES_MONTHS);
    let mut key = current;
    for _ in 0..SERIES_MONTHS {
        keys.push(key);
        key = key.previous();
    }
    keys.reverse();
    let mut series: Vec<MonthlyEntry> = keys.into_iter().map(MonthlyEntry::empty).collect();

    let tz = now.timezone();
    let last = SERIES_MONTHS - 1;
    for record in records {
        let created = MonthKey::containing(&record.created_at.with_timezone(&tz));
        let back = current.months_since(created);
        if let Ok(back) = usize::try_from(back) {
            if back <= last {
                series[last - back].add(record);
            }
        }
    }
    series
}
