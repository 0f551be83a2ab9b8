//! Aggregate snapshot

use crate::monthly::{monthly_series, MonthlyEntry};
use crate::overdue::{overdue_breakdown, OverdueBreakdown};
use crate::totals::{compute_totals, Totals};
use crate::trend::TrendSummary;
use billsync_record::BillingRecord;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Every derived statistic of one replica state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    /// Evaluation time
    pub as_of: DateTime<Utc>,
    /// Status totals
    pub totals: Totals,
    /// Trailing twelve months, oldest first
    pub monthly: Vec<MonthlyEntry>,
    /// Overdue breakdown
    pub overdue: OverdueBreakdown,
    /// Current month against the previous one
    pub trends: TrendSummary,
}

impl AggregateSnapshot {
    /// Snapshot of an empty replica
    #[must_use]
    pub fn empty<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        compute_aggregates(&[], now)
    }

    /// Current month entry
    #[must_use]
    pub fn current_month(&self) -> Option<&MonthlyEntry> {
        self.monthly.last()
    }
}

/// Compute every aggregate from `records` at `now`
///
/// Pure and deterministic: the same records and `now` always produce the same
/// snapshot. Calendar months are taken in `now`'s time zone.
#[must_use]
pub fn compute_aggregates<Tz: TimeZone>(records: &[BillingRecord], now: &DateTime<Tz>) -> AggregateSnapshot {
    let monthly = monthly_series(records, now);
    let trends = TrendSummary::from_series(&monthly);
    AggregateSnapshot {
        as_of: now.with_timezone(&Utc),
        totals: compute_totals(records),
        overdue: overdue_breakdown(records, now),
        monthly,
        trends,
    }
}
