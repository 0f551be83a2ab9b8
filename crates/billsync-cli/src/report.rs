//! Offline aggregate report over an exported partition
//!
//! Input is a JSON array of raw rows, exactly as the remote store returns
//! them. Rows that do not decode are counted and skipped. A [`ReportFilter`]
//! narrows the rows that are aggregated, the same way the list views do.

use anyhow::{Context, Result};
use billsync_aggregate::{
    compute_aggregates, payments_in_range, AggregateSnapshot, DateRange, OverdueBucket, PaymentsInRange,
    QuickFilter, RecordFilter,
};
use billsync_record::{decode_record_at, BillingRecord, RawRecord};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Which rows a report covers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    /// Dashboard tab
    pub quick: QuickFilter,
    /// Advanced criteria
    pub records: RecordFilter,
    /// Summarize paid records created in this range
    pub payments: Option<DateRange>,
}

impl ReportFilter {
    /// With dashboard tab
    #[inline]
    #[must_use]
    pub fn with_quick(mut self, quick: QuickFilter) -> Self {
        self.quick = quick;
        self
    }

    /// With advanced criteria
    #[inline]
    #[must_use]
    pub fn with_records(mut self, records: RecordFilter) -> Self {
        self.records = records;
        self
    }

    /// With payments summary over `range`
    #[inline]
    #[must_use]
    pub fn with_payments(mut self, range: DateRange) -> Self {
        self.payments = Some(range);
        self
    }

    fn matches(&self, record: &BillingRecord) -> bool {
        self.quick.matches(record) && self.records.matches(record)
    }
}

/// Aggregate report
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Rows in the input
    pub rows: usize,
    /// Rows that failed to decode
    pub skipped: usize,
    /// Decoded rows that passed the filter
    pub matched: usize,
    /// Aggregates over the matched rows
    pub aggregates: AggregateSnapshot,
    /// Payments summary, if a range was requested
    pub payments: Option<PaymentsInRange>,
}

/// Read a JSON array of raw rows
///
/// # Errors
/// Unreadable file or anything but an array of objects
pub fn load_rows(path: &Path) -> Result<Vec<RawRecord>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {} as an array of rows", path.display()))
}

/// Decode `rows`, keep those `filter` accepts and aggregate them as of `now`
#[must_use]
pub fn build_report(rows: &[RawRecord], now: DateTime<FixedOffset>, filter: &ReportFilter) -> Report {
    let decode_at = now.with_timezone(&Utc);
    let records: Vec<BillingRecord> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| match decode_record_at(row, decode_at) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(row = index, error = %e, "skipping undecodable row");
                None
            }
        })
        .collect();
    let skipped = rows.len() - records.len();
    let records: Vec<BillingRecord> = records.into_iter().filter(|r| filter.matches(r)).collect();

    Report {
        rows: rows.len(),
        skipped,
        matched: records.len(),
        aggregates: compute_aggregates(&records, &now),
        payments: filter.payments.map(|range| payments_in_range(&records, &range)),
    }
}

impl Report {
    /// Render as pretty JSON
    ///
    /// # Errors
    /// Serialization failure
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing report")
    }

    /// Render as text
    #[must_use]
    pub fn generate_text(&self) -> String {
        let a = &self.aggregates;
        let t = &a.totals;
        let mut out = String::new();

        let _ = writeln!(out, "=== billsync report ===");
        let _ = writeln!(out, "As of: {}", a.as_of.to_rfc3339());
        let _ = writeln!(out, "Rows: {} ({} skipped, {} matched)", self.rows, self.skipped, self.matched);
        let _ = writeln!(out);
        let _ = writeln!(out, "Customers:      {}", t.total_customers);
        let _ = writeln!(out, "Paid:           {} ({})", t.paid_count, t.paid_amount);
        let _ = writeln!(out, "Pending:        {} ({})", t.pending_count, t.pending_amount);
        let _ = writeln!(out, "Grand total:    {}", t.grand_total);
        let _ = writeln!(out);

        if let Some(current) = a.monthly.last() {
            let _ = writeln!(out, "This month ({}):", current.month);
            let _ = writeln!(
                out,
                "  paid {} (cash {}, transfer {}), pending {}",
                current.paid_count, current.cash_paid_count, current.transfer_paid_count, current.pending_count
            );
            let _ = writeln!(
                out,
                "  vs last month: paid {:+.1}%, pending {:+.1}%, paid amount {:+.1}%",
                a.trends.paid_count, a.trends.pending_count, a.trends.paid_amount
            );
            let _ = writeln!(out);
        }

        let _ = writeln!(
            out,
            "Overdue: {} ({})",
            a.overdue.total_count, a.overdue.total_amount
        );
        for bucket in OverdueBucket::ALL {
            let summary = a.overdue.bucket(bucket);
            let _ = writeln!(out, "  {:>10}: {} ({})", bucket.label(), summary.count, summary.amount);
        }
        for entry in a.overdue.entries.iter().take(10) {
            let _ = writeln!(
                out,
                "  - {} {} ({} days late, {})",
                entry.id,
                entry.name,
                entry.days_late,
                entry.amount
            );
        }

        if let Some(payments) = &self.payments {
            let _ = writeln!(out);
            let _ = writeln!(out, "Payments in range: {} ({})", payments.count, payments.total_amount);
        }
        out
    }
}
