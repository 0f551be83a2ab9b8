//! Overdue breakdown
//!
//! A record is overdue when pending and `due_date < now`. Lateness is counted
//! in whole elapsed days, rounded down, so a record a few hours late has
//! `days_late == 0` and still lands in the first bucket.

use billsync_record::{BillingRecord, RecordId};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

/// Lateness category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum OverdueBucket {
    /// Up to 7 days
    #[serde(rename = "1-7")]
    UpToWeek,
    /// 8 to 30 days
    #[serde(rename = "8-30")]
    UpToMonth,
    /// 31 to 60 days
    #[serde(rename = "31-60")]
    UpToTwoMonths,
    /// More than 60 days
    #[serde(rename = ">60")]
    OverTwoMonths,
}

impl OverdueBucket {
    /// All buckets, least late first
    pub const ALL: [Self; 4] = [
        Self::UpToWeek,
        Self::UpToMonth,
        Self::UpToTwoMonths,
        Self::OverTwoMonths,
    ];

    /// Bucket for a lateness in whole days
    #[must_use]
    pub fn for_days_late(days_late: i64) -> Self {
        match days_late {
            ..=7 => Self::UpToWeek,
            8..=30 => Self::UpToMonth,
            31..=60 => Self::UpToTwoMonths,
            _ => Self::OverTwoMonths,
        }
    }

    /// Short label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::UpToWeek => "1-7 days",
            Self::UpToMonth => "8-30 days",
            Self::UpToTwoMonths => "31-60 days",
            Self::OverTwoMonths => "> 60 days",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OverdueBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Count and amount of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    /// Bucket
    pub bucket: OverdueBucket,
    /// Records in the bucket
    pub count: usize,
    /// Sum of their amounts
    pub amount: u64,
}

/// One overdue record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueEntry {
    /// Record id
    pub id: RecordId,
    /// Customer name
    pub name: String,
    /// Outstanding amount
    pub amount: u64,
    /// When payment was due
    pub due_date: DateTime<Utc>,
    /// Whole days past due
    pub days_late: i64,
    /// Bucket the record falls in
    pub bucket: OverdueBucket,
    /// Contact phone, for reminders
    pub phone_number: Option<String>,
}

/// Overdue breakdown of a replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueBreakdown {
    /// One summary per bucket, least late first
    pub buckets: Vec<BucketSummary>,
    /// Number of overdue records
    pub total_count: usize,
    /// Sum of overdue amounts
    pub total_amount: u64,
    /// Overdue records, most late first
    pub entries: Vec<OverdueEntry>,
}

impl OverdueBreakdown {
    /// Summary of one bucket
    #[must_use]
    pub fn bucket(&self, bucket: OverdueBucket) -> BucketSummary {
        self.buckets[bucket.index()]
    }
}

impl Default for OverdueBreakdown {
    fn default() -> Self {
        Self {
            buckets: OverdueBucket::ALL
                .iter()
                .map(|&bucket| BucketSummary {
                    bucket,
                    count: 0,
                    amount: 0,
                })
                .collect(),
            total_count: 0,
            total_amount: 0,
            entries: Vec::new(),
        }
    }
}

/// Whole days `record` is late at `now`, or `None` if not overdue
#[must_use]
pub fn days_late<Tz: TimeZone>(record: &BillingRecord, now: &DateTime<Tz>) -> Option<i64> {
    let now = now.with_timezone(&Utc);
    record
        .is_overdue_at(now)
        .then(|| (now - record.due_date).num_days())
}

/// Build the overdue breakdown
#[must_use]
pub fn overdue_breakdown<'a, Tz: TimeZone>(
    records: impl IntoIterator<Item = &'a BillingRecord>,
    now: &DateTime<Tz>,
) -> OverdueBreakdown {
    let mut breakdown = OverdueBreakdown::default();

    for record in records {
        let Some(days_late) = days_late(record, now) else {
            continue;
        };
        let bucket = OverdueBucket::for_days_late(days_late);
        let summary = &mut breakdown.buckets[bucket.index()];
        summary.count += 1;
        summary.amount = summary.amount.saturating_add(record.amount);
        breakdown.total_count += 1;
        breakdown.total_amount = breakdown.total_amount.saturating_add(record.amount);
        breakdown.entries.push(OverdueEntry {
            id: record.id.clone(),
            name: record.name.clone(),
            amount: record.amount,
            due_date: record.due_date,
            days_late,
            bucket,
            phone_number: record.phone_number.clone(),
        });
    }

    breakdown
        .entries
        .sort_by(|a, b| b.days_late.cmp(&a.days_late).then_with(|| a.id.cmp(&b.id)));
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use billsync_record::PaymentMethod;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn due_ago(id: &str, ago: Duration) -> BillingRecord {
        BillingRecord::new(id, id, 1000, now()).with_due_date(now() - ago)
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(OverdueBucket::for_days_late(0), OverdueBucket::UpToWeek);
        assert_eq!(OverdueBucket::for_days_late(1), OverdueBucket::UpToWeek);
        assert_eq!(OverdueBucket::for_days_late(7), OverdueBucket::UpToWeek);
        assert_eq!(OverdueBucket::for_days_late(8), OverdueBucket::UpToMonth);
        assert_eq!(OverdueBucket::for_days_late(30), OverdueBucket::UpToMonth);
        assert_eq!(OverdueBucket::for_days_late(31), OverdueBucket::UpToTwoMonths);
        assert_eq!(OverdueBucket::for_days_late(60), OverdueBucket::UpToTwoMonths);
        assert_eq!(OverdueBucket::for_days_late(61), OverdueBucket::OverTwoMonths);
    }

    #[test]
    fn due_now_is_not_overdue() {
        let record = due_ago("a", Duration::zero());
        assert_eq!(days_late(&record, &now()), None);
    }

    #[test]
    fn hours_late_lands_in_first_bucket() {
        let record = due_ago("a", Duration::hours(5));
        let breakdown = overdue_breakdown([&record], &now());
        assert_eq!(breakdown.entries[0].days_late, 0);
        assert_eq!(breakdown.bucket(OverdueBucket::UpToWeek).count, 1);
    }

    #[test]
    fn paid_records_never_overdue() {
        let record = due_ago("a", Duration::days(90)).paid_by(PaymentMethod::Cash);
        let breakdown = overdue_breakdown([&record], &now());
        assert_eq!(breakdown.total_count, 0);
        assert!(breakdown.entries.is_empty());
    }

    #[test]
    fn entries_sorted_most_late_first() {
        let records = vec![
            due_ago("a", Duration::days(3)),
            due_ago("b", Duration::days(75)),
            due_ago("c", Duration::days(40)),
        ];
        let breakdown = overdue_breakdown(&records, &now());

        let order: Vec<&str> = breakdown.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(breakdown.total_count, 3);
        assert_eq!(breakdown.total_amount, 3000);
        assert_eq!(breakdown.bucket(OverdueBucket::OverTwoMonths).amount, 1000);
    }
}
