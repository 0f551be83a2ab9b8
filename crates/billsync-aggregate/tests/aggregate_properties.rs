//! Property and scenario tests for the aggregation engine

use billsync_aggregate::{compute_aggregates, OverdueBucket};
use billsync_record::{BillingRecord, PaymentMethod, PaymentStatus};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn record_strategy() -> impl Strategy<Value = BillingRecord> {
    (
        "[a-z]{1,6}",
        0u64..1_000_000,
        prop_oneof![Just(None), Just(Some(PaymentMethod::Cash)), Just(Some(PaymentMethod::Transfer))],
        any::<bool>(),
        -400i64..60,
        -120i64..120,
    )
        .prop_map(|(id, amount, method, paid, created_offset, due_offset)| {
            let mut record = BillingRecord::new(id.as_str(), id.as_str(), amount, now())
                .with_created_at(now() + Duration::days(created_offset))
                .with_due_date(now() + Duration::days(due_offset));
            if paid {
                record.status = PaymentStatus::Paid;
            }
            record.payment_method = method;
            record
        })
}

#[test]
fn cash_and_transfer_same_month() {
    let records = vec![
        BillingRecord::new("a", "Budi", 100_000, now()).paid_by(PaymentMethod::Cash),
        BillingRecord::new("b", "Siti", 200_000, now()).paid_by(PaymentMethod::Transfer),
    ];
    let snapshot = compute_aggregates(&records, &now());
    let month = snapshot.current_month().unwrap();

    assert_eq!(month.cash_paid_count, 1);
    assert_eq!(month.transfer_paid_count, 1);
    assert_eq!(month.paid_amount, 300_000);
    assert_eq!(snapshot.totals.paid_amount, 300_000);
}

#[test]
fn overdue_boundaries() {
    let cases = [
        (Duration::zero(), None),
        (Duration::days(1), Some(OverdueBucket::UpToWeek)),
        (Duration::days(7), Some(OverdueBucket::UpToWeek)),
        (Duration::days(8), Some(OverdueBucket::UpToMonth)),
        (Duration::days(60), Some(OverdueBucket::UpToTwoMonths)),
        (Duration::days(61), Some(OverdueBucket::OverTwoMonths)),
    ];

    for (late, expected) in cases {
        let record = BillingRecord::new("a", "Budi", 1, now()).with_due_date(now() - late);
        let snapshot = compute_aggregates(&[record], &now());
        let actual = snapshot.overdue.entries.first().map(|e| e.bucket);
        assert_eq!(actual, expected, "late by {late}");
    }
}

#[test]
fn trend_edge_cases() {
    assert_eq!(billsync_aggregate::trend_percentage(0, 0), 0.0);
    assert_eq!(billsync_aggregate::trend_percentage(5, 0), 100.0);
}

#[test]
fn snapshot_serializes() {
    let records = vec![BillingRecord::new("a", "Budi", 150_000, now())];
    let json = serde_json::to_value(compute_aggregates(&records, &now())).unwrap();

    assert_eq!(json["totals"]["pending_amount"], 150_000);
    assert_eq!(json["monthly"].as_array().unwrap().len(), 12);
    assert_eq!(json["overdue"]["buckets"][0]["bucket"], "1-7");
}

proptest! {
    #[test]
    fn totals_are_consistent(records in proptest::collection::vec(record_strategy(), 0..40)) {
        let snapshot = compute_aggregates(&records, &now());
        let totals = snapshot.totals;

        prop_assert_eq!(totals.total_customers, records.len());
        prop_assert_eq!(totals.paid_count + totals.pending_count, totals.total_customers);
        prop_assert_eq!(totals.paid_amount + totals.pending_amount, totals.grand_total);
    }

    #[test]
    fn monthly_never_exceeds_totals(records in proptest::collection::vec(record_strategy(), 0..40)) {
        let snapshot = compute_aggregates(&records, &now());

        let in_series: usize = snapshot.monthly.iter().map(|m| m.total_count).sum();
        prop_assert!(in_series <= snapshot.totals.total_customers);
        for month in &snapshot.monthly {
            prop_assert_eq!(month.paid_count + month.pending_count, month.total_count);
            prop_assert_eq!(month.cash_paid_count + month.transfer_paid_count, month.paid_count);
        }
    }

    #[test]
    fn overdue_buckets_partition_the_list(records in proptest::collection::vec(record_strategy(), 0..40)) {
        let overdue = compute_aggregates(&records, &now()).overdue;

        let bucket_count: usize = overdue.buckets.iter().map(|b| b.count).sum();
        let bucket_amount: u64 = overdue.buckets.iter().map(|b| b.amount).sum();
        prop_assert_eq!(bucket_count, overdue.total_count);
        prop_assert_eq!(bucket_amount, overdue.total_amount);
        prop_assert_eq!(overdue.entries.len(), overdue.total_count);
        prop_assert!(overdue.entries.windows(2).all(|w| w[0].days_late >= w[1].days_late));
        for entry in &overdue.entries {
            prop_assert_eq!(entry.bucket, OverdueBucket::for_days_late(entry.days_late));
        }
    }
}
