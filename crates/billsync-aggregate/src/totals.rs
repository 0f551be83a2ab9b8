//! Status totals

use billsync_record::BillingRecord;
use serde::Serialize;

/// Counts and sums by payment status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Number of records
    pub total_customers: usize,
    /// Paid records
    pub paid_count: usize,
    /// Pending records
    pub pending_count: usize,
    /// Sum of paid amounts
    pub paid_amount: u64,
    /// Sum of pending amounts
    pub pending_amount: u64,
    /// Sum of all amounts
    pub grand_total: u64,
}

impl Totals {
    /// Accumulate one record
    pub fn add(&mut self, record: &BillingRecord) {
        self.total_customers += 1;
        self.grand_total = self.grand_total.saturating_add(record.amount);
        if record.is_paid() {
            self.paid_count += 1;
            self.paid_amount = self.paid_amount.saturating_add(record.amount);
        } else {
            self.pending_count += 1;
            self.pending_amount = self.pending_amount.saturating_add(record.amount);
        }
    }
}

/// Compute totals over `records`
#[must_use]
pub fn compute_totals<'a>(records: impl IntoIterator<Item = &'a BillingRecord>) -> Totals {
    records.into_iter().fold(Totals::default(), |mut totals, record| {
        totals.add(record);
        totals
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use billsync_record::PaymentMethod;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_by_status() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let records = vec![
            BillingRecord::new("a", "Budi", 150_000, now),
            BillingRecord::new("b", "Siti", 100_000, now).paid_by(PaymentMethod::Cash),
            BillingRecord::new("c", "Andi", 200_000, now).paid_by(PaymentMethod::Transfer),
        ];

        assert_eq!(
            compute_totals(&records),
            Totals {
                total_customers: 3,
                paid_count: 2,
                pending_count: 1,
                paid_amount: 300_000,
                pending_amount: 150_000,
                grand_total: 450_000,
            }
        );
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(compute_totals(&Vec::<BillingRecord>::new()), Totals::default());
    }
}
