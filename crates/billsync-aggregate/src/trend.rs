//! Month-over-month trends

use crate::monthly::MonthlyEntry;
use serde::Serialize;

/// Percentage change from `previous` to `current`, rounded to one decimal
///
/// With `previous == 0` the change is 100 if anything happened, otherwise 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trend_percentage(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
    (change * 10.0).round() / 10.0
}

/// Current month against the one before
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    /// Paid record count trend
    pub paid_count: f64,
    /// Pending record count trend
    pub pending_count: f64,
    /// Paid amount trend
    pub paid_amount: f64,
}

impl TrendSummary {
    /// Compare the last two entries of a series
    #[must_use]
    pub fn from_series(series: &[MonthlyEntry]) -> Self {
        let [.., previous, current] = series else {
            return Self::default();
        };
        Self {
            paid_count: trend_percentage(current.paid_count as u64, previous.paid_count as u64),
            pending_count: trend_percentage(current.pending_count as u64, previous.pending_count as u64),
            paid_amount: trend_percentage(current.paid_amount, previous.paid_amount),
        }
    }
}
