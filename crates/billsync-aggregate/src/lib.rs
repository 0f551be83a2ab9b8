//! billsync Aggregate
//!
//! Pure functions from replica contents to derived statistics. Nothing here
//! holds state or touches the clock; callers pass `now` explicitly, and its
//! time zone decides calendar months.
//!
//! # Modules
//!
//! - [`totals`]: counts and sums by status
//! - [`monthly`]: trailing twelve-month series
//! - [`overdue`]: lateness buckets and the overdue list
//! - [`trend`]: month-over-month percentages
//! - [`filter`]: list-view filters and payments in a date range
//! - [`snapshot`]: everything at once

#![warn(unreachable_pub)]

pub mod filter;
pub mod monthly;
pub mod overdue;
pub mod snapshot;
pub mod totals;
pub mod trend;

pub use filter::{payments_in_range, DateRange, PaymentsInRange, QuickFilter, RecordFilter};
pub use monthly::{monthly_series, MonthKey, MonthlyEntry, SERIES_MONTHS};
pub use overdue::{days_late, overdue_breakdown, BucketSummary, OverdueBreakdown, OverdueBucket, OverdueEntry};
pub use snapshot::{compute_aggregates, AggregateSnapshot};
pub use totals::{compute_totals, Totals};
pub use trend::{trend_percentage, TrendSummary};
