//! billsync command line
//!
//! Configuration loading, tracing setup and the three subcommands of the
//! `billsync` binary: offline aggregate reports, the replica simulator and
//! partition catalog inspection.

#![warn(unreachable_pub)]

pub mod config;
pub mod logging;
pub mod partitions;
pub mod report;
pub mod simulator;

pub use config::{AggregationConfig, AppConfig, DEFAULT_PARTITIONS};
pub use report::{build_report, load_rows, Report, ReportFilter};
pub use simulator::{run_simulator, SimulatorConfig, SimulatorReport, SimulatorStats, Violation};
