//! Replica simulator
//!
//! Drives a [`ReplicaEngine`] over a [`MemoryStore`] with seeded random
//! writes, foreign-partition noise, duplicate deliveries, severed feeds and
//! partition switches. At every switch and at the end it checks:
//! - convergence: the replica equals a fresh snapshot of the active partition
//! - isolation: the replica holds no row written to another partition
//!
//! Every row name is prefixed with the partition it was written to, which is
//! what the isolation check keys on.

use crate::config::default_partitions;
use billsync_partition::{PartitionCatalog, PartitionName, Principal, Session};
use billsync_record::{decode_record, encode_new, BillingRecord, NewRecord, PaymentMethod, RecordId, RecordPatch};
use billsync_replica::{BackoffPolicy, MemoryStore, RemoteStore, ReplicaConfig, ReplicaEngine};
use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Operations to run
    pub operations: u64,
    /// Catalog partitions to spread work over
    pub partitions: usize,
    /// Rows seeded into every partition before the run
    pub seed_rows: usize,
    /// How long a convergence check may wait
    pub settle_timeout: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            operations: 500,
            partitions: 4,
            seed_rows: 5,
            settle_timeout: Duration::from_secs(5),
        }
    }
}

/// Operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedOperation {
    /// Create a record through the gateway
    Create,
    /// Mark a record paid through the gateway
    MarkPaid,
    /// Delete a record through the gateway
    Delete,
    /// Write straight into a partition that is not active
    ForeignWrite,
    /// Flip duplicate delivery on or off
    ToggleDuplicates,
    /// End the active partition's feed
    SeverFeed,
    /// Select another partition
    SwitchPartition,
}

impl SimulatedOperation {
    fn pick(rng: &mut StdRng) -> Self {
        match rng.random_range(0..100u32) {
            0..=29 => Self::Create,
            30..=49 => Self::MarkPaid,
            50..=64 => Self::Delete,
            65..=79 => Self::ForeignWrite,
            80..=84 => Self::ToggleDuplicates,
            85..=91 => Self::SeverFeed,
            _ => Self::SwitchPartition,
        }
    }
}

/// A violation detected during simulation
#[derive(Debug, Clone)]
pub enum Violation {
    /// Replica did not converge to the store
    Divergence {
        partition: PartitionName,
        missing: Vec<RecordId>,
        unexpected: Vec<RecordId>,
        stale: Vec<RecordId>,
    },
    /// Replica holds a row written to another partition
    Leak {
        partition: PartitionName,
        record: RecordId,
        name: String,
    },
    /// Engine call failed where it must not
    Engine {
        operation: String,
        error: String,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Divergence {
                partition,
                missing,
                unexpected,
                stale,
            } => write!(
                f,
                "divergence in {partition}: {} missing, {} unexpected, {} stale",
                missing.len(),
                unexpected.len(),
                stale.len()
            ),
            Self::Leak {
                partition,
                record,
                name,
            } => write!(f, "leak into {partition}: {record} ({name})"),
            Self::Engine { operation, error } => write!(f, "{operation} failed: {error}"),
        }
    }
}

/// Statistics for simulation
#[derive(Debug, Clone, Default)]
pub struct SimulatorStats {
    pub operations: u64,
    pub creates: u64,
    pub payments: u64,
    pub deletes: u64,
    pub foreign_writes: u64,
    pub duplicate_toggles: u64,
    pub severed_feeds: u64,
    pub switches: u64,
    pub skipped: u64,
    pub convergence_checks: u64,
}

/// Final report from simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
    pub final_partition: Option<PartitionName>,
    pub final_records: usize,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        let s = &self.stats;

        let _ = writeln!(report, "=== billsync simulator report ===\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Partitions: {}", self.config.partitions);
        let _ = writeln!(report, "Operations: {}", s.operations);
        let _ = writeln!(report, "  Creates: {}", s.creates);
        let _ = writeln!(report, "  Payments: {}", s.payments);
        let _ = writeln!(report, "  Deletes: {}", s.deletes);
        let _ = writeln!(report, "  Foreign Writes: {}", s.foreign_writes);
        let _ = writeln!(report, "  Duplicate Toggles: {}", s.duplicate_toggles);
        let _ = writeln!(report, "  Severed Feeds: {}", s.severed_feeds);
        let _ = writeln!(report, "  Partition Switches: {}", s.switches);
        let _ = writeln!(report, "  Skipped: {}", s.skipped);
        let _ = writeln!(report, "Convergence Checks: {}", s.convergence_checks);
        let final_partition = self
            .final_partition
            .as_ref()
            .map_or_else(|| "-".to_owned(), ToString::to_string);
        let _ = writeln!(report, "Final Partition: {final_partition} ({} records)", self.final_records);
        let _ = writeln!(report);

        if self.violations.is_empty() {
            let _ = writeln!(report, "Status: PASSED");
        } else {
            let _ = writeln!(report, "Violations: {}", self.violations.len());
            for violation in &self.violations {
                let _ = writeln!(report, "  - {violation}");
            }
            let _ = writeln!(report, "Status: FAILED");
        }
        report
    }
}

struct Simulation {
    config: SimulatorConfig,
    rng: StdRng,
    store: Arc<MemoryStore>,
    engine: ReplicaEngine,
    partitions: Vec<PartitionName>,
    duplicates: bool,
    counter: u64,
    stats: SimulatorStats,
    violations: Vec<Violation>,
}

/// Run a full simulation
pub async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let descriptors: Vec<_> = default_partitions()
        .into_iter()
        .take(config.partitions.max(1))
        .collect();
    let partitions: Vec<PartitionName> = descriptors.iter().map(|d| d.name.clone()).collect();
    let catalog: PartitionCatalog = descriptors.into_iter().collect();

    let store = Arc::new(MemoryStore::new());
    let replica_config = ReplicaConfig::default().with_backoff(
        BackoffPolicy::default()
            .with_base(Duration::from_millis(5))
            .with_max(Duration::from_millis(50)),
    );
    let engine = ReplicaEngine::builder(
        store.clone(),
        Arc::new(catalog),
        Arc::new(Session::new(Principal::admin("simulator"))),
    )
    .with_config(replica_config)
    .build();

    let mut sim = Simulation {
        rng: StdRng::seed_from_u64(config.seed),
        config,
        store,
        engine,
        partitions,
        duplicates: false,
        counter: 0,
        stats: SimulatorStats::default(),
        violations: Vec::new(),
    };
    sim.run().await;
    sim.finish().await
}

impl Simulation {
    async fn run(&mut self) {
        self.seed_partitions();
        if let Err(e) = self.engine.activate().await {
            self.violations.push(Violation::Engine {
                operation: "activate".into(),
                error: e.to_string(),
            });
            return;
        }
        tracing::info!(seed = self.config.seed, operations = self.config.operations, "simulation started");

        for _ in 0..self.config.operations {
            let Some(active) = self.engine.partition() else {
                self.violations.push(Violation::Engine {
                    operation: "partition".into(),
                    error: "no active partition".into(),
                });
                return;
            };
            let operation = SimulatedOperation::pick(&mut self.rng);
            self.stats.operations += 1;
            self.apply(operation, &active).await;
        }
        self.check().await;
    }

    async fn apply(&mut self, operation: SimulatedOperation, active: &PartitionName) {
        tracing::debug!(?operation, partition = %active, "simulated operation");
        match operation {
            SimulatedOperation::Create => {
                let record = self.new_record(active);
                match self.engine.gateway().create(record).await {
                    Ok(_) => self.stats.creates += 1,
                    Err(e) => self.engine_error("create", &e),
                }
            }
            SimulatedOperation::MarkPaid => {
                let Some(id) = self.pick_id(active) else {
                    self.stats.skipped += 1;
                    return;
                };
                let method = if self.rng.random_bool(0.5) {
                    PaymentMethod::Cash
                } else {
                    PaymentMethod::Transfer
                };
                match self.engine.gateway().update(&id, RecordPatch::mark_paid(method)).await {
                    Ok(()) => self.stats.payments += 1,
                    Err(e) => self.engine_error("update", &e),
                }
            }
            SimulatedOperation::Delete => {
                let Some(id) = self.pick_id(active) else {
                    self.stats.skipped += 1;
                    return;
                };
                match self.engine.gateway().delete(&id).await {
                    Ok(()) => self.stats.deletes += 1,
                    Err(e) => self.engine_error("delete", &e),
                }
            }
            SimulatedOperation::ForeignWrite => {
                let others: Vec<PartitionName> = self.partitions.iter().filter(|p| *p != active).cloned().collect();
                if others.is_empty() {
                    self.stats.skipped += 1;
                    return;
                }
                let target = others[self.rng.random_range(0..others.len())].clone();
                let record = self.new_record(&target);
                let now = Utc::now();
                let row = encode_new(&RecordId::generate(), &record, now, now + ChronoDuration::days(30));
                match self.store.insert(&target, row).await {
                    Ok(()) => self.stats.foreign_writes += 1,
                    Err(e) => self.engine_error("foreign insert", &e),
                }
            }
            SimulatedOperation::ToggleDuplicates => {
                self.duplicates = !self.duplicates;
                self.store.duplicate_deliveries(self.duplicates);
                self.stats.duplicate_toggles += 1;
            }
            SimulatedOperation::SeverFeed => {
                self.store.sever_feeds(active);
                self.stats.severed_feeds += 1;
            }
            SimulatedOperation::SwitchPartition => {
                self.check().await;
                let target = self.partitions[self.rng.random_range(0..self.partitions.len())].clone();
                match self.engine.select_partition(target.as_str()).await {
                    Ok(_) => self.stats.switches += 1,
                    Err(e) => self.engine_error("select_partition", &e),
                }
            }
        }
    }

    fn seed_partitions(&mut self) {
        let now = Utc::now();
        for partition in self.partitions.clone() {
            let rows: Vec<_> = (0..self.config.seed_rows)
                .map(|_| {
                    let record = self.new_record(&partition);
                    encode_new(&RecordId::generate(), &record, now, now + ChronoDuration::days(30))
                })
                .collect();
            self.store.seed(&partition, rows);
        }
    }

    fn new_record(&mut self, partition: &PartitionName) -> NewRecord {
        self.counter += 1;
        let amount = self.rng.random_range(50..=500u64) * 1_000;
        NewRecord::new(format!("{partition}/customer-{}", self.counter), amount)
    }

    fn pick_id(&mut self, partition: &PartitionName) -> Option<RecordId> {
        let rows = self.store.rows(partition);
        if rows.is_empty() {
            return None;
        }
        rows[self.rng.random_range(0..rows.len())].id().ok()
    }

    fn engine_error(&mut self, operation: &str, error: &dyn std::error::Error) {
        self.violations.push(Violation::Engine {
            operation: operation.to_owned(),
            error: error.to_string(),
        });
    }

    /// Wait for convergence on the active partition, then check isolation
    async fn check(&mut self) {
        let Some(partition) = self.engine.partition() else {
            return;
        };
        self.stats.convergence_checks += 1;

        let mut versions = self.engine.watch_version();
        let deadline = tokio::time::Instant::now() + self.config.settle_timeout;
        let actual = loop {
            let expected = self.snapshot(&partition);
            let actual = sorted(self.engine.replica());
            if actual == expected {
                break actual;
            }
            let changed = tokio::time::timeout_at(deadline, versions.changed()).await;
            if !matches!(changed, Ok(Ok(()))) {
                tracing::warn!(partition = %partition, "replica did not converge");
                self.violations.push(divergence(partition.clone(), &expected, &actual));
                break actual;
            }
        };

        let prefix = format!("{partition}/");
        for record in actual.iter().filter(|r| !r.name.starts_with(&prefix)) {
            self.violations.push(Violation::Leak {
                partition: partition.clone(),
                record: record.id.clone(),
                name: record.name.clone(),
            });
        }
    }

    fn snapshot(&self, partition: &PartitionName) -> Vec<BillingRecord> {
        sorted(
            self.store
                .rows(partition)
                .iter()
                .filter_map(|row| decode_record(row).ok())
                .collect(),
        )
    }

    async fn finish(self) -> SimulatorReport {
        let final_partition = self.engine.partition();
        let final_records = self.engine.replica().len();
        self.engine.shutdown().await;
        tracing::info!(violations = self.violations.len(), "simulation finished");

        SimulatorReport {
            config: self.config,
            stats: self.stats,
            violations: self.violations,
            final_partition,
            final_records,
        }
    }
}

fn sorted(mut records: Vec<BillingRecord>) -> Vec<BillingRecord> {
    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

fn divergence(partition: PartitionName, expected: &[BillingRecord], actual: &[BillingRecord]) -> Violation {
    let find = |records: &[BillingRecord], id: &RecordId| records.iter().find(|r| &r.id == id).cloned();
    let missing = expected
        .iter()
        .filter(|r| find(actual, &r.id).is_none())
        .map(|r| r.id.clone())
        .collect();
    let unexpected = actual
        .iter()
        .filter(|r| find(expected, &r.id).is_none())
        .map(|r| r.id.clone())
        .collect();
    let stale = actual
        .iter()
        .filter(|r| find(expected, &r.id).is_some_and(|e| e != **r))
        .map(|r| r.id.clone())
        .collect();
    Violation::Divergence {
        partition,
        missing,
        unexpected,
        stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn small_run_passes() {
        let report = run_simulator(SimulatorConfig {
            seed: 7,
            operations: 120,
            partitions: 3,
            seed_rows: 3,
            settle_timeout: Duration::from_secs(5),
        })
        .await;

        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.operations, 120);
        assert!(report.stats.convergence_checks >= 1);
        assert!(report.generate_text().contains("Status: PASSED"));
    }

    #[tokio::test]
    async fn same_seed_same_operations() {
        let config = SimulatorConfig {
            operations: 60,
            partitions: 2,
            ..SimulatorConfig::default()
        };
        let a = run_simulator(config.clone()).await;
        let b = run_simulator(config).await;
        assert_eq!(a.stats.creates, b.stats.creates);
        assert_eq!(a.stats.switches, b.stats.switches);
        assert_eq!(a.stats.severed_feeds, b.stats.severed_feeds);
    }

    #[test]
    fn divergence_classifies_ids() {
        let now = Utc::now();
        let a = BillingRecord::new("a", "p/a", 1, now);
        let b = BillingRecord::new("b", "p/b", 1, now);
        let c = BillingRecord::new("c", "p/c", 1, now);
        let expected = vec![a.clone(), b.clone()];
        let actual = vec![BillingRecord { amount: 2, ..a }, c];

        let Violation::Divergence {
            missing,
            unexpected,
            stale,
            ..
        } = divergence(PartitionName::new("p").unwrap(), &expected, &actual)
        else {
            panic!("expected divergence");
        };
        assert_eq!(missing, vec![RecordId::new("b")]);
        assert_eq!(unexpected, vec![RecordId::new("c")]);
        assert_eq!(stale, vec![RecordId::new("a")]);
    }
}
