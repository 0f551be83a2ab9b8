//! Application configuration
//!
//! Loaded from TOML. Every table is optional:
//!
//! ```toml
//! [[partitions]]
//! name = "customer_bills"
//! allowed_roles = ["admin"]
//!
//! [replica]
//! queue_capacity = 256
//! resync_on_subscribe = true
//!
//! [replica.backoff]
//! base_ms = 500
//! max_attempts = 8
//!
//! [aggregation]
//! utc_offset_minutes = 420
//! ```

use anyhow::{bail, Context, Result};
use billsync_partition::{PartitionCatalog, PartitionDescriptor, PartitionName};
use billsync_replica::ReplicaConfig;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Partitions shipped with the binary, in selection order
pub const DEFAULT_PARTITIONS: [&str; 16] = [
    "customer_bills",
    "tagihan_adede",
    "tagihan_basit",
    "tagihan_bodong",
    "tagihan_datuk",
    "tagihan_juig_karang",
    "tagihan_juig_leuwisari",
    "tagihan_juig_simpang",
    "tagihan_jumbo",
    "tagihan_leuwilisung",
    "tagihan_novi_cisela",
    "tagihan_rompang",
    "tagihan_yeyen",
    "tagihan_yono",
    "tagihan_nia",
    "tagihan_rompang_sarakan",
];

/// Default catalog; every entry open to every role
#[must_use]
pub fn default_partitions() -> Vec<PartitionDescriptor> {
    DEFAULT_PARTITIONS
        .iter()
        .filter_map(|name| PartitionName::new(*name).ok())
        .map(PartitionDescriptor::new)
        .collect()
}

/// Aggregation settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Local offset from UTC used for calendar months
    pub utc_offset_minutes: i32,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Partition catalog, in selection order
    pub partitions: Vec<PartitionDescriptor>,
    /// Replica engine settings
    pub replica: ReplicaConfig,
    /// Aggregation settings
    pub aggregation: AggregationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            replica: ReplicaConfig::default(),
            aggregation: AggregationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read and validate a TOML file
    ///
    /// # Errors
    /// Unreadable file, malformed TOML or failed validation
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("loading config {}", path.display()))
    }

    /// Load from `path` if given, defaults otherwise
    ///
    /// # Errors
    /// See [`Self::load`]
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Malformed TOML or failed validation
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("parsing TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// Empty or duplicated catalog entries, out-of-range replica settings,
    /// or an out-of-range offset
    pub fn validate(&self) -> Result<()> {
        if self.partitions.is_empty() {
            bail!("partition catalog is empty");
        }
        let mut seen = HashSet::new();
        for descriptor in &self.partitions {
            if !seen.insert(&descriptor.name) {
                bail!("partition '{}' listed twice", descriptor.name);
            }
            if descriptor.allowed_roles.is_empty() {
                bail!("partition '{}' is open to no role", descriptor.name);
            }
        }
        self.replica.validate().context("invalid [replica] table")?;
        self.offset()?;
        Ok(())
    }

    /// With partition catalog
    #[must_use]
    pub fn with_partitions(mut self, partitions: Vec<PartitionDescriptor>) -> Self {
        self.partitions = partitions;
        self
    }

    /// With replica settings
    #[must_use]
    pub fn with_replica(mut self, replica: ReplicaConfig) -> Self {
        self.replica = replica;
        self
    }

    /// With local offset
    #[must_use]
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.aggregation.utc_offset_minutes = minutes;
        self
    }

    /// Catalog built from `partitions`
    #[must_use]
    pub fn catalog(&self) -> PartitionCatalog {
        self.partitions.iter().cloned().collect()
    }

    /// Local offset for aggregation
    ///
    /// # Errors
    /// Offsets beyond ±24 hours
    pub fn offset(&self) -> Result<FixedOffset> {
        let minutes = self.aggregation.utc_offset_minutes;
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("utc_offset_minutes {minutes} out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billsync_partition::Role;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn default_catalog_has_every_partition() {
        let config = AppConfig::default();
        assert_eq!(config.partitions.len(), DEFAULT_PARTITIONS.len());
        let catalog = config.catalog();
        assert_eq!(
            catalog.first_open_to(Role::Admin).map(PartitionName::as_str),
            Some("customer_bills")
        );
        assert!(catalog.is_open_to(&PartitionName::new("tagihan_nia").unwrap(), Role::Employee));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[partitions]]
name = "customer_bills"
allowed_roles = ["admin"]

[[partitions]]
name = "tagihan_yono"

[replica]
queue_capacity = 64
resync_interval_secs = 30

[replica.backoff]
max_attempts = 3

[aggregation]
utc_offset_minutes = 420
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.partitions.len(), 2);
        assert!(!config.partitions[0].allows(Role::Employee));
        assert!(config.partitions[1].allows(Role::Employee));
        assert_eq!(config.replica.queue_capacity, 64);
        assert_eq!(config.replica.backoff.max_attempts, 3);
        assert_eq!(config.replica.backoff.base_ms, 500);
        assert!(config.replica.resync_on_subscribe);
        assert_eq!(config.offset().unwrap(), FixedOffset::east_opt(7 * 3600).unwrap());
    }

    #[test]
    fn empty_file_is_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(AppConfig::load(file.path()).unwrap(), AppConfig::default());
    }

    #[test]
    fn rejects_duplicates_and_bad_offsets() {
        let duplicated = r#"
[[partitions]]
name = "tagihan_yono"
[[partitions]]
name = "tagihan_yono"
"#;
        let err = AppConfig::from_toml_str(duplicated).unwrap_err();
        assert!(err.to_string().contains("listed twice"));

        let offset = "[aggregation]\nutc_offset_minutes = 100000\n";
        assert!(AppConfig::from_toml_str(offset).is_err());

        let bad_name = "[[partitions]]\nname = \"Not Valid\"\n";
        assert!(AppConfig::from_toml_str(bad_name).is_err());
    }

    #[test]
    fn rejects_out_of_range_replica_settings() {
        let far_due = "[replica]\ndefault_due_days = 1000000000\n";
        let err = AppConfig::from_toml_str(far_due).unwrap_err();
        assert!(format!("{err:#}").contains("default_due_days"));

        let nan_jitter = "[replica.backoff]\njitter = nan\n";
        let err = AppConfig::from_toml_str(nan_jitter).unwrap_err();
        assert!(format!("{err:#}").contains("backoff.jitter"));

        let inf_multiplier = "[replica.backoff]\nmultiplier = inf\n";
        assert!(AppConfig::from_toml_str(inf_multiplier).is_err());
    }

    #[test]
    fn missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }
}
