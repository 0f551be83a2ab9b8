//! Replica engine configuration

use crate::backoff::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted gap between creation and due date
pub const MAX_DUE_DAYS: i64 = 36_500;

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Field outside its accepted range
    #[error("{field}: {reason}")]
    OutOfRange {
        /// Dotted field path
        field: &'static str,
        /// What is wrong with the value
        reason: String,
    },
}

impl ConfigError {
    /// Create out-of-range error
    #[must_use]
    pub fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}

/// Replica engine configuration
///
/// Deserialized from the `[replica]` table; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    /// Capacity of the applier command queue
    pub queue_capacity: usize,
    /// Reload a full snapshot after every subscribe acknowledgement
    pub resync_on_subscribe: bool,
    /// Periodic snapshot reload, in seconds
    pub resync_interval_secs: Option<u64>,
    /// Days between creation and due date for new records
    pub default_due_days: i64,
    /// Reconnect policy
    pub backoff: BackoffPolicy,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            resync_on_subscribe: true,
            resync_interval_secs: None,
            default_due_days: 30,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ReplicaConfig {
    /// With queue capacity
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// With resync-on-subscribe flag
    #[inline]
    #[must_use]
    pub fn with_resync_on_subscribe(mut self, enabled: bool) -> Self {
        self.resync_on_subscribe = enabled;
        self
    }

    /// With periodic resync
    #[inline]
    #[must_use]
    pub fn with_resync_interval(mut self, interval: Option<Duration>) -> Self {
        self.resync_interval_secs = interval.map(|d| d.as_secs().max(1));
        self
    }

    /// With default due days
    #[inline]
    #[must_use]
    pub fn with_default_due_days(mut self, days: i64) -> Self {
        self.default_due_days = days;
        self
    }

    /// With backoff policy
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Check field ranges
    ///
    /// # Errors
    /// `ConfigError::OutOfRange` for `default_due_days` outside
    /// `0..=MAX_DUE_DAYS` or an invalid backoff policy
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_DUE_DAYS).contains(&self.default_due_days) {
            return Err(ConfigError::out_of_range(
                "default_due_days",
                format!("{} is not within 0..={MAX_DUE_DAYS}", self.default_due_days),
            ));
        }
        self.backoff.validate()
    }

    /// Periodic resync interval, if enabled
    #[must_use]
    pub fn resync_interval(&self) -> Option<Duration> {
        self.resync_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Queue capacity, never zero
    #[must_use]
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReplicaConfig::default();
        assert_eq!(config.default_due_days, 30);
        assert!(config.resync_on_subscribe);
        assert_eq!(config.resync_interval(), None);
    }

    #[test]
    fn builder_chain() {
        let config = ReplicaConfig::default()
            .with_queue_capacity(0)
            .with_resync_interval(Some(Duration::from_secs(60)))
            .with_default_due_days(14);

        assert_eq!(config.effective_queue_capacity(), 1);
        assert_eq!(config.resync_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.default_due_days, 14);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert_eq!(ReplicaConfig::default().validate(), Ok(()));

        let far = ReplicaConfig::default().with_default_due_days(1_000_000_000);
        assert!(matches!(
            far.validate(),
            Err(ConfigError::OutOfRange { field: "default_due_days", .. })
        ));
        assert!(ReplicaConfig::default().with_default_due_days(-1).validate().is_err());

        let jittery = ReplicaConfig::default().with_backoff(BackoffPolicy::default().with_jitter(f64::NAN));
        assert!(matches!(
            jittery.validate(),
            Err(ConfigError::OutOfRange { field: "backoff.jitter", .. })
        ));
    }

    #[test]
    fn partial_deserialize() {
        let config: ReplicaConfig =
            serde_json::from_value(serde_json::json!({ "queue_capacity": 64, "backoff": { "max_attempts": 3 } }))
                .unwrap();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.backoff.max_attempts, 3);
        assert_eq!(config.backoff.base_ms, 500);
        assert_eq!(config.default_due_days, 30);
    }
}
