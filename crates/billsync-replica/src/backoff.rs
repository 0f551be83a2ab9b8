//! Reconnect backoff

use crate::config::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with jitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry, in milliseconds
    pub base_ms: u64,
    /// Upper bound on any delay, in milliseconds
    pub max_ms: u64,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Consecutive failures before giving up until a manual retry
    pub max_attempts: u32,
    /// Relative jitter in `[0, 1]`; 0.2 spreads delays by ±20%
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: 500,
            max_ms: 30_000,
            multiplier: 2.0,
            max_attempts: 8,
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// With base delay
    #[inline]
    #[must_use]
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base_ms = duration_ms(base);
        self
    }

    /// With maximum delay
    #[inline]
    #[must_use]
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max_ms = duration_ms(max);
        self
    }

    /// With attempt limit
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// With jitter ratio
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Check if `failures` consecutive failures exhaust the policy
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based), without jitter
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw = self.base_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = raw.min(self.max_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay before retry number `attempt`, with jitter from the thread RNG
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::rng())
    }

    /// Delay before retry number `attempt`, with jitter from `rng`
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let factor = rng.random_range((1.0 - jitter)..=(1.0 + jitter));
        let jittered = (base.as_millis() as f64 * factor).min(self.max_ms as f64);
        Duration::from_millis(jittered as u64)
    }
}

impl BackoffPolicy {
    /// Check field ranges
    ///
    /// # Errors
    /// `ConfigError::OutOfRange` for a non-finite or out-of-range `jitter`,
    /// or a `multiplier` that is not a finite number of at least 1
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.jitter.is_finite() && (0.0..=1.0).contains(&self.jitter)) {
            return Err(ConfigError::out_of_range("backoff.jitter", format!("{} is not within [0, 1]", self.jitter)));
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(ConfigError::out_of_range(
                "backoff.multiplier",
                format!("{} is not a finite factor of at least 1", self.multiplier),
            ));
        }
        Ok(())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
