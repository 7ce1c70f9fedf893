//! Poll interval and retry configuration.
//!
//! Defaults keep polling every 10 seconds and retry failed fetches forever at
//! that same interval. Set [`RetryPolicy::max_consecutive_failures`] to give
//! up, or a `backoff_factor` above 1.0 to slow down against a failing backend.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default ceiling on the backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// How the session reacts to consecutive fetch failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Give up after this many failures in a row. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
    /// Multiplier applied to the interval per consecutive failure.
    pub backoff_factor: f64,
    /// Upper bound on any retry delay.
    #[serde(rename = "max_delay_secs", with = "duration_secs")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: None,
            backoff_factor: 1.0,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Whether another fetch is allowed after `failures` consecutive failures.
    pub fn allows_retry(&self, failures: u32) -> bool {
        match self.max_consecutive_failures {
            Some(max) => failures < max,
            None => true,
        }
    }

    /// Delay before the next fetch after the `failures`-th consecutive failure.
    ///
    /// `interval * factor^(failures - 1)`, capped at `max_delay`.
    pub fn delay_after(&self, interval: Duration, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = interval.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay.max(interval);
        }
        Duration::from_secs_f64(scaled)
    }
}

/// Configuration of a poll session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between polls while checks are incomplete.
    #[serde(rename = "interval_secs", with = "duration_secs")]
    pub interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

impl PollConfig {
    /// Default config with a custom interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: PollConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would spin or never poll.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                field: "retry.backoff_factor",
                reason: format!("must be a finite value >= 1.0, got {}", self.retry.backoff_factor),
            });
        }
        if self.retry.max_delay < self.interval {
            return Err(ConfigError::Invalid {
                field: "retry.max_delay",
                reason: format!(
                    "{:?} is shorter than the poll interval {:?}",
                    self.retry.max_delay, self.interval
                ),
            });
        }
        if self.retry.max_consecutive_failures == Some(0) {
            return Err(ConfigError::Invalid {
                field: "retry.max_consecutive_failures",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retries_forever_at_fixed_interval() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert!(config.retry.allows_retry(u32::MAX - 1));
        assert_eq!(config.retry.delay_after(config.interval, 1), config.interval);
        assert_eq!(config.retry.delay_after(config.interval, 50), config.interval);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let retry = RetryPolicy {
            max_consecutive_failures: None,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        };
        let interval = Duration::from_secs(10);
        assert_eq!(retry.delay_after(interval, 1), Duration::from_secs(10));
        assert_eq!(retry.delay_after(interval, 2), Duration::from_secs(20));
        assert_eq!(retry.delay_after(interval, 3), Duration::from_secs(40));
        assert_eq!(retry.delay_after(interval, 4), Duration::from_secs(60));
        assert_eq!(retry.delay_after(interval, 400), Duration::from_secs(60));
    }

    #[test]
    fn test_max_failures_limits_retries() {
        let retry = RetryPolicy {
            max_consecutive_failures: Some(3),
            ..RetryPolicy::default()
        };
        assert!(retry.allows_retry(1));
        assert!(retry.allows_retry(2));
        assert!(!retry.allows_retry(3));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PollConfig::with_interval(Duration::ZERO).validate().is_err());

        let mut config = PollConfig::default();
        config.retry.backoff_factor = 0.5;
        assert!(config.validate().is_err());

        let mut config = PollConfig::default();
        config.retry.max_delay = Duration::from_secs(1);
        assert!(config.validate().is_err());

        let mut config = PollConfig::default();
        config.retry.max_consecutive_failures = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_str_reads_seconds() {
        let config = PollConfig::from_toml_str(
            r#"
            interval_secs = 5

            [retry]
            max_consecutive_failures = 4
            backoff_factor = 1.5
            max_delay_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.retry.max_consecutive_failures, Some(4));
        assert_eq!(config.retry.backoff_factor, 1.5);
        assert_eq!(config.retry.max_delay, Duration::from_secs(120));
    }

    #[test]
    fn test_from_toml_str_fills_defaults() {
        let config = PollConfig::from_toml_str("").unwrap();
        assert_eq!(config, PollConfig::default());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkwatch.toml");
        std::fs::write(&path, "interval_secs = 2.5\n").unwrap();
        let config = PollConfig::load(&path).unwrap();
        assert_eq!(config.interval, Duration::from_millis(2500));
    }
}
