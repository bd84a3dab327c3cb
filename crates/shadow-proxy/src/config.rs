//! Migration configuration
//!
//! Loaded once at startup, typically from a TOML file:
//!
//! ```toml
//! [proxy]
//! shadow_pool_capacity = 64
//! shadow_read_timeout_ms = 2000
//! shadow_write_timeout_ms = 500
//!
//! [flags]
//! poll_interval_ms = 30000
//!
//! [monitor]
//! divergence_rate_threshold = 0.05
//! ```
//!
//! Durations are plain milliseconds. Omitted keys take their defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use shadow_flags::FlagManagerConfig;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Proxy behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Concurrent background shadow reads; more are dropped
    pub shadow_pool_capacity: usize,
    /// Bound on a background shadow read
    pub shadow_read_timeout_ms: u64,
    /// Bound on a synchronous shadow write
    pub shadow_write_timeout_ms: u64,
    /// Call the shadow backend even when the authoritative call failed
    pub shadow_on_authoritative_failure: bool,
    /// DIVERGED records forwarded to sinks per operation per minute
    pub max_divergence_records_per_minute: u64,
    /// Cap on each rendered value in diff summaries
    pub diff_value_max_len: usize,
}

impl ProxyConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With shadow pool capacity
    #[inline]
    #[must_use]
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.shadow_pool_capacity = capacity;
        self
    }

    /// With shadow read timeout
    #[inline]
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.shadow_read_timeout_ms = millis(timeout);
        self
    }

    /// With shadow write timeout
    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.shadow_write_timeout_ms = millis(timeout);
        self
    }

    /// Shadow even after authoritative failures
    #[inline]
    #[must_use]
    pub fn with_shadow_on_authoritative_failure(mut self, enabled: bool) -> Self {
        self.shadow_on_authoritative_failure = enabled;
        self
    }

    /// With divergence record cap
    #[inline]
    #[must_use]
    pub fn with_max_divergence_records_per_minute(mut self, max: u64) -> Self {
        self.max_divergence_records_per_minute = max;
        self
    }

    /// Shadow read timeout as a duration
    #[inline]
    #[must_use]
    pub fn shadow_read_timeout(&self) -> Duration {
        Duration::from_millis(self.shadow_read_timeout_ms)
    }

    /// Shadow write timeout as a duration
    #[inline]
    #[must_use]
    pub fn shadow_write_timeout(&self) -> Duration {
        Duration::from_millis(self.shadow_write_timeout_ms)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            shadow_pool_capacity: 64,
            shadow_read_timeout_ms: 2_000,
            shadow_write_timeout_ms: 500,
            shadow_on_authoritative_failure: false,
            max_divergence_records_per_minute: 100,
            diff_value_max_len: shadow_verify::diff::DEFAULT_MAX_VALUE_LEN,
        }
    }
}

/// Divergence monitor thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sliding window length
    pub window_ms: u64,
    /// Divergence rate above which an alert opens
    pub divergence_rate_threshold: f64,
    /// Comparisons required in the window before alerting
    pub min_samples: usize,
    /// How long resolved alerts stay queryable
    pub resolved_retention_ms: u64,
}

impl MonitorConfig {
    /// Window as a duration
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Resolved alert retention as a duration
    #[inline]
    #[must_use]
    pub fn resolved_retention(&self) -> Duration {
        Duration::from_millis(self.resolved_retention_ms)
    }

    /// With resolved alert retention
    #[inline]
    #[must_use]
    pub fn with_resolved_retention(mut self, retention: Duration) -> Self {
        self.resolved_retention_ms = millis(retention);
        self
    }

    /// With window length
    #[inline]
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window_ms = millis(window);
        self
    }

    /// With alert threshold
    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.divergence_rate_threshold = threshold;
        self
    }

    /// With minimum sample count
    #[inline]
    #[must_use]
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_ms: 300_000,
            divergence_rate_threshold: 0.05,
            min_samples: 20,
            resolved_retention_ms: 86_400_000,
        }
    }
}

/// Complete migration configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Proxy behavior
    pub proxy: ProxyConfig,
    /// Flag manager
    pub flags: FlagManagerConfig,
    /// Divergence monitor
    pub monitor: MonitorConfig,
}

impl MigrationConfig {
    /// Parse and validate TOML text
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed text, [`ConfigError::Invalid`]
    /// on out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.shadow_pool_capacity == 0 {
            return Err(ConfigError::invalid(
                "proxy.shadow_pool_capacity",
                "must be at least 1",
            ));
        }
        if self.proxy.shadow_pool_capacity > Semaphore::MAX_PERMITS {
            return Err(ConfigError::invalid(
                "proxy.shadow_pool_capacity",
                format!("must not exceed {}", Semaphore::MAX_PERMITS),
            ));
        }
        if self.proxy.shadow_read_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "proxy.shadow_read_timeout_ms",
                "must be positive",
            ));
        }
        if self.proxy.shadow_write_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "proxy.shadow_write_timeout_ms",
                "must be positive",
            ));
        }
        if self.proxy.diff_value_max_len == 0 {
            return Err(ConfigError::invalid("proxy.diff_value_max_len", "must be positive"));
        }
        if self.flags.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("flags.poll_interval_ms", "must be positive"));
        }
        if self.flags.max_staleness_ms < self.flags.poll_interval_ms {
            return Err(ConfigError::invalid(
                "flags.max_staleness_ms",
                format!(
                    "{} is shorter than the poll interval {}",
                    self.flags.max_staleness_ms, self.flags.poll_interval_ms
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.flags.full_mode_legacy_sample_rate) {
            return Err(ConfigError::invalid(
                "flags.full_mode_legacy_sample_rate",
                "must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.monitor.divergence_rate_threshold) {
            return Err(ConfigError::invalid(
                "monitor.divergence_rate_threshold",
                "must be within [0, 1]",
            ));
        }
        if self.monitor.window_ms == 0 {
            return Err(ConfigError::invalid("monitor.window_ms", "must be positive"));
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
