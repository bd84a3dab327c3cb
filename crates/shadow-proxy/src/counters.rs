//! Per-operation proxy counters
//!
//! Counters are atomics, incremented without locks on the request path.
//! Every increment is mirrored to the `metrics` facade so whatever exporter
//! the serving process installs sees the same numbers.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Calls through the proxy
    Calls,
    /// Calls served by both backends
    DualCalls,
    /// Comparisons with verdict MATCH
    Match,
    /// Comparisons with verdict TOLERATED
    Tolerated,
    /// Comparisons with verdict DIVERGED
    Divergence,
    /// Shadow failures and timeouts
    InfraError,
    /// Background shadow reads dropped by a saturated pool
    ShadowDropped,
    /// DIVERGED records withheld from sinks by the rate cap
    DivergenceSuppressed,
}

impl Counter {
    /// All counters
    pub const ALL: [Counter; 8] = [
        Counter::Calls,
        Counter::DualCalls,
        Counter::Match,
        Counter::Tolerated,
        Counter::Divergence,
        Counter::InfraError,
        Counter::ShadowDropped,
        Counter::DivergenceSuppressed,
    ];

    /// Exported metric name
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Calls => "calls_total",
            Self::DualCalls => "dual_calls_total",
            Self::Match => "match_total",
            Self::Tolerated => "tolerated_total",
            Self::Divergence => "divergence_total",
            Self::InfraError => "infra_error_total",
            Self::ShadowDropped => "shadow_dropped_total",
            Self::DivergenceSuppressed => "divergence_suppressed_total",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct OperationCounters {
    values: [AtomicU64; 8],
}

/// Point-in-time copy of one operation's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Calls through the proxy
    pub calls_total: u64,
    /// Dual calls
    pub dual_calls_total: u64,
    /// MATCH comparisons
    pub match_total: u64,
    /// TOLERATED comparisons
    pub tolerated_total: u64,
    /// DIVERGED comparisons
    pub divergence_total: u64,
    /// Shadow failures and timeouts
    pub infra_error_total: u64,
    /// Dropped background shadow reads
    pub shadow_dropped_total: u64,
    /// Suppressed DIVERGED records
    pub divergence_suppressed_total: u64,
}

impl CounterSnapshot {
    /// Value of one counter
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Calls => self.calls_total,
            Counter::DualCalls => self.dual_calls_total,
            Counter::Match => self.match_total,
            Counter::Tolerated => self.tolerated_total,
            Counter::Divergence => self.divergence_total,
            Counter::InfraError => self.infra_error_total,
            Counter::ShadowDropped => self.shadow_dropped_total,
            Counter::DivergenceSuppressed => self.divergence_suppressed_total,
        }
    }
}

/// Counters keyed by operation key (`"<entity>.<method>"`)
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    operations: DashMap<String, Arc<OperationCounters>>,
}

impl ProxyMetrics {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to `counter` for `operation`
    pub fn increment(&self, operation: &str, counter: Counter) {
        self.counters(operation).values[counter.index()].fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(counter.name(), "operation" => operation.to_string()).increment(1);
    }

    /// Current value of `counter` for `operation`
    #[must_use]
    pub fn get(&self, operation: &str, counter: Counter) -> u64 {
        self.operations
            .get(operation)
            .map_or(0, |c| c.values[counter.index()].load(Ordering::Relaxed))
    }

    /// Sum of `counter` across operations
    #[must_use]
    pub fn total(&self, counter: Counter) -> u64 {
        self.operations
            .iter()
            .map(|e| e.value().values[counter.index()].load(Ordering::Relaxed))
            .sum()
    }

    /// Copy of every counter for `operation`
    #[must_use]
    pub fn snapshot(&self, operation: &str) -> CounterSnapshot {
        let get = |c| self.get(operation, c);
        CounterSnapshot {
            calls_total: get(Counter::Calls),
            dual_calls_total: get(Counter::DualCalls),
            match_total: get(Counter::Match),
            tolerated_total: get(Counter::Tolerated),
            divergence_total: get(Counter::Divergence),
            infra_error_total: get(Counter::InfraError),
            shadow_dropped_total: get(Counter::ShadowDropped),
            divergence_suppressed_total: get(Counter::DivergenceSuppressed),
        }
    }

    /// Operation keys seen so far
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.operations.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn counters(&self, operation: &str) -> Arc<OperationCounters> {
        if let Some(existing) = self.operations.get(operation) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.operations
                .entry(operation.to_string())
                .or_default()
                .value(),
        )
    }
}
