//! Telemetry for proxied calls
//!
//! [`Telemetry`] owns the counters and fans comparison records and shadow
//! failures out to every registered [`TelemetrySink`]. DIVERGED records are
//! rate capped per operation so a persistently diverging operation cannot
//! flood the sinks; the divergence counter still sees every one.

use crate::counters::{Counter, ProxyMetrics};
use crate::error::MigrationError;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use parking_lot::Mutex;
use shadow_contract::{Backend, OperationDescriptor};
use shadow_verify::{ComparisonRecord, Verdict};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

/// Length of one divergence cap window
const CAP_WINDOW: Duration = Duration::from_secs(60);

/// Shadow call that failed to produce a result
#[derive(Debug, Clone, PartialEq)]
pub struct InfraErrorEvent {
    /// Unique event id
    pub id: Ulid,
    /// The proxied call
    pub operation: OperationDescriptor,
    /// Backend that failed
    pub backend: Backend,
    /// Failure kind
    pub error: MigrationError,
    /// When the failure was observed
    pub occurred_at: DateTime<Utc>,
}

impl InfraErrorEvent {
    /// Create event stamped now
    #[must_use]
    pub fn new(operation: OperationDescriptor, backend: Backend, error: MigrationError) -> Self {
        Self {
            id: Ulid::new(),
            operation,
            backend,
            error,
            occurred_at: Utc::now(),
        }
    }
}

/// Destination for comparison records and shadow failures
pub trait TelemetrySink: Send + Sync + Debug {
    /// Receive a comparison record
    fn record_comparison(&self, record: &ComparisonRecord);

    /// Receive a shadow failure
    fn record_infra_error(&self, event: &InfraErrorEvent);

    /// Whether DIVERGED records over the per-operation cap are withheld
    ///
    /// Aggregating sinks return `false` so their rates stay exact.
    fn rate_limited(&self) -> bool {
        true
    }
}

/// Emits structured tracing events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record_comparison(&self, record: &ComparisonRecord) {
        let operation = record.operation_key();
        match record.verdict {
            Verdict::Diverged => tracing::warn!(
                record_id = %record.id,
                operation = %operation,
                authoritative = %record.authoritative,
                legacy_digest = %record.legacy_digest,
                new_digest = %record.new_digest,
                diff = %record.diff,
                "Backends diverged"
            ),
            Verdict::Tolerated => tracing::debug!(
                record_id = %record.id,
                operation = %operation,
                diff = %record.diff,
                "Backends differ in tolerated fields"
            ),
            Verdict::Match => tracing::trace!(
                record_id = %record.id,
                operation = %operation,
                "Backends match"
            ),
        }
    }

    fn record_infra_error(&self, event: &InfraErrorEvent) {
        tracing::warn!(
            event_id = %event.id,
            operation = %event.operation.operation_key(),
            backend = %event.backend,
            kind = event.error.kind(),
            error = %event.error,
            "Shadow call failed"
        );
    }
}

/// Collects everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    comparisons: Mutex<Vec<ComparisonRecord>>,
    infra_errors: Mutex<Vec<InfraErrorEvent>>,
}

impl MemorySink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far
    #[must_use]
    pub fn comparisons(&self) -> Vec<ComparisonRecord> {
        self.comparisons.lock().clone()
    }

    /// Shadow failures received so far
    #[must_use]
    pub fn infra_errors(&self) -> Vec<InfraErrorEvent> {
        self.infra_errors.lock().clone()
    }

    /// Drop everything received
    pub fn clear(&self) {
        self.comparisons.lock().clear();
        self.infra_errors.lock().clear();
    }
}

impl TelemetrySink for MemorySink {
    fn record_comparison(&self, record: &ComparisonRecord) {
        self.comparisons.lock().push(record.clone());
    }

    fn record_infra_error(&self, event: &InfraErrorEvent) {
        self.infra_errors.lock().push(event.clone());
    }
}

/// Counters plus sink fan-out
#[derive(Debug)]
pub struct Telemetry {
    metrics: ProxyMetrics,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    divergence_windows: Cache<String, Arc<AtomicU64>>,
    max_divergences_per_window: u64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(crate::config::ProxyConfig::default().max_divergence_records_per_minute)
    }
}

impl Telemetry {
    /// Create telemetry forwarding at most `max_divergences_per_minute`
    /// DIVERGED records per operation to sinks
    #[must_use]
    pub fn new(max_divergences_per_minute: u64) -> Self {
        Self {
            metrics: ProxyMetrics::new(),
            sinks: Vec::new(),
            divergence_windows: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(CAP_WINDOW)
                .build(),
            max_divergences_per_window: max_divergences_per_minute,
        }
    }

    /// Add a sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Counter registry
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &ProxyMetrics {
        &self.metrics
    }

    /// Count a call through the proxy
    pub fn call(&self, op: &OperationDescriptor) {
        self.metrics.increment(&op.operation_key(), Counter::Calls);
    }

    /// Count a dual call
    pub fn dual_call(&self, op: &OperationDescriptor) {
        self.metrics
            .increment(&op.operation_key(), Counter::DualCalls);
    }

    /// Count a dropped background shadow read
    pub fn shadow_dropped(&self, op: &OperationDescriptor) {
        let key = op.operation_key();
        self.metrics.increment(&key, Counter::ShadowDropped);
        tracing::debug!(operation = %key, "Shadow pool saturated, shadow read dropped");
    }

    /// Count and forward a comparison record
    pub fn comparison(&self, record: &ComparisonRecord) {
        let key = record.operation_key();
        let counter = match record.verdict {
            Verdict::Match => Counter::Match,
            Verdict::Tolerated => Counter::Tolerated,
            Verdict::Diverged => Counter::Divergence,
        };
        self.metrics.increment(&key, counter);

        let admitted = record.verdict != Verdict::Diverged || self.admit_divergence(&key);
        if !admitted {
            self.metrics.increment(&key, Counter::DivergenceSuppressed);
        }
        for sink in &self.sinks {
            if admitted || !sink.rate_limited() {
                sink.record_comparison(record);
            }
        }
    }

    /// Count and forward a shadow failure
    pub fn infra_error(&self, event: &InfraErrorEvent) {
        self.metrics
            .increment(&event.operation.operation_key(), Counter::InfraError);
        for sink in &self.sinks {
            sink.record_infra_error(event);
        }
    }

    fn admit_divergence(&self, key: &str) -> bool {
        let window = self
            .divergence_windows
            .get_with(key.to_string(), || Arc::new(AtomicU64::new(0)));
        window.fetch_add(1, Ordering::Relaxed) < self.max_divergences_per_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shadow_contract::Method;
    use shadow_verify::ResultVerifier;

    fn op() -> OperationDescriptor {
        OperationDescriptor::new("budget", Method::Get, None)
    }

    fn diverged() -> ComparisonRecord {
        ResultVerifier::new().compare_values(&op(), Backend::Legacy, &json!(1), &json!(2))
    }

    #[test]
    fn records_reach_every_sink_and_counters() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let telemetry = Telemetry::new(10)
            .with_sink(a.clone())
            .with_sink(b.clone())
            .with_sink(Arc::new(TracingSink));

        let matched =
            ResultVerifier::new().compare_values(&op(), Backend::Legacy, &json!(1), &json!(1));
        telemetry.comparison(&matched);
        telemetry.comparison(&diverged());

        assert_eq!(a.comparisons().len(), 2);
        assert_eq!(b.comparisons().len(), 2);
        let snap = telemetry.metrics().snapshot("budget.get");
        assert_eq!(snap.match_total, 1);
        assert_eq!(snap.divergence_total, 1);
    }

    #[test]
    fn divergence_records_are_capped_per_operation() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::new(3).with_sink(sink.clone());

        for _ in 0..10 {
            telemetry.comparison(&diverged());
        }
        let other = ResultVerifier::new().compare_values(
            &OperationDescriptor::new("task", Method::Get, None),
            Backend::Legacy,
            &json!(1),
            &json!(2),
        );
        telemetry.comparison(&other);

        assert_eq!(sink.comparisons().len(), 4);
        let snap = telemetry.metrics().snapshot("budget.get");
        assert_eq!(snap.divergence_total, 10);
        assert_eq!(snap.divergence_suppressed_total, 7);
        assert_eq!(telemetry.metrics().get("task.get", Counter::Divergence), 1);
    }

    #[derive(Debug, Default)]
    struct Uncapped(MemorySink);

    impl TelemetrySink for Uncapped {
        fn record_comparison(&self, record: &ComparisonRecord) {
            self.0.record_comparison(record);
        }

        fn record_infra_error(&self, event: &InfraErrorEvent) {
            self.0.record_infra_error(event);
        }

        fn rate_limited(&self) -> bool {
            false
        }
    }

    #[test]
    fn uncapped_sinks_see_every_divergence() {
        let capped = Arc::new(MemorySink::new());
        let uncapped = Arc::new(Uncapped::default());
        let telemetry = Telemetry::new(2)
            .with_sink(capped.clone())
            .with_sink(uncapped.clone());
        for _ in 0..5 {
            telemetry.comparison(&diverged());
        }
        assert_eq!(capped.comparisons().len(), 2);
        assert_eq!(uncapped.0.comparisons().len(), 5);
    }

    #[test]
    fn infra_errors_are_counted_and_forwarded() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::new(3).with_sink(sink.clone());
        telemetry.infra_error(&InfraErrorEvent::new(
            op(),
            Backend::New,
            MigrationError::ShadowTimeout {
                backend: Backend::New,
                timeout_ms: 100,
            },
        ));
        assert_eq!(sink.infra_errors().len(), 1);
        assert_eq!(telemetry.metrics().get("budget.get", Counter::InfraError), 1);
        sink.clear();
        assert!(sink.infra_errors().is_empty());
    }
}
