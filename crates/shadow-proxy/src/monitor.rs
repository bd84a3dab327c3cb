//! Divergence monitor
//!
//! Aggregates comparison records per operation over a sliding time window
//! and raises a [`DivergenceAlert`] while the divergence rate stays above a
//! threshold. Alerts move Open → Acknowledged → Resolved; an alert resolves
//! on its own once the rate drops back to the threshold or below, including
//! when the operation goes quiet and its window empties. Resolved alerts are
//! forgotten after the configured retention.

use crate::config::MonitorConfig;
use crate::error::AlertError;
use crate::telemetry::{InfraErrorEvent, TelemetrySink};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use shadow_verify::{ComparisonRecord, Verdict};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use ulid::Ulid;

/// Alert lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    /// Rate above threshold, nobody has looked yet
    Open,
    /// An operator has seen it
    Acknowledged,
    /// Rate back under threshold
    Resolved,
}

/// Sustained divergence on one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceAlert {
    /// Alert id
    pub id: Ulid,
    /// Affected operation key
    pub operation_key: String,
    /// Lifecycle state
    pub state: AlertState,
    /// Rate when the alert opened
    pub opened_rate: f64,
    /// Most recent observed rate
    pub current_rate: f64,
    /// Comparisons in the window at the last update
    pub samples: usize,
    /// When the alert opened
    pub opened_at: DateTime<Utc>,
    /// When an operator acknowledged it
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// When it resolved
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DivergenceAlert {
    /// Whether the alert is not yet resolved
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != AlertState::Resolved
    }

    fn resolve(&mut self, rate: f64, samples: usize) {
        self.current_rate = rate;
        self.samples = samples;
        self.state = AlertState::Resolved;
        self.resolved_at = Some(Utc::now());
        tracing::info!(
            alert_id = %self.id,
            operation = %self.operation_key,
            rate,
            "Divergence alert resolved"
        );
    }
}

#[derive(Debug, Default)]
struct Window {
    samples: VecDeque<(Instant, bool)>,
    diverged: usize,
    active_alert: Option<Ulid>,
}

impl Window {
    fn push(&mut self, at: Instant, diverged: bool) {
        self.samples.push_back((at, diverged));
        if diverged {
            self.diverged += 1;
        }
    }

    fn evict_before(&mut self, cutoff: Instant) {
        while let Some(&(at, diverged)) = self.samples.front() {
            if at >= cutoff {
                break;
            }
            self.samples.pop_front();
            if diverged {
                self.diverged -= 1;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn rate(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.diverged as f64 / self.samples.len() as f64
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    windows: HashMap<String, Window>,
    alerts: HashMap<Ulid, DivergenceAlert>,
    resolved_at: HashMap<Ulid, Instant>,
}

/// Sliding-window divergence rate tracker
#[derive(Debug)]
pub struct DivergenceMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
}

impl DivergenceMonitor {
    /// Create monitor
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Feed one comparison outcome observed at `at`
    ///
    /// Returns the alert this observation opened or resolved, if any.
    pub fn observe_at(
        &self,
        operation_key: &str,
        verdict: Verdict,
        at: Instant,
    ) -> Option<DivergenceAlert> {
        let mut state = self.state.lock();
        let MonitorState {
            windows,
            alerts,
            resolved_at,
        } = &mut *state;
        let window = windows.entry(operation_key.to_string()).or_default();

        if let Some(cutoff) = at.checked_sub(self.config.window()) {
            window.evict_before(cutoff);
        }
        window.push(at, verdict == Verdict::Diverged);

        let rate = window.rate();
        let samples = window.samples.len();
        let above = rate > self.config.divergence_rate_threshold;

        match window.active_alert {
            Some(id) => {
                let alert = alerts.get_mut(&id)?;
                if above {
                    alert.current_rate = rate;
                    alert.samples = samples;
                    return None;
                }
                alert.resolve(rate, samples);
                resolved_at.insert(id, at);
                window.active_alert = None;
                Some(alert.clone())
            }
            None if above && samples >= self.config.min_samples => {
                let alert = DivergenceAlert {
                    id: Ulid::new(),
                    operation_key: operation_key.to_string(),
                    state: AlertState::Open,
                    opened_rate: rate,
                    current_rate: rate,
                    samples,
                    opened_at: Utc::now(),
                    acknowledged_at: None,
                    resolved_at: None,
                };
                window.active_alert = Some(alert.id);
                alerts.insert(alert.id, alert.clone());
                tracing::warn!(
                    alert_id = %alert.id,
                    operation = %operation_key,
                    rate,
                    samples,
                    threshold = self.config.divergence_rate_threshold,
                    "Divergence alert opened"
                );
                Some(alert)
            }
            None => None,
        }
    }

    /// Mark an alert as seen by an operator
    ///
    /// Acknowledging twice is a no-op.
    ///
    /// # Errors
    /// [`AlertError::Unknown`] for an unknown id,
    /// [`AlertError::AlreadyResolved`] for a resolved alert
    pub fn acknowledge(&self, alert_id: Ulid) -> Result<DivergenceAlert, AlertError> {
        let mut state = self.state.lock();
        let alert = state
            .alerts
            .get_mut(&alert_id)
            .ok_or(AlertError::Unknown(alert_id))?;
        match alert.state {
            AlertState::Resolved => Err(AlertError::AlreadyResolved(alert_id)),
            AlertState::Acknowledged => Ok(alert.clone()),
            AlertState::Open => {
                alert.state = AlertState::Acknowledged;
                alert.acknowledged_at = Some(Utc::now());
                tracing::info!(
                    alert_id = %alert_id,
                    operation = %alert.operation_key,
                    "Divergence alert acknowledged"
                );
                Ok(alert.clone())
            }
        }
    }

    /// Re-evaluate every window as of `now`
    ///
    /// Resolves alerts whose operation stopped diverging or went quiet,
    /// forgets empty windows and drops resolved alerts older than the
    /// retention. Returns the alerts this sweep resolved.
    pub fn sweep_at(&self, now: Instant) -> Vec<DivergenceAlert> {
        let mut state = self.state.lock();
        let MonitorState {
            windows,
            alerts,
            resolved_at,
        } = &mut *state;
        let mut resolved = Vec::new();

        for window in windows.values_mut() {
            if let Some(cutoff) = now.checked_sub(self.config.window()) {
                window.evict_before(cutoff);
            }
            let Some(id) = window.active_alert else {
                continue;
            };
            let rate = window.rate();
            if rate > self.config.divergence_rate_threshold {
                continue;
            }
            window.active_alert = None;
            if let Some(alert) = alerts.get_mut(&id) {
                alert.resolve(rate, window.samples.len());
                resolved_at.insert(id, now);
                resolved.push(alert.clone());
            }
        }
        windows.retain(|_, w| !w.samples.is_empty() || w.active_alert.is_some());

        let retention = self.config.resolved_retention();
        resolved_at.retain(|id, at| {
            let keep = now.saturating_duration_since(*at) < retention;
            if !keep {
                alerts.remove(id);
            }
            keep
        });
        resolved
    }

    /// Spawn a task sweeping once per window length
    ///
    /// The task holds a weak reference and exits once the monitor is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.window();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(monitor) = weak.upgrade() else {
                    tracing::debug!("divergence monitor dropped; sweeper exiting");
                    break;
                };
                monitor.sweep_at(Instant::now());
            }
        })
    }

    /// Alert by id
    #[must_use]
    pub fn alert(&self, alert_id: Ulid) -> Option<DivergenceAlert> {
        self.state.lock().alerts.get(&alert_id).cloned()
    }

    /// Alerts still retained, oldest first
    #[must_use]
    pub fn alerts(&self) -> Vec<DivergenceAlert> {
        self.sweep_at(Instant::now());
        let mut alerts: Vec<_> = self.state.lock().alerts.values().cloned().collect();
        alerts.sort_by_key(|a| a.id);
        alerts
    }

    /// Alerts not yet resolved
    #[must_use]
    pub fn active_alerts(&self) -> Vec<DivergenceAlert> {
        self.alerts().into_iter().filter(DivergenceAlert::is_active).collect()
    }

    /// Divergence rate of `operation_key` in the current window
    #[must_use]
    pub fn divergence_rate(&self, operation_key: &str) -> f64 {
        self.state
            .lock()
            .windows
            .get(operation_key)
            .map_or(0.0, Window::rate)
    }
}

impl TelemetrySink for DivergenceMonitor {
    fn record_comparison(&self, record: &ComparisonRecord) {
        self.observe_at(&record.operation_key(), record.verdict, Instant::now());
    }

    fn record_infra_error(&self, _event: &InfraErrorEvent) {
        // execution failures are not evidence of disagreement
    }

    fn rate_limited(&self) -> bool {
        false
    }
}
