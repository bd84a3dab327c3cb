//! Feature flag manager
//!
//! Serves rollout decisions from an immutable [`FlagSnapshot`]. Refreshes
//! replace the snapshot wholesale; a decision only clones an `Arc` and never
//! waits on the flag store.

use crate::decision::{DecisionReason, RolloutDecision};
use crate::error::FlagError;
use crate::flag::FeatureFlag;
use crate::sampler::{RandomSampler, Sampler};
use crate::store::FlagStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shadow_contract::OperationDescriptor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Flag manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagManagerConfig {
    /// Interval between flag store polls
    pub poll_interval_ms: u64,
    /// Age after which the cached snapshot counts as stale
    pub max_staleness_ms: u64,
    /// FULL mode legacy sampling probability for flags that set none
    pub full_mode_legacy_sample_rate: f64,
}

impl FlagManagerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With staleness bound
    #[inline]
    #[must_use]
    pub fn with_max_staleness(mut self, staleness: Duration) -> Self {
        self.max_staleness_ms = u64::try_from(staleness.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With default FULL mode legacy sampling probability
    #[inline]
    #[must_use]
    pub fn with_full_mode_sample_rate(mut self, rate: f64) -> Self {
        self.full_mode_legacy_sample_rate = rate;
        self
    }

    /// Poll interval as a duration (never zero)
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Staleness bound as a duration
    #[inline]
    #[must_use]
    pub fn max_staleness(&self) -> Duration {
        Duration::from_millis(self.max_staleness_ms)
    }
}

impl Default for FlagManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            max_staleness_ms: 120_000,
            full_mode_legacy_sample_rate: 0.01,
        }
    }
}

/// Immutable set of flags loaded by one refresh
#[derive(Debug, Clone)]
pub struct FlagSnapshot {
    flags: HashMap<String, FeatureFlag>,
    version: u64,
    loaded_at: Option<Instant>,
}

impl FlagSnapshot {
    /// Snapshot with no flags, every operation OFF
    #[must_use]
    pub fn empty() -> Self {
        Self {
            flags: HashMap::new(),
            version: 0,
            loaded_at: None,
        }
    }

    /// Flag for `op`: exact key first, then entity wildcard
    #[must_use]
    pub fn lookup(&self, op: &OperationDescriptor) -> Option<&FeatureFlag> {
        self.flags
            .get(&op.operation_key())
            .or_else(|| self.flags.get(&op.wildcard_key()))
    }

    /// Flag stored under exactly `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FeatureFlag> {
        self.flags.get(key)
    }

    /// Number of flags
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Whether the snapshot holds no flags
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Refresh generation (0 before the first successful load)
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Decides which backends serve each call
pub struct FlagManager {
    store: Arc<dyn FlagStore>,
    snapshot: RwLock<Arc<FlagSnapshot>>,
    config: FlagManagerConfig,
    sampler: Arc<dyn Sampler>,
    refresh_failures: AtomicU64,
}

impl std::fmt::Debug for FlagManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagManager")
            .field("version", &self.snapshot.read().version)
            .field("config", &self.config)
            .field("refresh_failures", &self.refresh_failures.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl FlagManager {
    /// Create manager with an empty snapshot; call [`refresh`](Self::refresh)
    /// or [`connect`](Self::connect) to load flags
    #[must_use]
    pub fn new(store: Arc<dyn FlagStore>, config: FlagManagerConfig) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(FlagSnapshot::empty())),
            config,
            sampler: Arc::new(RandomSampler),
            refresh_failures: AtomicU64::new(0),
        }
    }

    /// Create manager and attempt an initial load
    ///
    /// A failed initial load is logged and leaves every operation OFF.
    pub async fn connect(store: Arc<dyn FlagStore>, config: FlagManagerConfig) -> Self {
        let manager = Self::new(store, config);
        // failure already logged; OFF is the safe starting point
        let _ = manager.refresh().await;
        manager
    }

    /// Replace the FULL mode sampler
    #[inline]
    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Decide which backends serve `op`
    ///
    /// Reads only the cached snapshot. Missing flags default to legacy only.
    pub fn decide(&self, op: &OperationDescriptor) -> RolloutDecision {
        let snapshot = self.snapshot();
        let decision = match snapshot.lookup(op) {
            Some(flag) => flag.evaluate(
                op.actor.as_ref(),
                self.sampler.as_ref(),
                self.config.full_mode_legacy_sample_rate,
            ),
            None => RolloutDecision::legacy_only(DecisionReason::NoFlag),
        };
        tracing::trace!(
            operation = %op.operation_key(),
            actor = ?op.actor,
            legacy = decision.call_legacy,
            new = decision.call_new,
            authoritative = %decision.authoritative,
            reason = ?decision.reason,
            "rollout decision"
        );
        decision
    }

    /// Current snapshot
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<FlagSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Generation of the current snapshot
    #[inline]
    #[must_use]
    pub fn snapshot_version(&self) -> u64 {
        self.snapshot.read().version
    }

    /// Whether the snapshot is older than the staleness bound
    ///
    /// A manager that never loaded successfully is always stale.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        match self.snapshot.read().loaded_at {
            Some(at) => at.elapsed() > self.config.max_staleness(),
            None => true,
        }
    }

    /// Number of failed refreshes since creation
    #[inline]
    #[must_use]
    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FlagManagerConfig {
        &self.config
    }

    /// Poll the store once and swap in the new snapshot
    ///
    /// Invalid rows are skipped with a warning. On error the previous
    /// snapshot keeps serving.
    ///
    /// # Errors
    /// The store's load error.
    pub async fn refresh(&self) -> Result<u64, FlagError> {
        let rows = match self.store.load().await {
            Ok(rows) => rows,
            Err(e) => {
                self.refresh_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %e,
                    version = self.snapshot_version(),
                    stale = self.is_stale(),
                    "flag refresh failed; serving last-known-good flags"
                );
                return Err(e);
            }
        };

        let mut flags = HashMap::with_capacity(rows.len());
        for flag in rows {
            if let Err(e) = flag.validate() {
                tracing::warn!(error = %e, "skipping invalid feature flag");
                continue;
            }
            if let Some(previous) = flags.insert(flag.operation_key.clone(), flag) {
                tracing::warn!(
                    operation = %previous.operation_key,
                    "duplicate feature flag row; last one wins"
                );
            }
        }

        let mut guard = self.snapshot.write();
        let version = guard.version + 1;
        let count = flags.len();
        *guard = Arc::new(FlagSnapshot {
            flags,
            version,
            loaded_at: Some(Instant::now()),
        });
        drop(guard);

        tracing::debug!(version, flags = count, "feature flags refreshed");
        Ok(version)
    }

    /// Drop the cached snapshot's freshness and reload now
    ///
    /// For callers that need a decision reflecting the store as of this call.
    ///
    /// # Errors
    /// The store's load error; the previous snapshot keeps serving.
    pub async fn invalidate(&self) -> Result<u64, FlagError> {
        tracing::debug!("flag cache invalidated");
        self.refresh().await
    }

    /// Spawn the periodic refresh task
    ///
    /// The task holds a weak reference and exits once the manager is dropped.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.poll_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    tracing::debug!("flag manager dropped; refresh loop exiting");
                    break;
                };
                // errors are logged inside refresh
                let _ = manager.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::RolloutMode;
    use crate::sampler::FixedSampler;
    use crate::store::{MockFlagStore, StaticFlagStore};
    use shadow_contract::{ActorId, Backend, Method};

    fn op(entity: &str, method: Method, actor: Option<&str>) -> OperationDescriptor {
        OperationDescriptor::new(entity, method, actor.map(ActorId::from))
    }

    #[tokio::test]
    async fn missing_flag_defaults_to_legacy() {
        let manager =
            FlagManager::connect(Arc::new(StaticFlagStore::new()), FlagManagerConfig::new()).await;
        let d = manager.decide(&op("task", Method::Get, Some("u1")));
        assert_eq!(d, RolloutDecision::legacy_only(DecisionReason::NoFlag));
    }

    #[tokio::test]
    async fn exact_key_wins_over_wildcard() {
        let store = Arc::new(StaticFlagStore::with_flags(vec![
            FeatureFlag::new("task.*", RolloutMode::Shadow),
            FeatureFlag::new("task.delete", RolloutMode::Off),
        ]));
        let manager = FlagManager::connect(store, FlagManagerConfig::new()).await;

        assert!(manager.decide(&op("task", Method::Get, None)).is_dual());
        assert_eq!(
            manager.decide(&op("task", Method::Delete, None)).reason,
            DecisionReason::Off
        );
    }

    #[tokio::test]
    async fn decisions_are_deterministic() {
        let store = Arc::new(StaticFlagStore::with_flags(vec![FeatureFlag::partial(
            "budget.get",
            30,
        )]));
        let manager = FlagManager::connect(store.clone(), FlagManagerConfig::new()).await;
        let descriptor = op("budget", Method::Get, Some("u1"));
        let first = manager.decide(&descriptor);

        // a second manager stands in for a process restart
        let restarted = FlagManager::connect(store, FlagManagerConfig::new()).await;
        for _ in 0..20 {
            assert_eq!(manager.decide(&descriptor), first);
            assert_eq!(restarted.decide(&descriptor), first);
        }
    }

    #[tokio::test]
    async fn refresh_failure_keeps_last_known_good() {
        let store = Arc::new(StaticFlagStore::with_flags(vec![FeatureFlag::new(
            "inventory.*",
            RolloutMode::Shadow,
        )]));
        let manager = FlagManager::connect(store.clone(), FlagManagerConfig::new()).await;
        assert_eq!(manager.snapshot_version(), 1);

        store.set_unavailable(Some("timeout"));
        assert!(manager.refresh().await.is_err());
        assert_eq!(manager.refresh_failures(), 1);
        assert_eq!(manager.snapshot_version(), 1);
        assert!(manager.decide(&op("inventory", Method::List, None)).is_dual());
    }

    #[tokio::test]
    async fn invalid_rows_are_skipped() {
        let store = Arc::new(StaticFlagStore::with_flags(vec![
            FeatureFlag::partial("task.get", 150),
            FeatureFlag::new("task.list", RolloutMode::Shadow),
        ]));
        let manager = FlagManager::connect(store, FlagManagerConfig::new()).await;
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("task.get").is_none());
    }

    #[tokio::test]
    async fn invalidate_picks_up_changes_immediately() {
        let store = Arc::new(StaticFlagStore::new());
        let manager = FlagManager::connect(store.clone(), FlagManagerConfig::new()).await;
        let descriptor = op("meal_plan", Method::Get, None);
        assert!(!manager.decide(&descriptor).is_dual());

        store.upsert(FeatureFlag::new("meal_plan.get", RolloutMode::Shadow));
        // cached decision unchanged until refresh
        assert!(!manager.decide(&descriptor).is_dual());

        manager.invalidate().await.unwrap();
        assert!(manager.decide(&descriptor).is_dual());
    }

    #[tokio::test]
    async fn full_mode_uses_injected_sampler() {
        let store = Arc::new(StaticFlagStore::with_flags(vec![FeatureFlag::new(
            "budget.*",
            RolloutMode::Full,
        )]));
        let config = FlagManagerConfig::new().with_full_mode_sample_rate(0.5);
        let manager = FlagManager::connect(store, config)
            .await
            .with_sampler(Arc::new(FixedSampler(0.2)));

        let d = manager.decide(&op("budget", Method::Get, None));
        assert_eq!(d, RolloutDecision::dual(Backend::New, DecisionReason::FullSampled));
    }

    #[tokio::test]
    async fn mocked_store_error_on_connect_serves_off() {
        let mut store = MockFlagStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|| Err(FlagError::StoreUnavailable("down".into())));

        let manager = FlagManager::connect(Arc::new(store), FlagManagerConfig::new()).await;
        assert_eq!(manager.snapshot_version(), 0);
        assert!(manager.is_stale());
        assert_eq!(
            manager.decide(&op("task", Method::Get, Some("u1"))).reason,
            DecisionReason::NoFlag
        );
    }

    #[tokio::test(start_paused = true)]
    async fn staleness_follows_configured_bound() {
        let config = FlagManagerConfig::new().with_max_staleness(Duration::from_secs(60));
        let manager = FlagManager::connect(Arc::new(StaticFlagStore::new()), config).await;
        assert!(!manager.is_stale());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(manager.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_loop_polls_store() {
        let store = Arc::new(StaticFlagStore::new());
        let config = FlagManagerConfig::new().with_poll_interval(Duration::from_secs(10));
        let manager = Arc::new(FlagManager::connect(store.clone(), config).await);
        let handle = manager.spawn_refresh_loop();

        store.upsert(FeatureFlag::new("task.get", RolloutMode::Shadow));
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(manager.snapshot_version(), 2);
        assert!(manager.decide(&op("task", Method::Get, None)).is_dual());

        drop(manager);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(handle.is_finished());
    }
}
