//! Shared setup for proxy integration tests

#![allow(dead_code)]

use shadow_flags::FeatureFlag;
use shadow_proxy::{MemorySink, MigrationProxy, ProxyConfig, ProxyServices, Telemetry};
use shadow_test_utils::{manager_with, Fixture, InMemoryRepository};
use shadow_verify::ResultVerifier;
use std::sync::Arc;

pub type Proxy<K> = MigrationProxy<K, InMemoryRepository<K>, InMemoryRepository<K>>;

/// Proxy over two in-memory backends with a collecting sink
pub struct Harness<K: Fixture> {
    pub legacy: Arc<InMemoryRepository<K>>,
    pub new: Arc<InMemoryRepository<K>>,
    pub sink: Arc<MemorySink>,
    pub proxy: Proxy<K>,
}

impl<K: Fixture> Harness<K> {
    pub fn services(&self) -> &Arc<ProxyServices> {
        self.proxy.services()
    }

    pub fn counter(&self, operation: &str, counter: shadow_proxy::Counter) -> u64 {
        self.services().telemetry().metrics().get(operation, counter)
    }
}

pub async fn harness<K: Fixture>(flags: Vec<FeatureFlag>, config: ProxyConfig) -> Harness<K> {
    harness_with(
        flags,
        config,
        InMemoryRepository::legacy(),
        InMemoryRepository::new_backend(),
    )
    .await
}

pub async fn harness_with<K: Fixture>(
    flags: Vec<FeatureFlag>,
    config: ProxyConfig,
    legacy: Arc<InMemoryRepository<K>>,
    new: Arc<InMemoryRepository<K>>,
) -> Harness<K> {
    let (_store, manager) = manager_with(flags).await;
    let sink = Arc::new(MemorySink::new());
    let telemetry =
        Telemetry::new(config.max_divergence_records_per_minute).with_sink(sink.clone());
    let services = Arc::new(ProxyServices::new(
        manager,
        ResultVerifier::with_defaults(),
        telemetry,
        config,
    ));
    Harness {
        proxy: MigrationProxy::new(legacy.clone(), new.clone(), services),
        legacy,
        new,
        sink,
    }
}

/// Actor whose rollout bucket for `key` satisfies `pred`
pub fn actor_where(key: &str, pred: impl Fn(u8) -> bool) -> String {
    (0..10_000)
        .map(|i| format!("u{i}"))
        .find(|a| pred(shadow_flags::rollout_bucket(key, a)))
        .expect("some actor lands in every bucket range")
}
