//! Proxy wired from configuration, feeding the divergence monitor

use chrono::Utc;
use pretty_assertions::assert_eq;
use shadow_contract::entities::Budgets;
use shadow_contract::{EntityId, Repository};
use shadow_proxy::{
    AlertState, Counter, DivergenceMonitor, MemorySink, MigrationConfig, MigrationProxy,
    ProxyServices, TelemetrySink,
};
use shadow_test_utils::{budget_input, ctx, manager_with, shadow_flag, Fixture, InMemoryRepository};
use std::sync::Arc;

const CONFIG: &str = r"
[proxy]
shadow_pool_capacity = 4
max_divergence_records_per_minute = 3

[monitor]
window_ms = 60000
divergence_rate_threshold = 0.5
min_samples = 4
";

#[tokio::test]
async fn test_sustained_divergence_opens_alert() {
    let config = MigrationConfig::from_toml_str(CONFIG).unwrap();
    let (_store, manager) = manager_with(vec![shadow_flag("budget.get")]).await;
    let monitor = Arc::new(DivergenceMonitor::new(config.monitor.clone()));
    let sink = Arc::new(MemorySink::new());
    let sinks: Vec<Arc<dyn TelemetrySink>> = vec![monitor.clone(), sink.clone()];
    let services = Arc::new(ProxyServices::from_config(&config, manager, sinks));
    assert_eq!(services.pool().capacity(), 4);

    let legacy = InMemoryRepository::<Budgets>::legacy();
    let new = InMemoryRepository::<Budgets>::new_backend();
    let now = Utc::now();
    let id = EntityId::from("b-1");
    legacy.insert_raw(Budgets::build(id.clone(), &budget_input("food", "food", 100.0), now));
    new.insert_raw(Budgets::build(id.clone(), &budget_input("food", "food", 90.0), now));
    let proxy = MigrationProxy::new(legacy, new, services.clone());

    for _ in 0..5 {
        proxy.get(&ctx("u1"), &id).await.unwrap();
        services.drain().await;
    }

    let metrics = services.telemetry().metrics();
    assert_eq!(metrics.get("budget.get", Counter::Divergence), 5);
    assert_eq!(metrics.get("budget.get", Counter::DivergenceSuppressed), 2);
    assert_eq!(sink.comparisons().len(), 3);

    // the monitor is exempt from the cap, so its rate covers all five
    let alerts = monitor.active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].samples, 5);
    assert!((monitor.divergence_rate("budget.get") - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_alert_lifecycle_through_proxy() {
    let mut config = MigrationConfig::from_toml_str(CONFIG).unwrap();
    config.proxy.max_divergence_records_per_minute = 100;
    let (_store, manager) = manager_with(vec![shadow_flag("budget.*")]).await;
    let monitor = Arc::new(DivergenceMonitor::new(config.monitor.clone()));
    let services = Arc::new(ProxyServices::from_config(
        &config,
        manager,
        vec![monitor.clone() as Arc<dyn TelemetrySink>],
    ));

    let legacy = InMemoryRepository::<Budgets>::legacy();
    let new = InMemoryRepository::<Budgets>::new_backend();
    let now = Utc::now();
    let id = EntityId::from("b-1");
    legacy.insert_raw(Budgets::build(id.clone(), &budget_input("food", "food", 100.0), now));
    new.insert_raw(Budgets::build(id.clone(), &budget_input("food", "food", 90.0), now));
    let proxy = MigrationProxy::new(legacy, new.clone(), services.clone());

    for _ in 0..4 {
        proxy.get(&ctx("u1"), &id).await.unwrap();
        services.drain().await;
    }
    let alert = monitor.active_alerts().pop().expect("alert opened");
    assert_eq!(alert.operation_key, "budget.get");
    assert_eq!(alert.state, AlertState::Open);
    assert_eq!(monitor.acknowledge(alert.id).unwrap().state, AlertState::Acknowledged);

    // fix the new backend; matches pull the rate back to the threshold
    new.insert_raw(Budgets::build(id.clone(), &budget_input("food", "food", 100.0), now));
    for _ in 0..4 {
        proxy.get(&ctx("u1"), &id).await.unwrap();
        services.drain().await;
    }
    assert!(monitor.active_alerts().is_empty());
    assert_eq!(monitor.alert(alert.id).unwrap().state, AlertState::Resolved);
}
