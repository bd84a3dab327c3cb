//! Read path tests
//!
//! Authoritative precedence, background shadow reads, shadow failures and
//! pool saturation.

mod common;

use chrono::Utc;
use common::{harness, Harness};
use pretty_assertions::assert_eq;
use shadow_contract::entities::{BudgetFilter, Budgets, TaskFilter, Tasks};
use shadow_contract::{Backend, CreateRequest, EntityId, Method, Repository, RepositoryError};
use shadow_flags::FeatureFlag;
use shadow_proxy::{Counter, MigrationError, ProxyConfig};
use shadow_test_utils::{budget_input, ctx, off_flag, shadow_flag, task_input, Fixture};
use shadow_verify::Verdict;
use std::time::Duration;

fn seed_budget(h: &Harness<Budgets>, id: &str, legacy_amount: f64, new_amount: f64) {
    let now = Utc::now();
    h.legacy.insert_raw(Budgets::build(
        EntityId::from(id),
        &budget_input("groceries", "food", legacy_amount),
        now,
    ));
    h.new.insert_raw(Budgets::build(
        EntityId::from(id),
        &budget_input("groceries", "food", new_amount),
        now,
    ));
}

#[tokio::test]
async fn test_off_mode_is_indistinguishable_from_legacy() {
    let h = harness::<Budgets>(vec![off_flag("budget.get")], ProxyConfig::default()).await;
    let created = h
        .legacy
        .create(&ctx("u1"), CreateRequest::new(budget_input("rent", "housing", 900.0)))
        .await
        .unwrap();

    let via_proxy = h.proxy.get(&ctx("u1"), &created.id).await;
    let direct = h.legacy.get(&ctx("u1"), &created.id).await;
    assert_eq!(via_proxy, direct);

    let missing = EntityId::from("nope");
    assert_eq!(
        h.proxy.get(&ctx("u1"), &missing).await,
        h.legacy.get(&ctx("u1"), &missing).await
    );

    h.services().drain().await;
    assert_eq!(h.new.total_calls(), 0);
    assert!(h.sink.comparisons().is_empty());
    assert_eq!(h.counter("budget.get", Counter::Calls), 2);
    assert_eq!(h.counter("budget.get", Counter::DualCalls), 0);
}

#[tokio::test]
async fn test_operation_without_flag_stays_on_legacy() {
    let h = harness::<Tasks>(Vec::new(), ProxyConfig::default()).await;
    let listed = h.proxy.list(&ctx("u1"), &TaskFilter::default()).await.unwrap();
    assert!(listed.is_empty());
    h.services().drain().await;
    assert_eq!(h.legacy.call_count(Method::List), 1);
    assert_eq!(h.new.total_calls(), 0);
}

#[tokio::test]
async fn test_shadow_returns_legacy_and_records_divergence() {
    let h = harness::<Budgets>(vec![shadow_flag("budget.get")], ProxyConfig::default()).await;
    seed_budget(&h, "b-1", 100.0, 250.0);

    let budget = h.proxy.get(&ctx("u1"), &EntityId::from("b-1")).await.unwrap();
    assert!((budget.amount - 100.0).abs() < f64::EPSILON);

    h.services().drain().await;
    let records = h.sink.comparisons();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.verdict, Verdict::Diverged);
    assert_eq!(record.authoritative, Backend::Legacy);
    assert_eq!(record.operation_key(), "budget.get");
    assert_eq!(record.diff.paths(), vec!["amount"]);
    assert_eq!(h.counter("budget.get", Counter::Divergence), 1);
    assert_eq!(h.counter("budget.get", Counter::DualCalls), 1);
}

#[tokio::test]
async fn test_amount_within_tolerance_matches() {
    let h = harness::<Budgets>(vec![shadow_flag("budget.get")], ProxyConfig::default()).await;
    seed_budget(&h, "b-1", 10.001, 10.0009);

    h.proxy.get(&ctx("u1"), &EntityId::from("b-1")).await.unwrap();
    h.services().drain().await;

    let records = h.sink.comparisons();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].verdict, Verdict::Match);
    assert_eq!(h.counter("budget.get", Counter::Match), 1);
}

#[tokio::test]
async fn test_list_order_and_generated_ids_do_not_diverge() {
    let h = harness::<Tasks>(vec![shadow_flag("task.*")], ProxyConfig::default()).await;
    let now = Utc::now();
    let input = task_input("water plants", &["home", "daily"]);
    h.legacy.insert_raw(Tasks::build(EntityId::from("l-1"), &input, now));
    h.legacy
        .insert_raw(Tasks::build(EntityId::from("l-2"), &task_input("pay rent", &["money"]), now));
    h.new
        .insert_raw(Tasks::build(EntityId::from("n-1"), &task_input("pay rent", &["money"]), now));
    let reordered = task_input("water plants", &["daily", "home"]);
    h.new.insert_raw(Tasks::build(EntityId::from("n-2"), &reordered, now));

    let listed = h.proxy.list(&ctx("u1"), &TaskFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, EntityId::from("l-1"));

    h.services().drain().await;
    let records = h.sink.comparisons();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].verdict, Verdict::Match, "{}", records[0].diff);
}

#[tokio::test]
async fn test_legacy_not_found_is_returned_without_shadow_call() {
    let h = harness::<Budgets>(vec![shadow_flag("budget.get")], ProxyConfig::default()).await;
    let missing = EntityId::from("b-404");

    let err = h.proxy.get(&ctx("u1"), &missing).await.unwrap_err();
    assert_eq!(err, RepositoryError::not_found("budget", "b-404"));

    h.services().drain().await;
    assert_eq!(h.new.call_count(Method::Get), 0);
    assert!(h.sink.comparisons().is_empty());
    assert!(h.sink.infra_errors().is_empty());
}

#[tokio::test]
async fn test_shadow_on_authoritative_failure_logs_but_never_compares() {
    let config = ProxyConfig::default().with_shadow_on_authoritative_failure(true);
    let h = harness::<Budgets>(vec![shadow_flag("budget.get")], config).await;

    let err = h.proxy.get(&ctx("u1"), &EntityId::from("b-404")).await.unwrap_err();
    assert_eq!(err.code(), "not_found");

    h.services().drain().await;
    assert_eq!(h.new.call_count(Method::Get), 1);
    assert!(h.sink.comparisons().is_empty());
    let failures = h.sink.infra_errors();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0].error,
        MigrationError::ShadowFailure { backend: Backend::New, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_hung_shadow_read_does_not_block_caller() {
    let config = ProxyConfig::default().with_read_timeout(Duration::from_millis(50));
    let h = harness::<Budgets>(vec![shadow_flag("budget.get")], config).await;
    seed_budget(&h, "b-1", 100.0, 100.0);
    h.new.hang(true);

    let budget = h.proxy.get(&ctx("u1"), &EntityId::from("b-1")).await.unwrap();
    assert_eq!(budget.id, EntityId::from("b-1"));
    assert_eq!(h.new.completed_count(Method::Get), 0);

    h.services().drain().await;
    assert!(h.sink.comparisons().is_empty());
    let failures = h.sink.infra_errors();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].error,
        MigrationError::ShadowTimeout {
            backend: Backend::New,
            timeout_ms: 50
        }
    );
    assert_eq!(h.counter("budget.get", Counter::InfraError), 1);
}

#[tokio::test]
async fn test_shadow_error_is_infra_error_not_divergence() {
    let h = harness::<Budgets>(vec![shadow_flag("budget.list")], ProxyConfig::default()).await;
    h.new
        .fail_with(Some(RepositoryError::backend("57P01", "terminating connection")));

    let listed = h.proxy.list(&ctx("u1"), &BudgetFilter::default()).await;
    assert_eq!(listed, Ok(Vec::new()));

    h.services().drain().await;
    assert!(h.sink.comparisons().is_empty());
    let failures = h.sink.infra_errors();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].backend, Backend::New);
    assert_eq!(failures[0].error.kind(), "shadow_failure");
    assert_eq!(h.counter("budget.list", Counter::Divergence), 0);
}

#[tokio::test(start_paused = true)]
async fn test_saturated_pool_drops_shadow_reads() {
    let config = ProxyConfig::default()
        .with_pool_capacity(1)
        .with_read_timeout(Duration::from_secs(10));
    let h = harness::<Budgets>(vec![shadow_flag("budget.get")], config).await;
    seed_budget(&h, "b-1", 100.0, 100.0);
    h.new.hang(true);

    for _ in 0..3 {
        h.proxy.get(&ctx("u1"), &EntityId::from("b-1")).await.unwrap();
    }
    assert_eq!(h.services().pool().in_flight(), 1);
    assert_eq!(h.counter("budget.get", Counter::ShadowDropped), 2);
    assert_eq!(h.counter("budget.get", Counter::DualCalls), 3);

    h.services().drain().await;
    assert_eq!(h.new.call_count(Method::Get), 1);
    assert_eq!(h.sink.infra_errors().len(), 1);
}

#[tokio::test]
async fn test_flag_change_applies_after_refresh() {
    let (store, manager) = shadow_test_utils::manager_with(vec![off_flag("budget.get")]).await;
    let services = std::sync::Arc::new(shadow_proxy::ProxyServices::new(
        manager,
        shadow_verify::ResultVerifier::with_defaults(),
        shadow_proxy::Telemetry::default(),
        ProxyConfig::default(),
    ));
    let legacy = shadow_test_utils::InMemoryRepository::<Budgets>::legacy();
    let new = shadow_test_utils::InMemoryRepository::<Budgets>::new_backend();
    let proxy = shadow_proxy::MigrationProxy::new(legacy, new.clone(), services.clone());

    let _ = proxy.get(&ctx("u1"), &EntityId::from("b-1")).await;
    store.upsert(FeatureFlag::partial("budget.get", 100));
    let _ = proxy.get(&ctx("u1"), &EntityId::from("b-1")).await;
    services.drain().await;
    assert_eq!(new.total_calls(), 0);

    services.refresh_flags().await.unwrap();
    let err = proxy.get(&ctx("u1"), &EntityId::from("b-1")).await.unwrap_err();
    assert_eq!(err, RepositoryError::not_found("budget", "b-1"));
    assert_eq!(new.call_count(Method::Get), 1);
}
