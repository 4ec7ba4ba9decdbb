//! Reconciliation flows: webhook-driven downgrades, idempotent ticks,
//! expiry sweeps, and plan-resolution fallback.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use vitrina::accounts::{InMemoryAccountStore, InMemoryIdentityProvider};
use vitrina::billing::{WebhookEvent, WebhookHandler, WebhookOutcome};
use vitrina::catalog::InMemoryCatalogStore;
use vitrina::notify::RecordingNotifier;
use vitrina::plans::InMemoryPlanStore;
use vitrina::{
    Account, AccountSnapshot, AccountStore, AuthFlow, CatalogStore, Plan, PlanCatalog, Reconciler,
    Store, SubscriptionStatus, TickOutcome,
};

fn plan(id: &str, name: &str, level: i32, is_free: bool, max_stores: u32, price: Option<&str>) -> Plan {
    Plan {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        price: Decimal::ZERO,
        max_stores,
        max_products: 10,
        max_categories: 3,
        features: Vec::new(),
        is_active: true,
        is_free,
        level,
        stripe_price_id: price.map(String::from),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

struct World {
    catalog: InMemoryCatalogStore,
    accounts: InMemoryAccountStore,
    plans: PlanCatalog<InMemoryPlanStore>,
    notifier: RecordingNotifier,
    reconciler: Reconciler<InMemoryCatalogStore, InMemoryAccountStore, InMemoryPlanStore>,
}

async fn world() -> World {
    let catalog = InMemoryCatalogStore::new();
    let accounts = InMemoryAccountStore::new();
    let plan_store = InMemoryPlanStore::new();
    plan_store.seed_plans(vec![
        plan("gratuito", "Gratuito", 1, true, 1, None),
        plan("profesional", "Profesional", 3, false, 3, Some("price_profesional")),
    ]);
    let plans = PlanCatalog::new(plan_store);
    plans.load_plans().await.unwrap();
    let notifier = RecordingNotifier::new();
    let reconciler = Reconciler::new(
        catalog.clone(),
        accounts.clone(),
        plans.clone(),
        Arc::new(notifier.clone()),
    );
    World {
        catalog,
        accounts,
        plans,
        notifier,
        reconciler,
    }
}

fn store_aged(account_id: Uuid, slug: &str, minutes_ago: i64) -> Store {
    let mut store = Store::new(account_id, slug, slug);
    store.created_at = Utc::now() - Duration::minutes(minutes_ago);
    store
}

/// Scenario: `customer.subscription.deleted` arrives for a Pro account.
/// The account drops to the free plan with status canceled, and the next
/// reconciliation suspends the stores the free plan no longer covers.
#[tokio::test]
async fn webhook_cancellation_then_reconciliation() {
    let w = world().await;

    let mut account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "profesional");
    account.stripe_customer_id = Some("cus_abc".to_string());
    account.subscription_status = Some(SubscriptionStatus::Active);
    w.accounts.insert_account(&account).await.unwrap();

    for (slug, age) in [("primera", 300), ("segunda", 200), ("tercera", 100)] {
        w.catalog
            .insert_store(&store_aged(account.id, slug, age))
            .await
            .unwrap();
    }

    // Session snapshot from before the cancellation.
    let mut snapshot = AccountSnapshot::of(&account);

    let webhook = WebhookHandler::new(w.accounts.clone(), w.plans.clone(), "whsec_test");
    let event: WebhookEvent = serde_json::from_value(serde_json::json!({
        "id": "evt_cancel",
        "type": "customer.subscription.deleted",
        "created": 1_700_000_000u64,
        "data": {"object": {"id": "sub_123", "customer": "cus_abc"}},
    }))
    .unwrap();
    assert_eq!(
        webhook.handle_event(event).await.unwrap(),
        WebhookOutcome::Processed
    );

    let stored = w.accounts.get_account(account.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, "gratuito");
    assert_eq!(stored.subscription_status, Some(SubscriptionStatus::Canceled));

    // The reconciliation tick notices the drift and enforces the limit.
    let outcome = w.reconciler.tick(account.id, &mut snapshot).await.unwrap();
    let TickOutcome::Reconciled { report, plan_changed } = outcome else {
        panic!("expected reconciliation, got {outcome:?}");
    };
    assert!(plan_changed);
    assert_eq!(report.stores_suspended, 2);

    let stores = w.catalog.list_stores(account.id).await.unwrap();
    assert_eq!(stores.len(), 3, "no store may be deleted");
    assert_eq!(stores.iter().filter(|s| s.is_active()).count(), 1);
    assert_eq!(stores[0].slug, "primera");
    assert!(stores[0].is_active());
}

/// Scenario: two back-to-back ticks with no account or plan change
/// produce zero writes on the second tick.
#[tokio::test]
async fn second_tick_is_a_noop() {
    let w = world().await;
    let account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "profesional");
    w.accounts.insert_account(&account).await.unwrap();

    let mut snapshot = AccountSnapshot::of(&account);
    assert_eq!(
        w.reconciler.tick(account.id, &mut snapshot).await.unwrap(),
        TickOutcome::NoChange
    );
    assert_eq!(
        w.reconciler.tick(account.id, &mut snapshot).await.unwrap(),
        TickOutcome::NoChange
    );
    assert!(w.notifier.plan_changes().is_empty());
}

/// A subscription whose end date passed while status still read active is
/// treated as canceled: downgraded to the free plan, marked expired, and
/// enforced.
#[tokio::test]
async fn expiry_sweep() {
    let w = world().await;
    let mut account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "profesional");
    account.subscription_status = Some(SubscriptionStatus::Active);
    account.subscription_end_date = Some(Utc::now() - Duration::days(1));
    w.accounts.insert_account(&account).await.unwrap();

    for (slug, age) in [("primera", 300), ("segunda", 200)] {
        w.catalog
            .insert_store(&store_aged(account.id, slug, age))
            .await
            .unwrap();
    }

    let mut snapshot = AccountSnapshot::of(&account);
    let outcome = w.reconciler.tick(account.id, &mut snapshot).await.unwrap();
    assert!(matches!(outcome, TickOutcome::Reconciled { .. }));

    let stored = w.accounts.get_account(account.id).await.unwrap().unwrap();
    assert_eq!(stored.subscription_status, Some(SubscriptionStatus::Expired));
    assert_eq!(stored.plan, "gratuito");

    let stores = w.catalog.list_stores(account.id).await.unwrap();
    assert_eq!(stores.iter().filter(|s| s.is_active()).count(), 1);
}

/// An account whose plan field matches nothing resolves to the free plan
/// for limit queries, and reconciliation persists the correction.
#[tokio::test]
async fn dangling_plan_falls_back_and_is_corrected() {
    let w = world().await;
    let account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "plan-que-no-existe");
    w.accounts.insert_account(&account).await.unwrap();

    // Read-side resolution degrades, never errors.
    let resolved = w.plans.resolve_for(&account).unwrap();
    assert_eq!(resolved.id, "gratuito");
    assert_eq!(
        w.plans.max_limit_for(&account, vitrina::ResourceKind::Stores),
        1
    );

    // Legacy name references resolve case-insensitively before falling back.
    let legacy = Account::new(Uuid::new_v4(), "luis@example.com", "Luis", "PROFESIONAL");
    assert_eq!(w.plans.resolve_for(&legacy).unwrap().id, "profesional");

    // Reconciliation persists the free-plan id onto the record.
    let mut snapshot = AccountSnapshot {
        plan: "otro".to_string(),
        subscription_status: None,
    };
    w.reconciler.tick(account.id, &mut snapshot).await.unwrap();
    let stored = w.accounts.get_account(account.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, "gratuito");
}

/// Registration fails loudly when no free plan is configured instead of
/// assigning an arbitrary plan.
#[tokio::test]
async fn registration_requires_a_free_plan() {
    let plan_store = InMemoryPlanStore::new();
    plan_store.seed_plans(vec![plan(
        "profesional",
        "Profesional",
        3,
        false,
        3,
        Some("price_profesional"),
    )]);
    let plans = PlanCatalog::new(plan_store);

    let flow = AuthFlow::new(
        InMemoryIdentityProvider::new(),
        InMemoryAccountStore::new(),
        plans.clone(),
    );

    assert!(plans.free_plan().is_none());
    let err = flow
        .register("ana@example.com", "secret123", "Ana")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No free plan"));
}
