//! Billing bridge flows: checkout, portal, and webhook verification.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use uuid::Uuid;

use vitrina::accounts::InMemoryAccountStore;
use vitrina::billing::{MockStripeClient, WebhookOutcome};
use vitrina::plans::InMemoryPlanStore;
use vitrina::{
    Account, AccountStore, CheckoutConfig, CheckoutManager, Plan, PlanCatalog, PortalManager,
    SubscriptionStatus, WebhookHandler,
};

const WEBHOOK_SECRET: &str = "whsec_integration_secret";

fn plan(id: &str, level: i32, is_free: bool, price: Option<&str>) -> Plan {
    Plan {
        id: id.to_string(),
        name: id.to_string(),
        description: None,
        price: Decimal::new(1999, 2),
        max_stores: 3,
        max_products: 50,
        max_categories: 10,
        features: Vec::new(),
        is_active: true,
        is_free,
        level,
        stripe_price_id: price.map(String::from),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

async fn plans() -> PlanCatalog<InMemoryPlanStore> {
    let store = InMemoryPlanStore::new();
    store.seed_plans(vec![
        plan("gratuito", 1, true, None),
        plan("profesional", 3, false, Some("price_profesional")),
    ]);
    let catalog = PlanCatalog::new(store);
    catalog.load_plans().await.unwrap();
    catalog
}

/// Sign a payload the way the provider does: HMAC-SHA256 over
/// `"{timestamp}.{payload}"`, presented as `t=...,v1=...`.
fn stripe_signature(payload: &str, timestamp: i64, secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let digest = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={digest}")
}

#[tokio::test]
async fn checkout_links_customer_and_returns_redirect() {
    let accounts = InMemoryAccountStore::new();
    let account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "gratuito");
    accounts.insert_account(&account).await.unwrap();

    let manager = CheckoutManager::new(
        accounts.clone(),
        MockStripeClient::new(),
        plans().await,
        CheckoutConfig::new().allowed_redirect_domains(["example.com"]),
    );

    let session = manager
        .create_checkout_session(
            account.id,
            "profesional",
            "https://app.example.com/success",
            "https://app.example.com/cancel",
        )
        .await
        .unwrap();
    assert!(session.url.starts_with("https://checkout.stripe.com/"));

    let stored = accounts.get_account(account.id).await.unwrap().unwrap();
    assert!(stored.stripe_customer_id.is_some());
}

#[tokio::test]
async fn checkout_rejects_disallowed_redirects() {
    let accounts = InMemoryAccountStore::new();
    let account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "gratuito");
    accounts.insert_account(&account).await.unwrap();

    let manager = CheckoutManager::new(
        accounts.clone(),
        MockStripeClient::new(),
        plans().await,
        CheckoutConfig::new().allowed_redirect_domains(["example.com"]),
    );

    let err = manager
        .create_checkout_session(
            account.id,
            "profesional",
            "https://evil.example.org/phish",
            "https://app.example.com/cancel",
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not allowed"));

    // Rejected before any provider call: no customer was created.
    let stored = accounts.get_account(account.id).await.unwrap().unwrap();
    assert!(stored.stripe_customer_id.is_none());
}

#[tokio::test]
async fn portal_without_customer_fails_with_clear_error() {
    let accounts = InMemoryAccountStore::new();
    let account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "gratuito");
    accounts.insert_account(&account).await.unwrap();

    let manager = PortalManager::new(accounts.clone(), MockStripeClient::new());
    let err = manager
        .create_portal_session(account.id, "https://app.example.com/billing")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No billing customer"));
}

#[tokio::test]
async fn webhook_signature_is_mandatory() {
    let accounts = InMemoryAccountStore::new();
    let mut account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "gratuito");
    account.stripe_customer_id = Some("cus_abc".to_string());
    accounts.insert_account(&account).await.unwrap();

    let handler = WebhookHandler::new(accounts.clone(), plans().await, WEBHOOK_SECRET);

    let payload = serde_json::json!({
        "id": "evt_sub",
        "type": "customer.subscription.created",
        "created": 1_700_000_000u64,
        "data": {"object": {
            "id": "sub_1",
            "customer": "cus_abc",
            "status": "active",
            "current_period_start": 1_700_000_000i64,
            "current_period_end": 1_702_592_000i64,
            "items": {"data": [{"price": {"id": "price_profesional"}}]},
        }},
    })
    .to_string();
    let now = Utc::now().timestamp();

    // Bad signature: rejected, account untouched.
    let err = handler
        .verify_signature(payload.as_bytes(), &stripe_signature(&payload, now, "whsec_wrong"))
        .unwrap_err();
    assert!(err.to_string().contains("Invalid webhook signature"));
    let stored = accounts.get_account(account.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, "gratuito");
    assert!(stored.subscription_id.is_none());

    // Good signature: verified and applied.
    let event = handler
        .verify_signature(payload.as_bytes(), &stripe_signature(&payload, now, WEBHOOK_SECRET))
        .unwrap();
    assert_eq!(handler.handle_event(event).await.unwrap(), WebhookOutcome::Processed);

    let stored = accounts.get_account(account.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, "profesional");
    assert_eq!(stored.subscription_status, Some(SubscriptionStatus::Active));
    assert_eq!(stored.subscription_id.as_deref(), Some("sub_1"));
}

#[tokio::test]
async fn replayed_webhook_event_is_ignored() {
    let accounts = InMemoryAccountStore::new();
    let mut account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "gratuito");
    account.stripe_customer_id = Some("cus_abc".to_string());
    accounts.insert_account(&account).await.unwrap();

    let handler = WebhookHandler::new(accounts.clone(), plans().await, WEBHOOK_SECRET);
    let event: vitrina::WebhookEvent = serde_json::from_value(serde_json::json!({
        "id": "evt_invoice",
        "type": "invoice.payment_succeeded",
        "created": 1_700_000_000u64,
        "data": {"object": {"customer": "cus_abc"}},
    }))
    .unwrap();

    assert_eq!(
        handler.handle_event(event.clone()).await.unwrap(),
        WebhookOutcome::Processed
    );
    assert_eq!(
        handler.handle_event(event).await.unwrap(),
        WebhookOutcome::AlreadyProcessed
    );
}
