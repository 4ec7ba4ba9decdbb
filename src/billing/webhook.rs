//! Stripe webhook handling.
//!
//! Signature verification is mandatory before any event is trusted; an
//! invalid signature is rejected with no state change. Verified events are
//! mapped deterministically onto account-record fields, with idempotency
//! tracked by event id.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::accounts::{Account, AccountStore, PaymentOutcome, SubscriptionStatus};
use crate::error::{DomainError, Result};
use crate::plans::{PlanCatalog, PlanStore};

/// Accepted age for webhook timestamps, in seconds.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Parsed webhook event.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g. "customer.subscription.updated").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// When the provider created the event (Unix timestamp).
    pub created: u64,
}

/// Webhook event data.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WebhookEventData {
    /// The object that triggered the event.
    pub object: serde_json::Value,
}

/// Outcome of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event was processed successfully.
    Processed,
    /// Event was not relevant.
    Ignored,
    /// Event had already been processed (idempotency).
    AlreadyProcessed,
}

/// Webhook receiver: verification, idempotency, and account mutation.
///
/// The signing secret is held in [`SecretString`] so it cannot leak
/// through debug output.
pub struct WebhookHandler<A, P>
where
    A: AccountStore,
    P: PlanStore,
{
    accounts: A,
    plans: PlanCatalog<P>,
    webhook_secret: SecretString,
}

impl<A, P> WebhookHandler<A, P>
where
    A: AccountStore,
    P: PlanStore,
{
    #[must_use]
    pub fn new(accounts: A, plans: PlanCatalog<P>, webhook_secret: impl Into<SecretString>) -> Self {
        Self {
            accounts,
            plans,
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Verify the `Stripe-Signature` header and parse the event.
    ///
    /// # Errors
    /// Fails on a malformed header, a timestamp outside the tolerance
    /// window, a signature mismatch, or an unparseable payload.
    pub fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        let parts = parse_signature_header(signature)?;

        let age = (Utc::now().timestamp() - parts.timestamp).abs();
        if age > TIMESTAMP_TOLERANCE_SECS {
            return Err(DomainError::WebhookTimestampExpired { age_seconds: age }.into());
        }

        let signed_payload = format!("{}.{}", parts.timestamp, String::from_utf8_lossy(payload));
        let expected = compute_signature(
            self.webhook_secret.expose_secret(),
            signed_payload.as_bytes(),
        )?;

        let provided =
            hex::decode(&parts.signature).map_err(|_| DomainError::InvalidWebhookSignature)?;
        if expected.ct_eq(&provided).unwrap_u8() != 1 {
            return Err(DomainError::InvalidWebhookSignature.into());
        }

        serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(
                target: "vitrina::billing::webhook",
                error = %e,
                "failed to parse webhook payload"
            );
            DomainError::InvalidWebhookPayload {
                message: "malformed JSON payload".to_string(),
            }
            .into()
        })
    }

    /// Process a verified event.
    ///
    /// Handles idempotency and routes to the per-event mapping.
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        if self.accounts.is_event_processed(&event.id).await? {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let outcome = match event.event_type.as_str() {
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.handle_subscription_updated(&event).await?
            }
            "customer.subscription.deleted" => self.handle_subscription_deleted(&event).await?,
            "invoice.payment_succeeded" | "invoice.paid" => {
                self.handle_invoice_outcome(&event, PaymentOutcome::Succeeded)
                    .await?
            }
            "invoice.payment_failed" => {
                self.handle_invoice_outcome(&event, PaymentOutcome::Failed)
                    .await?
            }
            // The subscription webhooks carry the actual state sync.
            "checkout.session.completed" => WebhookOutcome::Processed,
            _ => WebhookOutcome::Ignored,
        };

        if !matches!(outcome, WebhookOutcome::Ignored) {
            self.accounts.mark_event_processed(&event.id).await?;
        }

        Ok(outcome)
    }

    /// `customer.subscription.created` / `updated`: set the plan (from the
    /// price reference), subscription id, status, and period dates.
    async fn handle_subscription_updated(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let object = &event.data.object;
        let mut account = self.account_for_object(object).await?;

        let subscription_id = required_str(object, "id")?;
        let provider_status = object
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("active");

        let plan = self.plan_for_object(object)?;

        account.plan = plan.id.clone();
        account.subscription_id = Some(subscription_id.to_string());
        account.subscription_status = Some(match provider_status {
            "active" | "trialing" => SubscriptionStatus::Active,
            _ => SubscriptionStatus::Canceled,
        });
        account.subscription_start_date = timestamp_field(object, "current_period_start");
        account.subscription_end_date = timestamp_field(object, "current_period_end");
        account.subscription_canceled_at = None;
        account.updated_at = Utc::now();

        self.accounts.update_account(&account).await?;
        tracing::info!(
            target: "vitrina::billing::webhook",
            account_id = %account.id,
            plan = %plan.id,
            status = provider_status,
            "subscription synced"
        );
        Ok(WebhookOutcome::Processed)
    }

    /// `customer.subscription.deleted`: reset to the free plan, mark
    /// canceled. Limit enforcement follows at the next reconciliation.
    async fn handle_subscription_deleted(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let object = &event.data.object;
        let mut account = self.account_for_object(object).await?;

        match self.plans.free_plan() {
            Some(free) => account.plan = free.id,
            None => tracing::error!(
                target: "vitrina::billing::webhook",
                account_id = %account.id,
                "subscription deleted but no free plan configured; plan left unchanged"
            ),
        }
        account.subscription_status = Some(SubscriptionStatus::Canceled);
        account.subscription_canceled_at = Some(Utc::now());
        account.updated_at = Utc::now();

        self.accounts.update_account(&account).await?;
        tracing::info!(
            target: "vitrina::billing::webhook",
            account_id = %account.id,
            "subscription deleted, account reset to free plan"
        );
        Ok(WebhookOutcome::Processed)
    }

    /// Invoice payment events record the outcome and timestamp only; the
    /// plan is never changed here.
    async fn handle_invoice_outcome(
        &self,
        event: &WebhookEvent,
        outcome: PaymentOutcome,
    ) -> Result<WebhookOutcome> {
        let object = &event.data.object;
        let mut account = self.account_for_object(object).await?;

        account.last_payment_outcome = Some(outcome);
        account.last_payment_at = Some(Utc::now());
        account.updated_at = Utc::now();

        self.accounts.update_account(&account).await?;
        Ok(WebhookOutcome::Processed)
    }

    /// Find the account an event object belongs to: by billing-customer
    /// reference first, then by the account id carried in metadata.
    async fn account_for_object(&self, object: &serde_json::Value) -> Result<Account> {
        if let Some(customer_id) = object.get("customer").and_then(|v| v.as_str()) {
            if let Some(account) = self.accounts.find_by_stripe_customer(customer_id).await? {
                return Ok(account);
            }
        }

        let metadata_id = object
            .get("metadata")
            .and_then(|m| m.get("account_id").or_else(|| m.get("userId")))
            .and_then(|v| v.as_str())
            .ok_or_else(|| DomainError::InvalidWebhookPayload {
                message: "no resolvable account reference".to_string(),
            })?;
        let account_id = metadata_id
            .parse()
            .map_err(|_| DomainError::InvalidWebhookPayload {
                message: "malformed account id in metadata".to_string(),
            })?;
        let account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound {
                account_id: metadata_id.to_string(),
            })?;

        // Link the customer for future lookups.
        if let Some(customer_id) = object.get("customer").and_then(|v| v.as_str()) {
            if account.stripe_customer_id.is_none() {
                let mut linked = account.clone();
                linked.stripe_customer_id = Some(customer_id.to_string());
                self.accounts.update_account(&linked).await?;
                return Ok(linked);
            }
        }
        Ok(account)
    }

    /// Determine the plan: by the subscription item's price reference,
    /// falling back to the plan id carried in metadata.
    fn plan_for_object(&self, object: &serde_json::Value) -> Result<crate::plans::Plan> {
        let price_id = object
            .get("items")
            .and_then(|items| items.get("data"))
            .and_then(|data| data.as_array())
            .and_then(|data| data.first())
            .and_then(|item| item.get("price"))
            .and_then(|price| price.get("id"))
            .and_then(|id| id.as_str());

        if let Some(price_id) = price_id {
            if let Some(plan) = self.plans.plan_by_stripe_price(price_id) {
                return Ok(plan);
            }
        }

        let metadata_plan = object
            .get("metadata")
            .and_then(|m| m.get("plan_id").or_else(|| m.get("planId")))
            .and_then(|v| v.as_str());
        if let Some(plan_id) = metadata_plan {
            if let Some(plan) = self.plans.plan_by_id(plan_id) {
                return Ok(plan);
            }
        }

        Err(DomainError::InvalidWebhookPayload {
            message: "could not determine plan from subscription".to_string(),
        }
        .into())
    }
}

struct SignatureParts {
    timestamp: i64,
    signature: String,
}

/// Parse the `Stripe-Signature` header (`t=...,v1=...`).
fn parse_signature_header(header: &str) -> Result<SignatureParts> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            return Err(DomainError::InvalidWebhookPayload {
                message: "invalid signature header format".to_string(),
            }
            .into());
        };
        match key.trim() {
            "t" => timestamp = value.parse().ok(),
            "v1" => signature = Some(value.to_string()),
            // Other schemes are ignored.
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(timestamp), Some(signature)) => Ok(SignatureParts {
            timestamp,
            signature,
        }),
        _ => Err(DomainError::InvalidWebhookSignature.into()),
    }
}

/// HMAC-SHA256 over the signed payload.
fn compute_signature(secret: &str, payload: &[u8]) -> Result<Vec<u8>> {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| crate::error::VitrinaError::Internal("HMAC key error".to_string()))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn required_str<'a>(object: &'a serde_json::Value, key: &str) -> Result<&'a str> {
    object
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            DomainError::InvalidWebhookPayload {
                message: format!("missing field '{}'", key),
            }
            .into()
        })
}

fn timestamp_field(object: &serde_json::Value, key: &str) -> Option<DateTime<Utc>> {
    object
        .get(key)
        .and_then(|v| v.as_i64())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::InMemoryAccountStore;
    use crate::plans::{InMemoryPlanStore, Plan};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    const SECRET: &str = "whsec_test_secret";

    fn plan(id: &str, level: i32, is_free: bool, price: Option<&str>) -> Plan {
        Plan {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            price: Decimal::ZERO,
            max_stores: 1,
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

    async fn handler() -> (
        WebhookHandler<InMemoryAccountStore, InMemoryPlanStore>,
        InMemoryAccountStore,
    ) {
        let accounts = InMemoryAccountStore::new();
        let plan_store = InMemoryPlanStore::new();
        plan_store.seed_plans(vec![
            plan("gratuito", 1, true, None),
            plan("profesional", 3, false, Some("price_profesional")),
        ]);
        let plans = PlanCatalog::new(plan_store);
        plans.load_plans().await.unwrap();
        (
            WebhookHandler::new(accounts.clone(), plans, SECRET),
            accounts,
        )
    }

    fn sign(payload: &str, timestamp: i64, secret: &str) -> String {
        let signed = format!("{}.{}", timestamp, payload);
        let digest = compute_signature(secret, signed.as_bytes()).unwrap();
        format!("t={},v1={}", timestamp, hex::encode(digest))
    }

    fn subscription_event(
        event_id: &str,
        event_type: &str,
        customer: &str,
        account_id: Option<Uuid>,
    ) -> WebhookEvent {
        let mut object = serde_json::json!({
            "id": "sub_123",
            "customer": customer,
            "status": "active",
            "current_period_start": 1_700_000_000i64,
            "current_period_end": 1_702_592_000i64,
            "items": {"data": [{"price": {"id": "price_profesional"}}]},
        });
        if let Some(account_id) = account_id {
            object["metadata"] = serde_json::json!({"account_id": account_id.to_string()});
        }
        WebhookEvent {
            id: event_id.to_string(),
            event_type: event_type.to_string(),
            data: WebhookEventData { object },
            created: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn signature_verification_round_trip() {
        let (handler, _) = handler().await;
        let payload = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}},"created":1}"#;
        let now = Utc::now().timestamp();

        let event = handler
            .verify_signature(payload.as_bytes(), &sign(payload, now, SECRET))
            .unwrap();
        assert_eq!(event.id, "evt_1");

        // Wrong secret: rejected.
        assert!(handler
            .verify_signature(payload.as_bytes(), &sign(payload, now, "whsec_other"))
            .is_err());

        // Tampered payload: rejected.
        let tampered = payload.replace("evt_1", "evt_2");
        assert!(handler
            .verify_signature(tampered.as_bytes(), &sign(payload, now, SECRET))
            .is_err());

        // Stale timestamp: rejected.
        assert!(handler
            .verify_signature(payload.as_bytes(), &sign(payload, now - 3600, SECRET))
            .is_err());

        // Garbage header: rejected.
        assert!(handler.verify_signature(payload.as_bytes(), "nonsense").is_err());
    }

    #[tokio::test]
    async fn subscription_created_sets_plan_and_status() {
        let (handler, accounts) = handler().await;
        let account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "gratuito");
        accounts.insert_account(&account).await.unwrap();

        let event = subscription_event(
            "evt_1",
            "customer.subscription.created",
            "cus_abc",
            Some(account.id),
        );
        assert_eq!(
            handler.handle_event(event).await.unwrap(),
            WebhookOutcome::Processed
        );

        let stored = accounts.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.plan, "profesional");
        assert_eq!(stored.subscription_status, Some(SubscriptionStatus::Active));
        assert_eq!(stored.subscription_id.as_deref(), Some("sub_123"));
        assert!(stored.subscription_end_date.is_some());
        // The customer got linked for future lookups.
        assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_abc"));
    }

    #[tokio::test]
    async fn subscription_deleted_resets_to_free_plan() {
        let (handler, accounts) = handler().await;
        let mut account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "profesional");
        account.stripe_customer_id = Some("cus_abc".to_string());
        account.subscription_status = Some(SubscriptionStatus::Active);
        accounts.insert_account(&account).await.unwrap();

        let event = WebhookEvent {
            id: "evt_2".to_string(),
            event_type: "customer.subscription.deleted".to_string(),
            data: WebhookEventData {
                object: serde_json::json!({"id": "sub_123", "customer": "cus_abc"}),
            },
            created: 1_700_000_000,
        };
        handler.handle_event(event).await.unwrap();

        let stored = accounts.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.plan, "gratuito");
        assert_eq!(stored.subscription_status, Some(SubscriptionStatus::Canceled));
        assert!(stored.subscription_canceled_at.is_some());
    }

    #[tokio::test]
    async fn invoice_events_record_outcome_without_touching_plan() {
        let (handler, accounts) = handler().await;
        let mut account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "profesional");
        account.stripe_customer_id = Some("cus_abc".to_string());
        accounts.insert_account(&account).await.unwrap();

        let event = WebhookEvent {
            id: "evt_3".to_string(),
            event_type: "invoice.payment_failed".to_string(),
            data: WebhookEventData {
                object: serde_json::json!({"customer": "cus_abc"}),
            },
            created: 1_700_000_000,
        };
        handler.handle_event(event).await.unwrap();

        let stored = accounts.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.plan, "profesional");
        assert_eq!(stored.last_payment_outcome, Some(PaymentOutcome::Failed));
        assert!(stored.last_payment_at.is_some());
    }

    #[tokio::test]
    async fn events_are_idempotent_and_unknown_types_ignored() {
        let (handler, accounts) = handler().await;
        let account = Account::new(Uuid::new_v4(), "ana@example.com", "Ana", "gratuito");
        accounts.insert_account(&account).await.unwrap();

        let event = subscription_event(
            "evt_4",
            "customer.subscription.updated",
            "cus_abc",
            Some(account.id),
        );
        assert_eq!(
            handler.handle_event(event.clone()).await.unwrap(),
            WebhookOutcome::Processed
        );
        assert_eq!(
            handler.handle_event(event).await.unwrap(),
            WebhookOutcome::AlreadyProcessed
        );

        let unknown = WebhookEvent {
            id: "evt_5".to_string(),
            event_type: "customer.updated".to_string(),
            data: WebhookEventData {
                object: serde_json::json!({}),
            },
            created: 1,
        };
        assert_eq!(
            handler.handle_event(unknown).await.unwrap(),
            WebhookOutcome::Ignored
        );
    }
}
