//! Administrative synchronization operations.
//!
//! The super-admin surface mutates accounts directly (plan changes, status
//! changes, deletion) and re-runs enforcement afterwards. Every action is
//! recorded through an audit logger.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::{AccountStore, SubscriptionStatus};
use crate::catalog::CatalogStore;
use crate::enforcement::{EnforcementEngine, EnforcementReport};
use crate::error::{DomainError, Result};
use crate::plans::{PlanCatalog, PlanStore};

/// Paid subscriptions activated by an admin run for 30 days.
const ADMIN_SUBSCRIPTION_DAYS: i64 = 30;

/// A recorded administrative action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub admin_id: Option<String>,
    pub action: String,
    pub object_type: String,
    pub object_id: String,
    pub details: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// Sink for administrative audit events.
pub trait AuditLogger: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Audit logger that writes through `tracing`.
#[derive(Default)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(
            target: "vitrina::admin::audit",
            admin_id = ?event.admin_id,
            action = %event.action,
            object_type = %event.object_type,
            object_id = %event.object_id,
            details = %event.details,
            "admin action"
        );
    }
}

/// Audit logger that discards everything.
#[derive(Default)]
pub struct NoOpAuditLogger;

impl AuditLogger for NoOpAuditLogger {
    fn record(&self, _event: &AuditEvent) {}
}

/// Administrative account mutations.
pub struct AdminSync<C, A, P>
where
    C: CatalogStore + Clone,
    A: AccountStore,
    P: PlanStore,
{
    catalog: C,
    accounts: A,
    plans: PlanCatalog<P>,
    engine: EnforcementEngine<C>,
    audit: Arc<dyn AuditLogger>,
}

impl<C, A, P> AdminSync<C, A, P>
where
    C: CatalogStore + Clone,
    A: AccountStore,
    P: PlanStore,
{
    #[must_use]
    pub fn new(catalog: C, accounts: A, plans: PlanCatalog<P>, audit: Arc<dyn AuditLogger>) -> Self {
        let engine = EnforcementEngine::new(catalog.clone());
        Self {
            catalog,
            accounts,
            plans,
            engine,
            audit,
        }
    }

    /// Move an account onto a plan.
    ///
    /// A paid plan activates the subscription for 30 days; the free plan
    /// cancels it. Enforcement runs immediately so the account's catalog
    /// respects the new ceilings without waiting for the next poll.
    pub async fn update_user_plan(
        &self,
        account_id: Uuid,
        plan_id: &str,
        admin_id: Option<&str>,
    ) -> Result<EnforcementReport> {
        // Validate against the backing store, not the cache; an admin may
        // have just created the plan.
        let plan = self
            .plans_store_get(plan_id)
            .await?
            .ok_or_else(|| DomainError::PlanNotFound {
                plan_id: plan_id.to_string(),
            })?;

        let mut account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;
        let old_plan = account.plan.clone();

        let now = Utc::now();
        account.plan = plan.id.clone();
        if plan.is_free {
            account.subscription_status = Some(SubscriptionStatus::Canceled);
            account.subscription_canceled_at = Some(now);
        } else {
            account.subscription_status = Some(SubscriptionStatus::Active);
            account.subscription_start_date = Some(now);
            account.subscription_end_date = Some(now + Duration::days(ADMIN_SUBSCRIPTION_DAYS));
            account.subscription_canceled_at = None;
        }
        account.updated_at = now;
        self.accounts.update_account(&account).await?;

        let report = self.engine.enforce_account(account_id, &plan, None).await?;

        self.audit.record(&AuditEvent {
            admin_id: admin_id.map(String::from),
            action: "update_user_plan".to_string(),
            object_type: "user".to_string(),
            object_id: account_id.to_string(),
            details: serde_json::json!({
                "old_plan": old_plan,
                "new_plan": plan.id,
                "user_email": account.email,
            }),
            at: now,
        });
        Ok(report)
    }

    /// Set subscription status (and optionally the end date) directly.
    pub async fn update_user_status(
        &self,
        account_id: Uuid,
        status: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
        admin_id: Option<&str>,
    ) -> Result<()> {
        let mut account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;

        account.subscription_status = Some(status);
        if let Some(end_date) = end_date {
            account.subscription_end_date = Some(end_date);
        }
        account.updated_at = Utc::now();
        self.accounts.update_account(&account).await?;

        self.audit.record(&AuditEvent {
            admin_id: admin_id.map(String::from),
            action: "update_user_status".to_string(),
            object_type: "user".to_string(),
            object_id: account_id.to_string(),
            details: serde_json::json!({
                "subscription_status": status.as_str(),
                "subscription_end_date": end_date,
            }),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Delete an account and its stores.
    ///
    /// This is the administrative path; enforcement itself never deletes.
    pub async fn delete_user(&self, account_id: Uuid, admin_id: Option<&str>) -> Result<()> {
        let account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;

        for store in self.catalog.list_stores(account_id).await? {
            self.catalog.delete_store(store.id).await?;
        }
        self.accounts.delete_account(account_id).await?;

        self.audit.record(&AuditEvent {
            admin_id: admin_id.map(String::from),
            action: "delete_user".to_string(),
            object_type: "user".to_string(),
            object_id: account_id.to_string(),
            details: serde_json::json!({
                "deleted_user_email": account.email,
                "deleted_user_plan": account.plan,
            }),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Record a plan create/update/delete action.
    ///
    /// Plans themselves are managed in the backing store by the admin
    /// surface; this core only audits the action and relies on the plans
    /// change notification to reload caches.
    pub fn log_plan_action(
        &self,
        action: &str,
        plan_id: Option<&str>,
        details: serde_json::Value,
        admin_id: Option<&str>,
    ) {
        self.audit.record(&AuditEvent {
            admin_id: admin_id.map(String::from),
            action: action.to_string(),
            object_type: "plan".to_string(),
            object_id: plan_id.unwrap_or("unknown").to_string(),
            details,
            at: Utc::now(),
        });
    }

    async fn plans_store_get(&self, plan_id: &str) -> Result<Option<crate::plans::Plan>> {
        // Prefer the cache, fall back to a direct read for plans created
        // since the last reload.
        if let Some(plan) = self.plans.plan_by_id(plan_id) {
            return Ok(Some(plan));
        }
        self.plans.store().get_plan(plan_id).await
    }
}
