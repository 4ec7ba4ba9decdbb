//! Drift detection and re-enforcement for one account.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::accounts::{Account, AccountStore, SubscriptionStatus};
use crate::catalog::CatalogStore;
use crate::enforcement::{EnforcementEngine, EnforcementReport};
use crate::error::Result;
use crate::notify::Notifier;
use crate::plans::{PlanCatalog, PlanStore};

/// The fields a reconciliation tick compares against the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub plan: String,
    pub subscription_status: Option<SubscriptionStatus>,
}

impl AccountSnapshot {
    #[must_use]
    pub fn of(account: &Account) -> Self {
        Self {
            plan: account.plan.clone(),
            subscription_status: account.subscription_status,
        }
    }
}

/// What a reconciliation tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No drift; nothing was written.
    NoChange,
    /// Drift was detected and handled.
    Reconciled {
        report: EnforcementReport,
        plan_changed: bool,
    },
    /// The account record no longer exists; the loop should stop.
    AccountGone,
}

/// Re-fetches account state, detects drift, and re-runs enforcement.
pub struct Reconciler<C, A, P>
where
    C: CatalogStore + Clone,
    A: AccountStore,
    P: PlanStore,
{
    accounts: A,
    plans: PlanCatalog<P>,
    engine: EnforcementEngine<C>,
    notifier: Arc<dyn Notifier>,
}

impl<C, A, P> Reconciler<C, A, P>
where
    C: CatalogStore + Clone,
    A: AccountStore,
    P: PlanStore,
{
    #[must_use]
    pub fn new(
        catalog: C,
        accounts: A,
        plans: PlanCatalog<P>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            accounts,
            plans,
            engine: EnforcementEngine::new(catalog),
            notifier,
        }
    }

    /// The plan catalog this reconciler reads from.
    #[must_use]
    pub fn plans(&self) -> &PlanCatalog<P> {
        &self.plans
    }

    /// Run one reconciliation pass for the account.
    ///
    /// Re-fetches the record, sweeps expired subscriptions, compares plan
    /// and subscription status against `snapshot`, and on any difference
    /// re-runs enforcement and updates the snapshot. Two back-to-back
    /// ticks with no intervening change produce zero writes on the second.
    pub async fn tick(
        &self,
        account_id: Uuid,
        snapshot: &mut AccountSnapshot,
    ) -> Result<TickOutcome> {
        let Some(mut account) = self.accounts.get_account(account_id).await? else {
            return Ok(TickOutcome::AccountGone);
        };

        // Expiry sweep: a subscription still reading active past its end
        // date is treated as canceled.
        let now = Utc::now();
        if account.subscription_expired(now) {
            tracing::info!(
                target: "vitrina::reconcile",
                account_id = %account.id,
                end_date = ?account.subscription_end_date,
                "subscription end date passed, expiring"
            );
            if let Some(free) = self.plans.free_plan() {
                account.plan = free.id.clone();
            }
            account.subscription_status = Some(SubscriptionStatus::Expired);
            account.updated_at = now;
            self.accounts.update_account(&account).await?;
        }

        // Dangling plan reference: persist the free-plan id back onto the
        // record so the next load resolves directly.
        if self.plans.resolved_via_fallback(&account) {
            if let Some(free) = self.plans.free_plan() {
                if account.plan != free.id {
                    match self.accounts.set_plan(account.id, &free.id).await {
                        Ok(()) => account.plan = free.id.clone(),
                        Err(err) => tracing::warn!(
                            target: "vitrina::reconcile",
                            account_id = %account.id,
                            error = %err,
                            "failed to persist free-plan fallback"
                        ),
                    }
                }
            }
        }

        let drifted = account.plan != snapshot.plan
            || account.subscription_status != snapshot.subscription_status;
        if !drifted {
            return Ok(TickOutcome::NoChange);
        }

        let plan_changed = account.plan != snapshot.plan;

        let report = match self.plans.resolve_for(&account) {
            Some(plan) => {
                let report = self.engine.enforce_account(account.id, &plan, None).await?;
                if plan_changed {
                    self.notifier.plan_changed(account.id, &plan.name);
                }
                report
            }
            None => {
                // No plan resolvable and no free plan configured; limits
                // cannot be derived, so leave collections untouched.
                tracing::error!(
                    target: "vitrina::reconcile",
                    account_id = %account.id,
                    plan = %account.plan,
                    "no plan resolvable, skipping enforcement"
                );
                EnforcementReport::default()
            }
        };

        *snapshot = AccountSnapshot::of(&account);
        Ok(TickOutcome::Reconciled {
            report,
            plan_changed,
        })
    }
}
