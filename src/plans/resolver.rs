//! Plan resolution for accounts.
//!
//! An account's `plan` field references a plan by id or, for legacy
//! records, by name. Resolution degrades to the free plan rather than
//! failing, and read-only limit queries fall back to conservative
//! defaults when nothing resolves at all.

use crate::accounts::Account;

use super::catalog::PlanCatalog;
use super::model::{Plan, ResourceKind};
use super::storage::PlanStore;

/// Conservative store ceiling when no plan resolves.
pub const DEFAULT_MAX_STORES: u32 = 1;
/// Conservative per-store product ceiling when no plan resolves.
pub const DEFAULT_MAX_PRODUCTS: u32 = 10;
/// Conservative per-store category ceiling when no plan resolves.
pub const DEFAULT_MAX_CATEGORIES: u32 = 3;

/// The conservative default ceiling for a resource kind.
#[must_use]
pub fn default_limit(resource: ResourceKind) -> u32 {
    match resource {
        ResourceKind::Stores => DEFAULT_MAX_STORES,
        ResourceKind::Products => DEFAULT_MAX_PRODUCTS,
        ResourceKind::Categories => DEFAULT_MAX_CATEGORIES,
    }
}

impl<P: PlanStore> PlanCatalog<P> {
    /// Resolve the plan for an account.
    ///
    /// Exact id match, then case-insensitive name match, then the free
    /// plan. `None` only when the account's reference is dangling and no
    /// free plan is configured.
    #[must_use]
    pub fn resolve_for(&self, account: &Account) -> Option<Plan> {
        self.plan_by_id(&account.plan)
            .or_else(|| self.plan_by_name_ci(&account.plan))
            .or_else(|| self.free_plan())
    }

    /// Whether the account's stored plan reference failed to resolve
    /// directly and fell through to the free plan.
    ///
    /// Callers reloading account data use this to persist the free-plan id
    /// back onto the record.
    #[must_use]
    pub fn resolved_via_fallback(&self, account: &Account) -> bool {
        self.plan_by_id(&account.plan).is_none() && self.plan_by_name_ci(&account.plan).is_none()
    }

    /// The resource ceiling for an account (read-only query).
    ///
    /// Falls back to the conservative defaults when no plan resolves so
    /// callers can degrade gracefully; write paths must not rely on this.
    #[must_use]
    pub fn max_limit_for(&self, account: &Account, resource: ResourceKind) -> u32 {
        match self.resolve_for(account) {
            Some(plan) => plan.limit_for(resource),
            None => default_limit(resource),
        }
    }

    /// Whether the account may create another store.
    #[must_use]
    pub fn can_create_store(&self, account: &Account, active_store_count: usize) -> bool {
        (active_store_count as u32) < self.max_limit_for(account, ResourceKind::Stores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Account;
    use crate::plans::storage::InMemoryPlanStore;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn plan(id: &str, name: &str, level: i32, is_free: bool, max_stores: u32) -> Plan {
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
            stripe_price_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn account_on(plan: &str) -> Account {
        Account::new(Uuid::new_v4(), "ana@example.com", "Ana", plan)
    }

    async fn catalog(plans: Vec<Plan>) -> PlanCatalog<InMemoryPlanStore> {
        let store = InMemoryPlanStore::new();
        store.seed_plans(plans);
        let catalog = PlanCatalog::new(store);
        catalog.load_plans().await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn resolves_by_id_then_name_then_free() {
        let catalog = catalog(vec![
            plan("gratuito", "Gratuito", 1, true, 1),
            plan("profesional", "Profesional", 3, false, 5),
        ])
        .await;

        // Exact id.
        let resolved = catalog.resolve_for(&account_on("profesional")).unwrap();
        assert_eq!(resolved.id, "profesional");

        // Legacy name, case-insensitive.
        let resolved = catalog.resolve_for(&account_on("Profesional")).unwrap();
        assert_eq!(resolved.id, "profesional");

        // Dangling reference falls back to the free plan, never panics.
        let dangling = account_on("plan-borrado");
        assert!(catalog.resolved_via_fallback(&dangling));
        let resolved = catalog.resolve_for(&dangling).unwrap();
        assert_eq!(resolved.id, "gratuito");
    }

    #[tokio::test]
    async fn conservative_defaults_when_nothing_resolves() {
        // No free plan configured at all.
        let catalog = catalog(vec![plan("profesional", "Profesional", 3, false, 5)]).await;
        let account = account_on("plan-borrado");

        assert!(catalog.resolve_for(&account).is_none());
        assert_eq!(catalog.max_limit_for(&account, ResourceKind::Stores), 1);
        assert_eq!(catalog.max_limit_for(&account, ResourceKind::Products), 10);
        assert_eq!(catalog.max_limit_for(&account, ResourceKind::Categories), 3);
    }

    #[tokio::test]
    async fn can_create_store_checks_ceiling() {
        let catalog = catalog(vec![plan("gratuito", "Gratuito", 1, true, 1)]).await;
        let account = account_on("gratuito");

        assert!(catalog.can_create_store(&account, 0));
        assert!(!catalog.can_create_store(&account, 1));
        assert!(!catalog.can_create_store(&account, 2));
    }
}
