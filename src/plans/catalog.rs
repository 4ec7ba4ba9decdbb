//! Cached plan catalog.
//!
//! Mirrors the set of active plans from the backing store. Reloaded on
//! session initialization, immediately before registration, and whenever
//! the plans table emits a change notification.

use std::sync::{Arc, RwLock};

use crate::error::Result;

use super::model::Plan;
use super::storage::PlanStore;

/// Process-wide cache of active plans.
///
/// Cheaply cloneable; all clones share one cached set. The single writer
/// is whichever component issues [`load_plans`](Self::load_plans); readers
/// take snapshots.
pub struct PlanCatalog<P: PlanStore> {
    inner: Arc<PlanCatalogInner<P>>,
}

impl<P: PlanStore> Clone for PlanCatalog<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PlanCatalogInner<P: PlanStore> {
    store: P,
    // Active plans ordered by ascending level.
    cache: RwLock<Vec<Plan>>,
}

impl<P: PlanStore> PlanCatalog<P> {
    #[must_use]
    pub fn new(store: P) -> Self {
        Self {
            inner: Arc::new(PlanCatalogInner {
                store,
                cache: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Fetch all active plans and replace the cached set.
    ///
    /// On fetch failure the previous cache is left intact
    /// (stale-but-available beats empty) and the error is returned for the
    /// caller to log or propagate.
    pub async fn load_plans(&self) -> Result<usize> {
        let plans = match self.inner.store.list_active_plans().await {
            Ok(plans) => plans,
            Err(err) => {
                tracing::warn!(
                    target: "vitrina::plans",
                    error = %err,
                    "plan reload failed, keeping previous cache"
                );
                return Err(err);
            }
        };

        if plans.is_empty() {
            tracing::warn!(target: "vitrina::plans", "no active plans found in backing store");
        }

        let count = plans.len();
        let mut cache = self.inner.cache.write().unwrap_or_else(|e| e.into_inner());
        *cache = plans;
        tracing::debug!(target: "vitrina::plans", count, "plan catalog reloaded");
        Ok(count)
    }

    /// The backing plan store, for reads that must bypass the cache.
    #[must_use]
    pub fn store(&self) -> &P {
        &self.inner.store
    }

    /// Snapshot of the cached plans, ordered by ascending level.
    #[must_use]
    pub fn plans(&self) -> Vec<Plan> {
        self.inner
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The single active free plan.
    ///
    /// Returns `None` when zero or more than one active plan is flagged
    /// free; that is a data-integrity condition and guessing which one is
    /// authoritative would be worse than reporting "no free plan".
    #[must_use]
    pub fn free_plan(&self) -> Option<Plan> {
        let cache = self.inner.cache.read().unwrap_or_else(|e| e.into_inner());
        let mut free = cache.iter().filter(|p| p.is_free && p.is_active);
        match (free.next(), free.next()) {
            (Some(plan), None) => Some(plan.clone()),
            (Some(_), Some(_)) => {
                tracing::error!(
                    target: "vitrina::plans",
                    "multiple active plans flagged free; treating as no free plan"
                );
                None
            }
            (None, _) => None,
        }
    }

    /// The active plan at the given ordinal level.
    #[must_use]
    pub fn plan_by_level(&self, level: i32) -> Option<Plan> {
        let cache = self.inner.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.iter().find(|p| p.level == level && p.is_active).cloned()
    }

    /// Look up a plan by exact ID.
    #[must_use]
    pub fn plan_by_id(&self, plan_id: &str) -> Option<Plan> {
        let cache = self.inner.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.iter().find(|p| p.id == plan_id).cloned()
    }

    /// Look up a plan by case-insensitive name (legacy account records
    /// reference plans by name).
    #[must_use]
    pub fn plan_by_name_ci(&self, name: &str) -> Option<Plan> {
        let cache = self.inner.cache.read().unwrap_or_else(|e| e.into_inner());
        cache
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Look up a plan by its payment-provider price reference.
    #[must_use]
    pub fn plan_by_stripe_price(&self, price_id: &str) -> Option<Plan> {
        let cache = self.inner.cache.read().unwrap_or_else(|e| e.into_inner());
        cache
            .iter()
            .find(|p| p.stripe_price_id.as_deref() == Some(price_id))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
