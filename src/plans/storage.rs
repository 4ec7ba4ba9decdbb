//! Storage trait for plan data.
//!
//! The backing store is an external relational database reached over a
//! network API; implement this trait against it. An in-memory
//! implementation backs the test-suite.

use async_trait::async_trait;

use crate::error::Result;

use super::model::Plan;

/// Read access to the plans table.
///
/// Plans are written only by an administrative actor outside this core.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// All plans flagged active, ordered by ascending level.
    async fn list_active_plans(&self) -> Result<Vec<Plan>>;

    /// Get a plan by ID (active or not).
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>>;
}

/// In-memory plan store.
///
/// Used by the test-suite and for prototyping. Wraps data in `Arc` for
/// cheap cloning.
#[derive(Default, Clone)]
pub struct InMemoryPlanStore {
    inner: std::sync::Arc<std::sync::RwLock<Vec<Plan>>>,
}

impl InMemoryPlanStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored plan set.
    pub fn seed_plans(&self, plans: Vec<Plan>) {
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *store = plans;
    }

    /// Insert or replace a single plan.
    pub fn upsert_plan(&self, plan: Plan) {
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = store.iter_mut().find(|p| p.id == plan.id) {
            *existing = plan;
        } else {
            store.push(plan);
        }
    }

    /// Remove a plan by id.
    pub fn remove_plan(&self, plan_id: &str) {
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        store.retain(|p| p.id != plan_id);
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn list_active_plans(&self) -> Result<Vec<Plan>> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut active: Vec<Plan> = store.iter().filter(|p| p.is_active).cloned().collect();
        active.sort_by_key(|p| p.level);
        Ok(active)
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(store.iter().find(|p| p.id == plan_id).cloned())
    }
}
