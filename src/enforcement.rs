//! Plan-limit enforcement.
//!
//! Pure survivor selection plus an engine that applies it against the
//! catalog store. Enforcement only flips `status`/`is_active`; it never
//! deletes a store, category, or product. Selection is deterministic:
//! collections are sorted by creation time then id before choosing, so the
//! same inputs always yield the same survivors regardless of incoming
//! order.

use uuid::Uuid;

use crate::catalog::{CatalogStore, Category, Product, Store, StoreStatus};
use crate::error::{DomainError, Result};
use crate::plans::{Plan, ResourceKind};

/// Outcome of survivor selection over one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Items that stay active.
    pub survivors: Vec<Uuid>,
    /// Items to deactivate or suspend.
    pub excess: Vec<Uuid>,
}

impl Selection {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.excess.is_empty()
    }
}

/// Choose which active stores survive under `max_stores`.
///
/// The automatic path keeps the oldest-created stores. When the account
/// holder chose explicitly (the interactive flow), `keep` lists their
/// picks; those take the survivor slots first and any remaining slots fall
/// back to oldest-first.
#[must_use]
pub fn store_survivors(stores: &[Store], max_stores: u32, keep: Option<&[Uuid]>) -> Selection {
    let mut active: Vec<&Store> = stores.iter().filter(|s| s.is_active()).collect();
    active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    select(active.iter().map(|s| s.id), max_stores, keep)
}

/// Choose which active products survive under `max_products`.
/// The oldest-created products are kept.
#[must_use]
pub fn product_survivors(products: &[Product], max_products: u32) -> Selection {
    let mut active: Vec<&Product> = products.iter().filter(|p| p.is_active).collect();
    active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    select(active.iter().map(|p| p.id), max_products, None)
}

/// Choose which active categories survive under `max_categories`.
/// The oldest-created categories are kept.
#[must_use]
pub fn category_survivors(categories: &[Category], max_categories: u32) -> Selection {
    let mut active: Vec<&Category> = categories.iter().filter(|c| c.is_active).collect();
    active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    select(active.iter().map(|c| c.id), max_categories, None)
}

/// Split an ordered id sequence into survivors (first `max`, keep-listed
/// ids first) and excess.
fn select<I: Iterator<Item = Uuid>>(ordered: I, max: u32, keep: Option<&[Uuid]>) -> Selection {
    let ordered: Vec<Uuid> = ordered.collect();
    if ordered.len() <= max as usize {
        return Selection {
            survivors: ordered,
            excess: Vec::new(),
        };
    }

    let prioritized: Vec<Uuid> = match keep {
        Some(keep) => {
            // Keep-listed ids first (in creation order), the rest after.
            let (kept, rest): (Vec<Uuid>, Vec<Uuid>) =
                ordered.into_iter().partition(|id| keep.contains(id));
            kept.into_iter().chain(rest).collect()
        }
        None => ordered,
    };

    let mut survivors = prioritized;
    let excess = survivors.split_off(max as usize);
    Selection { survivors, excess }
}

/// What an enforcement pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforcementReport {
    pub stores_suspended: usize,
    pub products_deactivated: usize,
    pub categories_deactivated: usize,
}

impl EnforcementReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.stores_suspended == 0
            && self.products_deactivated == 0
            && self.categories_deactivated == 0
    }
}

/// Applies survivor selection against the catalog store.
///
/// Writes go through the store's compare-and-set methods: the collection
/// is read, survivors decided, and each status write re-checks that the
/// row still holds the status the selection was based on. A row changed by
/// a concurrent manual action is skipped, not overwritten.
pub struct EnforcementEngine<C: CatalogStore> {
    catalog: C,
}

impl<C: CatalogStore> EnforcementEngine<C> {
    #[must_use]
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Bring an account's stores, and each surviving store's products and
    /// categories, back under the plan's ceilings.
    ///
    /// Running this twice with no intervening change is a no-op.
    pub async fn enforce_account(
        &self,
        account_id: Uuid,
        plan: &Plan,
        keep_stores: Option<&[Uuid]>,
    ) -> Result<EnforcementReport> {
        let mut report = EnforcementReport::default();

        let stores = self.catalog.list_stores(account_id).await?;
        let selection = store_survivors(&stores, plan.max_stores, keep_stores);

        for store_id in &selection.excess {
            let changed = self
                .catalog
                .set_store_status(*store_id, StoreStatus::Active, StoreStatus::Suspended)
                .await?;
            if changed {
                report.stores_suspended += 1;
            } else {
                tracing::debug!(
                    target: "vitrina::enforcement",
                    store_id = %store_id,
                    "store status changed concurrently, skipping suspension"
                );
            }
        }

        for store_id in &selection.survivors {
            let store_report = self.enforce_store(*store_id, plan).await?;
            report.products_deactivated += store_report.products_deactivated;
            report.categories_deactivated += store_report.categories_deactivated;
        }

        if !report.is_noop() {
            tracing::info!(
                target: "vitrina::enforcement",
                account_id = %account_id,
                plan = %plan.id,
                stores_suspended = report.stores_suspended,
                products_deactivated = report.products_deactivated,
                categories_deactivated = report.categories_deactivated,
                "plan limits enforced"
            );
        }
        Ok(report)
    }

    /// Bring one store's active products and categories under the plan's
    /// per-store ceilings.
    pub async fn enforce_store(&self, store_id: Uuid, plan: &Plan) -> Result<EnforcementReport> {
        let mut report = EnforcementReport::default();

        let products = self.catalog.list_products(store_id).await?;
        for product_id in product_survivors(&products, plan.max_products).excess {
            if self
                .catalog
                .set_product_active(product_id, true, false)
                .await?
            {
                report.products_deactivated += 1;
            }
        }

        let categories = self.catalog.list_categories(store_id).await?;
        for category_id in category_survivors(&categories, plan.max_categories).excess {
            if self
                .catalog
                .set_category_active(category_id, true, false)
                .await?
            {
                report.categories_deactivated += 1;
            }
        }

        Ok(report)
    }

    /// Reactivate a suspended store, rejecting the request when the
    /// account is already at its active-store ceiling.
    ///
    /// The count is re-read immediately before the write and the write
    /// itself re-checks the suspended status, so neither a stale read nor
    /// a concurrent flip can push the count past the ceiling.
    pub async fn reactivate_store(&self, store_id: Uuid, plan: &Plan) -> Result<Store> {
        let store = self
            .catalog
            .get_store(store_id)
            .await?
            .ok_or_else(|| DomainError::StoreNotFound {
                store_id: store_id.to_string(),
            })?;

        let stores = self.catalog.list_stores(store.account_id).await?;
        let active_count = stores.iter().filter(|s| s.is_active()).count();
        if active_count as u32 >= plan.max_stores {
            return Err(DomainError::LimitExceeded {
                resource: ResourceKind::Stores,
                limit: plan.max_stores,
                plan_name: plan.name.clone(),
            }
            .into());
        }

        let changed = self
            .catalog
            .set_store_status(store_id, StoreStatus::Suspended, StoreStatus::Active)
            .await?;
        if !changed {
            return Err(DomainError::ConcurrentModification {
                entity: format!("store {}", store_id),
            }
            .into());
        }

        self.catalog
            .get_store(store_id)
            .await?
            .ok_or_else(|| DomainError::StoreNotFound {
                store_id: store_id.to_string(),
            })
            .map_err(Into::into)
    }

    /// Reactivate a deactivated product, rejecting the request when the
    /// store is already at its active-product ceiling.
    pub async fn reactivate_product(&self, product_id: Uuid, plan: &Plan) -> Result<Product> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;

        let products = self.catalog.list_products(product.store_id).await?;
        let active_count = products.iter().filter(|p| p.is_active).count();
        if active_count as u32 >= plan.max_products {
            return Err(DomainError::LimitExceeded {
                resource: ResourceKind::Products,
                limit: plan.max_products,
                plan_name: plan.name.clone(),
            }
            .into());
        }

        let changed = self
            .catalog
            .set_product_active(product_id, false, true)
            .await?;
        if !changed {
            return Err(DomainError::ConcurrentModification {
                entity: format!("product {}", product_id),
            }
            .into());
        }

        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound {
                product_id: product_id.to_string(),
            })
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalogStore;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn store_created_at(account_id: Uuid, slug: &str, minutes_ago: i64) -> Store {
        let mut store = Store::new(account_id, slug, slug);
        store.created_at = Utc::now() - Duration::minutes(minutes_ago);
        store
    }

    fn product_created_at(store_id: Uuid, name: &str, minutes_ago: i64) -> Product {
        let mut product = Product::new(store_id, name, Decimal::new(100, 2));
        product.created_at = Utc::now() - Duration::minutes(minutes_ago);
        product
    }

    #[test]
    fn store_survivors_keep_oldest_by_default() {
        let account_id = Uuid::new_v4();
        let oldest = store_created_at(account_id, "a", 30);
        let middle = store_created_at(account_id, "b", 20);
        let newest = store_created_at(account_id, "c", 10);

        let selection = store_survivors(
            &[newest.clone(), oldest.clone(), middle.clone()],
            1,
            None,
        );
        assert_eq!(selection.survivors, vec![oldest.id]);
        assert_eq!(selection.excess, vec![middle.id, newest.id]);
    }

    #[test]
    fn store_survivors_honor_explicit_keep_set() {
        let account_id = Uuid::new_v4();
        let oldest = store_created_at(account_id, "a", 30);
        let newest = store_created_at(account_id, "b", 10);

        let keep = [newest.id];
        let selection = store_survivors(&[oldest.clone(), newest.clone()], 1, Some(&keep));
        assert_eq!(selection.survivors, vec![newest.id]);
        assert_eq!(selection.excess, vec![oldest.id]);
    }

    #[test]
    fn store_survivors_ignore_non_active() {
        let account_id = Uuid::new_v4();
        let mut suspended = store_created_at(account_id, "a", 30);
        suspended.status = StoreStatus::Suspended;
        let active = store_created_at(account_id, "b", 10);

        let selection = store_survivors(&[suspended, active.clone()], 1, None);
        assert_eq!(selection.survivors, vec![active.id]);
        assert!(selection.is_noop());
    }

    #[test]
    fn product_survivors_are_order_independent() {
        let store_id = Uuid::new_v4();
        let products: Vec<Product> = (0..5)
            .map(|i| product_created_at(store_id, &format!("p{}", i), 100 - i))
            .collect();

        let forward = product_survivors(&products, 3);
        let mut reversed = products.clone();
        reversed.reverse();
        let backward = product_survivors(&reversed, 3);

        assert_eq!(forward, backward);
        // Oldest three kept.
        assert_eq!(
            forward.survivors,
            vec![products[0].id, products[1].id, products[2].id]
        );
        assert_eq!(forward.excess, vec![products[3].id, products[4].id]);
    }

    #[test]
    fn identical_timestamps_tie_break_on_id() {
        let store_id = Uuid::new_v4();
        let at = Utc::now();
        let mut products: Vec<Product> = (0..4)
            .map(|i| {
                let mut p = Product::new(store_id, format!("p{}", i), Decimal::ZERO);
                p.created_at = at;
                p
            })
            .collect();

        let first = product_survivors(&products, 2);
        products.rotate_left(2);
        let second = product_survivors(&products, 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn enforce_account_scenario_downgrade() {
        // Pro (3 stores) downgraded to Free (1 store): the 2 newest are
        // suspended, the oldest stays, nothing is deleted.
        let catalog = InMemoryCatalogStore::new();
        let account_id = Uuid::new_v4();
        let oldest = store_created_at(account_id, "a", 30);
        let middle = store_created_at(account_id, "b", 20);
        let newest = store_created_at(account_id, "c", 10);
        for store in [&oldest, &middle, &newest] {
            catalog.insert_store(store).await.unwrap();
        }

        let engine = EnforcementEngine::new(catalog.clone());
        let plan = test_plan(1, 10, 3);
        let report = engine
            .enforce_account(account_id, &plan, None)
            .await
            .unwrap();
        assert_eq!(report.stores_suspended, 2);

        let stores = catalog.list_stores(account_id).await.unwrap();
        assert_eq!(stores.len(), 3);
        assert_eq!(
            stores.iter().filter(|s| s.is_active()).count(),
            1
        );
        assert!(catalog.get_store(oldest.id).await.unwrap().unwrap().is_active());

        // Second run with no intervening change: no writes.
        let second = engine
            .enforce_account(account_id, &plan, None)
            .await
            .unwrap();
        assert!(second.is_noop());
    }

    #[tokio::test]
    async fn enforce_store_deactivates_newest_products() {
        // Free plan (10 products), 12 active: the 2 newest are turned off.
        let catalog = InMemoryCatalogStore::new();
        let account_id = Uuid::new_v4();
        let store = store_created_at(account_id, "tienda", 60);
        catalog.insert_store(&store).await.unwrap();

        let products: Vec<Product> = (0..12)
            .map(|i| product_created_at(store.id, &format!("p{}", i), 120 - i))
            .collect();
        for product in &products {
            catalog.insert_product(product).await.unwrap();
        }

        let engine = EnforcementEngine::new(catalog.clone());
        let report = engine.enforce_store(store.id, &test_plan(1, 10, 3)).await.unwrap();
        assert_eq!(report.products_deactivated, 2);

        let after = catalog.list_products(store.id).await.unwrap();
        assert_eq!(after.len(), 12);
        assert_eq!(after.iter().filter(|p| p.is_active).count(), 10);
        // The 10 oldest remain active.
        for product in &after[..10] {
            assert!(product.is_active);
        }
        for product in &after[10..] {
            assert!(!product.is_active);
        }
    }

    #[tokio::test]
    async fn reactivation_rejected_at_ceiling() {
        let catalog = InMemoryCatalogStore::new();
        let account_id = Uuid::new_v4();
        let active = store_created_at(account_id, "activa", 30);
        let mut suspended = store_created_at(account_id, "suspendida", 20);
        suspended.status = StoreStatus::Suspended;
        catalog.insert_store(&active).await.unwrap();
        catalog.insert_store(&suspended).await.unwrap();

        let engine = EnforcementEngine::new(catalog.clone());
        let err = engine
            .reactivate_store(suspended.id, &test_plan(1, 10, 3))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("limit of 1"));

        // Nothing mutated.
        let store = catalog.get_store(suspended.id).await.unwrap().unwrap();
        assert_eq!(store.status, StoreStatus::Suspended);

        // With headroom the same call succeeds.
        let reactivated = engine
            .reactivate_store(suspended.id, &test_plan(2, 10, 3))
            .await
            .unwrap();
        assert!(reactivated.is_active());
    }

    #[tokio::test]
    async fn product_reactivation_guard() {
        let catalog = InMemoryCatalogStore::new();
        let store = Store::new(Uuid::new_v4(), "Tienda", "tienda");
        catalog.insert_store(&store).await.unwrap();

        let active = product_created_at(store.id, "activo", 20);
        let mut inactive = product_created_at(store.id, "apagado", 10);
        inactive.is_active = false;
        catalog.insert_product(&active).await.unwrap();
        catalog.insert_product(&inactive).await.unwrap();

        let engine = EnforcementEngine::new(catalog.clone());
        let err = engine
            .reactivate_product(inactive.id, &test_plan(1, 1, 3))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("limit of 1"));
        assert!(!catalog.get_product(inactive.id).await.unwrap().unwrap().is_active);

        let ok = engine
            .reactivate_product(inactive.id, &test_plan(1, 2, 3))
            .await
            .unwrap();
        assert!(ok.is_active);
    }

    fn test_plan(max_stores: u32, max_products: u32, max_categories: u32) -> Plan {
        Plan {
            id: "test".to_string(),
            name: "Free".to_string(),
            description: None,
            price: Decimal::ZERO,
            max_stores,
            max_products,
            max_categories,
            features: Vec::new(),
            is_active: true,
            is_free: true,
            level: 1,
            stripe_price_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
