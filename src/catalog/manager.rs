//! Catalog management: create/update/delete with plan-limit prechecks.
//!
//! Every write path checks its limit before touching the store, so an
//! over-limit create is rejected without any partial write, and every
//! limit error names the ceiling and the plan so the caller can render an
//! upgrade prompt.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::accounts::Account;
use crate::enforcement::EnforcementEngine;
use crate::error::{DomainError, Result};
use crate::plans::{PlanCatalog, PlanStore, ResourceKind, default_limit};

use super::model::{Category, Product, Store, StoreStatus};
use super::storage::CatalogStore;

/// Request to create a store.
#[derive(Debug, Clone, Default)]
pub struct CreateStoreRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub whatsapp: Option<String>,
    pub currency: Option<String>,
}

/// Partial store update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateStoreRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub logo: Option<Option<String>>,
    pub whatsapp: Option<Option<String>>,
    pub currency: Option<String>,
    pub message_greeting: Option<String>,
    pub message_introduction: Option<String>,
    pub message_closing: Option<String>,
    pub accept_cash: Option<bool>,
    pub accept_bank_transfer: Option<bool>,
    pub allow_pickup: Option<bool>,
    pub allow_delivery: Option<bool>,
    pub delivery_cost: Option<Decimal>,
}

/// Request to create a category.
#[derive(Debug, Clone, Default)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
}

/// Request to create a product.
#[derive(Debug, Clone)]
pub struct CreateProductRequest {
    pub name: String,
    pub category_id: Option<Uuid>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub price: Decimal,
    pub main_image: Option<String>,
    pub gallery: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
}

impl Default for CreateProductRequest {
    fn default() -> Self {
        Self {
            name: String::new(),
            category_id: None,
            short_description: None,
            long_description: None,
            price: Decimal::ZERO,
            main_image: None,
            gallery: Vec::new(),
            is_active: true,
            is_featured: false,
        }
    }
}

/// Catalog operations for a signed-in account.
pub struct CatalogManager<C, P>
where
    C: CatalogStore + Clone,
    P: PlanStore,
{
    catalog: C,
    plans: PlanCatalog<P>,
    engine: EnforcementEngine<C>,
}

impl<C, P> CatalogManager<C, P>
where
    C: CatalogStore + Clone,
    P: PlanStore,
{
    #[must_use]
    pub fn new(catalog: C, plans: PlanCatalog<P>) -> Self {
        let engine = EnforcementEngine::new(catalog.clone());
        Self {
            catalog,
            plans,
            engine,
        }
    }

    fn limit_and_plan_name(&self, account: &Account, resource: ResourceKind) -> (u32, String) {
        match self.plans.resolve_for(account) {
            Some(plan) => (plan.limit_for(resource), plan.name),
            None => (default_limit(resource), "current".to_string()),
        }
    }

    async fn owned_store(&self, account: &Account, store_id: Uuid) -> Result<Store> {
        let store = self
            .catalog
            .get_store(store_id)
            .await?
            .ok_or_else(|| DomainError::StoreNotFound {
                store_id: store_id.to_string(),
            })?;
        if store.account_id != account.id {
            return Err(DomainError::NotOwner.into());
        }
        Ok(store)
    }

    // Stores

    /// Create a store, rejecting the request before any write when the
    /// account is at its active-store ceiling or the slug is taken.
    pub async fn create_store(
        &self,
        account: &Account,
        request: CreateStoreRequest,
    ) -> Result<Store> {
        let stores = self.catalog.list_stores(account.id).await?;
        let active_count = stores.iter().filter(|s| s.is_active()).count();
        let (limit, plan_name) = self.limit_and_plan_name(account, ResourceKind::Stores);
        if active_count as u32 >= limit {
            return Err(DomainError::LimitExceeded {
                resource: ResourceKind::Stores,
                limit,
                plan_name,
            }
            .into());
        }

        if self.catalog.get_store_by_slug(&request.slug).await?.is_some() {
            return Err(DomainError::SlugTaken { slug: request.slug }.into());
        }

        let mut store = Store::new(account.id, request.name, request.slug);
        store.description = request.description;
        store.logo = request.logo;
        store.whatsapp = request.whatsapp;
        if let Some(currency) = request.currency {
            store.currency = currency;
        }

        self.catalog.insert_store(&store).await?;
        tracing::info!(
            target: "vitrina::catalog",
            account_id = %account.id,
            store_id = %store.id,
            slug = %store.slug,
            "store created"
        );
        Ok(store)
    }

    /// Apply a partial update, re-checking slug uniqueness when the slug
    /// changes.
    pub async fn update_store(
        &self,
        account: &Account,
        store_id: Uuid,
        request: UpdateStoreRequest,
    ) -> Result<Store> {
        let mut store = self.owned_store(account, store_id).await?;

        if let Some(slug) = &request.slug {
            if *slug != store.slug {
                if let Some(existing) = self.catalog.get_store_by_slug(slug).await? {
                    if existing.id != store.id {
                        return Err(DomainError::SlugTaken { slug: slug.clone() }.into());
                    }
                }
                store.slug = slug.clone();
            }
        }
        if let Some(name) = request.name {
            store.name = name;
        }
        if let Some(description) = request.description {
            store.description = description;
        }
        if let Some(logo) = request.logo {
            store.logo = logo;
        }
        if let Some(whatsapp) = request.whatsapp {
            store.whatsapp = whatsapp;
        }
        if let Some(currency) = request.currency {
            store.currency = currency;
        }
        if let Some(greeting) = request.message_greeting {
            store.message_greeting = greeting;
        }
        if let Some(introduction) = request.message_introduction {
            store.message_introduction = introduction;
        }
        if let Some(closing) = request.message_closing {
            store.message_closing = closing;
        }
        if let Some(accept_cash) = request.accept_cash {
            store.accept_cash = accept_cash;
        }
        if let Some(accept_bank_transfer) = request.accept_bank_transfer {
            store.accept_bank_transfer = accept_bank_transfer;
        }
        if let Some(allow_pickup) = request.allow_pickup {
            store.allow_pickup = allow_pickup;
        }
        if let Some(allow_delivery) = request.allow_delivery {
            store.allow_delivery = allow_delivery;
        }
        if let Some(delivery_cost) = request.delivery_cost {
            store.delivery_cost = delivery_cost;
        }
        store.updated_at = chrono::Utc::now();

        self.catalog.update_store(&store).await?;
        Ok(store)
    }

    /// Delete a store. When an active store is removed and a suspended one
    /// exists, the oldest suspended store is reactivated into the freed
    /// slot; the reactivated store is returned.
    pub async fn delete_store(
        &self,
        account: &Account,
        store_id: Uuid,
    ) -> Result<Option<Store>> {
        let store = self.owned_store(account, store_id).await?;
        let was_active = store.is_active();

        self.catalog.delete_store(store_id).await?;
        tracing::info!(
            target: "vitrina::catalog",
            account_id = %account.id,
            store_id = %store_id,
            "store deleted"
        );

        if !was_active {
            return Ok(None);
        }

        // A slot opened up; bring back the oldest suspended store if the
        // ceiling allows it.
        let stores = self.catalog.list_stores(account.id).await?;
        let active_count = stores.iter().filter(|s| s.is_active()).count();
        let (limit, _) = self.limit_and_plan_name(account, ResourceKind::Stores);
        if active_count as u32 >= limit {
            return Ok(None);
        }

        let Some(suspended) = stores.iter().find(|s| s.status == StoreStatus::Suspended) else {
            return Ok(None);
        };
        let changed = self
            .catalog
            .set_store_status(suspended.id, StoreStatus::Suspended, StoreStatus::Active)
            .await?;
        if !changed {
            return Ok(None);
        }
        tracing::info!(
            target: "vitrina::catalog",
            store_id = %suspended.id,
            "suspended store reactivated into freed slot"
        );
        self.catalog.get_store(suspended.id).await
    }

    /// Suspend the given stores (the interactive keep/suspend flow).
    pub async fn suspend_stores(&self, account: &Account, store_ids: &[Uuid]) -> Result<usize> {
        let mut suspended = 0;
        for store_id in store_ids {
            self.owned_store(account, *store_id).await?;
            if self
                .catalog
                .set_store_status(*store_id, StoreStatus::Active, StoreStatus::Suspended)
                .await?
            {
                suspended += 1;
            }
        }
        Ok(suspended)
    }

    /// Reactivate a suspended store, guarded by the active-store ceiling.
    pub async fn reactivate_store(&self, account: &Account, store_id: Uuid) -> Result<Store> {
        self.owned_store(account, store_id).await?;
        let plan = self
            .plans
            .resolve_for(account)
            .ok_or_else(|| DomainError::PlanNotFound {
                plan_id: account.plan.clone(),
            })?;
        self.engine.reactivate_store(store_id, &plan).await
    }

    // Categories

    /// Create a category, rejected before any write at the per-store
    /// ceiling.
    pub async fn create_category(
        &self,
        account: &Account,
        store_id: Uuid,
        request: CreateCategoryRequest,
    ) -> Result<Category> {
        self.owned_store(account, store_id).await?;

        let categories = self.catalog.list_categories(store_id).await?;
        let active_count = categories.iter().filter(|c| c.is_active).count();
        let (limit, plan_name) = self.limit_and_plan_name(account, ResourceKind::Categories);
        if active_count as u32 >= limit {
            return Err(DomainError::LimitExceeded {
                resource: ResourceKind::Categories,
                limit,
                plan_name,
            }
            .into());
        }

        let mut category = Category::new(store_id, request.name.trim());
        category.description = request.description;
        category.sort_order = request.sort_order;

        self.catalog.insert_category(&category).await?;
        Ok(category)
    }

    pub async fn update_category(&self, account: &Account, category: Category) -> Result<Category> {
        self.owned_store(account, category.store_id).await?;
        let mut category = category;
        category.name = category.name.trim().to_string();
        self.catalog.update_category(&category).await?;
        Ok(category)
    }

    /// Delete a category, nulling the references its products hold first
    /// so no product is cascade-deleted.
    pub async fn delete_category(&self, account: &Account, category_id: Uuid) -> Result<()> {
        let category = self
            .catalog
            .get_category(category_id)
            .await?
            .ok_or_else(|| DomainError::CategoryNotFound {
                category_id: category_id.to_string(),
            })?;
        self.owned_store(account, category.store_id).await?;

        let cleared = self.catalog.clear_category_refs(category_id).await?;
        self.catalog.delete_category(category_id).await?;
        tracing::debug!(
            target: "vitrina::catalog",
            category_id = %category_id,
            products_cleared = cleared,
            "category deleted"
        );
        Ok(())
    }

    // Products

    /// Create a product, rejected before any write when activating it
    /// would exceed the per-store ceiling.
    pub async fn create_product(
        &self,
        account: &Account,
        store_id: Uuid,
        request: CreateProductRequest,
    ) -> Result<Product> {
        self.owned_store(account, store_id).await?;

        if request.price < Decimal::ZERO {
            return Err(DomainError::NegativePrice.into());
        }

        if request.is_active {
            let products = self.catalog.list_products(store_id).await?;
            let active_count = products.iter().filter(|p| p.is_active).count();
            let (limit, plan_name) = self.limit_and_plan_name(account, ResourceKind::Products);
            if active_count as u32 >= limit {
                return Err(DomainError::LimitExceeded {
                    resource: ResourceKind::Products,
                    limit,
                    plan_name,
                }
                .into());
            }
        }

        let mut product = Product::new(store_id, request.name.trim(), request.price);
        product.category_id = request.category_id;
        product.short_description = request.short_description;
        product.long_description = request.long_description;
        product.main_image = request.main_image;
        product.gallery = request.gallery;
        product.is_active = request.is_active;
        product.is_featured = request.is_featured;

        self.catalog.insert_product(&product).await?;
        Ok(product)
    }

    pub async fn update_product(&self, account: &Account, product: Product) -> Result<Product> {
        self.owned_store(account, product.store_id).await?;
        if product.price < Decimal::ZERO {
            return Err(DomainError::NegativePrice.into());
        }
        let mut product = product;
        product.updated_at = chrono::Utc::now();
        self.catalog.update_product(&product).await?;
        Ok(product)
    }

    pub async fn delete_product(&self, account: &Account, product_id: Uuid) -> Result<()> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;
        self.owned_store(account, product.store_id).await?;
        self.catalog.delete_product(product_id).await
    }

    /// Reactivate a deactivated product, guarded by the active-product
    /// ceiling.
    pub async fn reactivate_product(&self, account: &Account, product_id: Uuid) -> Result<Product> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;
        self.owned_store(account, product.store_id).await?;

        let plan = self
            .plans
            .resolve_for(account)
            .ok_or_else(|| DomainError::PlanNotFound {
                plan_id: account.plan.clone(),
            })?;
        self.engine.reactivate_product(product_id, &plan).await
    }
}
