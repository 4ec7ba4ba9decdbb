//! Storage trait for catalog data.
//!
//! Status flips go through compare-and-set methods: the caller states the
//! status it last observed and the write fails when that no longer holds,
//! which is the mitigation for enforcement racing a concurrent manual
//! action. The backing store's per-row update is the only serialization
//! point.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

use super::model::{Category, Product, Store, StoreStatus};

/// Read/write access to stores, categories, and products.
///
/// Listing methods return rows ordered by creation time ascending, id
/// ascending on ties; implementations must sort explicitly because the
/// backing store does not guarantee stable ordering across calls.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Stores

    async fn get_store(&self, store_id: Uuid) -> Result<Option<Store>>;

    async fn get_store_by_slug(&self, slug: &str) -> Result<Option<Store>>;

    async fn list_stores(&self, account_id: Uuid) -> Result<Vec<Store>>;

    async fn insert_store(&self, store: &Store) -> Result<()>;

    async fn update_store(&self, store: &Store) -> Result<()>;

    /// Remove a store and its categories and products. Only explicit user
    /// or administrative deletion calls this; enforcement never does.
    async fn delete_store(&self, store_id: Uuid) -> Result<()>;

    /// Set a store's status only if it still has the expected one.
    /// Returns `Ok(false)` when the precondition no longer holds.
    async fn set_store_status(
        &self,
        store_id: Uuid,
        expected: StoreStatus,
        next: StoreStatus,
    ) -> Result<bool>;

    // Categories

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>>;

    async fn list_categories(&self, store_id: Uuid) -> Result<Vec<Category>>;

    async fn insert_category(&self, category: &Category) -> Result<()>;

    async fn update_category(&self, category: &Category) -> Result<()>;

    async fn delete_category(&self, category_id: Uuid) -> Result<()>;

    /// Set a category's active flag only if it still has the expected one.
    async fn set_category_active(
        &self,
        category_id: Uuid,
        expected: bool,
        next: bool,
    ) -> Result<bool>;

    /// Null every product reference to a category. Returns how many
    /// products were touched.
    async fn clear_category_refs(&self, category_id: Uuid) -> Result<usize>;

    // Products

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>>;

    async fn list_products(&self, store_id: Uuid) -> Result<Vec<Product>>;

    async fn insert_product(&self, product: &Product) -> Result<()>;

    async fn update_product(&self, product: &Product) -> Result<()>;

    async fn delete_product(&self, product_id: Uuid) -> Result<()>;

    /// Set a product's active flag only if it still has the expected one.
    async fn set_product_active(
        &self,
        product_id: Uuid,
        expected: bool,
        next: bool,
    ) -> Result<bool>;
}

/// In-memory catalog store.
///
/// Used by the test-suite and for prototyping. Wraps data in `Arc` for
/// cheap cloning.
#[derive(Default, Clone)]
pub struct InMemoryCatalogStore {
    inner: std::sync::Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    stores: std::sync::RwLock<std::collections::HashMap<Uuid, Store>>,
    categories: std::sync::RwLock<std::collections::HashMap<Uuid, Category>>,
    products: std::sync::RwLock<std::collections::HashMap<Uuid, Product>>,
}

impl InMemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_store(&self, store_id: Uuid) -> Result<Option<Store>> {
        let stores = self.inner.stores.read().unwrap_or_else(|e| e.into_inner());
        Ok(stores.get(&store_id).cloned())
    }

    async fn get_store_by_slug(&self, slug: &str) -> Result<Option<Store>> {
        let stores = self.inner.stores.read().unwrap_or_else(|e| e.into_inner());
        Ok(stores.values().find(|s| s.slug == slug).cloned())
    }

    async fn list_stores(&self, account_id: Uuid) -> Result<Vec<Store>> {
        let stores = self.inner.stores.read().unwrap_or_else(|e| e.into_inner());
        let mut result: Vec<Store> = stores
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn insert_store(&self, store: &Store) -> Result<()> {
        let mut stores = self.inner.stores.write().unwrap_or_else(|e| e.into_inner());
        stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn update_store(&self, store: &Store) -> Result<()> {
        let mut stores = self.inner.stores.write().unwrap_or_else(|e| e.into_inner());
        stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn delete_store(&self, store_id: Uuid) -> Result<()> {
        let mut stores = self.inner.stores.write().unwrap_or_else(|e| e.into_inner());
        stores.remove(&store_id);
        drop(stores);
        let mut categories = self
            .inner
            .categories
            .write()
            .unwrap_or_else(|e| e.into_inner());
        categories.retain(|_, c| c.store_id != store_id);
        drop(categories);
        let mut products = self.inner.products.write().unwrap_or_else(|e| e.into_inner());
        products.retain(|_, p| p.store_id != store_id);
        Ok(())
    }

    async fn set_store_status(
        &self,
        store_id: Uuid,
        expected: StoreStatus,
        next: StoreStatus,
    ) -> Result<bool> {
        let mut stores = self.inner.stores.write().unwrap_or_else(|e| e.into_inner());
        match stores.get_mut(&store_id) {
            Some(store) if store.status == expected => {
                store.status = next;
                store.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>> {
        let categories = self
            .inner
            .categories
            .read()
            .unwrap_or_else(|e| e.into_inner());
        Ok(categories.get(&category_id).cloned())
    }

    async fn list_categories(&self, store_id: Uuid) -> Result<Vec<Category>> {
        let categories = self
            .inner
            .categories
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let mut result: Vec<Category> = categories
            .values()
            .filter(|c| c.store_id == store_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn insert_category(&self, category: &Category) -> Result<()> {
        let mut categories = self
            .inner
            .categories
            .write()
            .unwrap_or_else(|e| e.into_inner());
        categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        let mut categories = self
            .inner
            .categories
            .write()
            .unwrap_or_else(|e| e.into_inner());
        categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn delete_category(&self, category_id: Uuid) -> Result<()> {
        let mut categories = self
            .inner
            .categories
            .write()
            .unwrap_or_else(|e| e.into_inner());
        categories.remove(&category_id);
        Ok(())
    }

    async fn set_category_active(
        &self,
        category_id: Uuid,
        expected: bool,
        next: bool,
    ) -> Result<bool> {
        let mut categories = self
            .inner
            .categories
            .write()
            .unwrap_or_else(|e| e.into_inner());
        match categories.get_mut(&category_id) {
            Some(category) if category.is_active == expected => {
                category.is_active = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_category_refs(&self, category_id: Uuid) -> Result<usize> {
        let mut products = self.inner.products.write().unwrap_or_else(|e| e.into_inner());
        let mut cleared = 0;
        for product in products.values_mut() {
            if product.category_id == Some(category_id) {
                product.category_id = None;
                product.updated_at = chrono::Utc::now();
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        let products = self.inner.products.read().unwrap_or_else(|e| e.into_inner());
        Ok(products.get(&product_id).cloned())
    }

    async fn list_products(&self, store_id: Uuid) -> Result<Vec<Product>> {
        let products = self.inner.products.read().unwrap_or_else(|e| e.into_inner());
        let mut result: Vec<Product> = products
            .values()
            .filter(|p| p.store_id == store_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut products = self.inner.products.write().unwrap_or_else(|e| e.into_inner());
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut products = self.inner.products.write().unwrap_or_else(|e| e.into_inner());
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete_product(&self, product_id: Uuid) -> Result<()> {
        let mut products = self.inner.products.write().unwrap_or_else(|e| e.into_inner());
        products.remove(&product_id);
        Ok(())
    }

    async fn set_product_active(
        &self,
        product_id: Uuid,
        expected: bool,
        next: bool,
    ) -> Result<bool> {
        let mut products = self.inner.products.write().unwrap_or_else(|e| e.into_inner());
        match products.get_mut(&product_id) {
            Some(product) if product.is_active == expected => {
                product.is_active = next;
                product.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
