//! Client-session state: the account snapshot and its loaded catalog.
//!
//! The session is created at sign-in and torn down at sign-out. Optimistic
//! mutation is explicit two-phase: take a [`SessionState::snapshot`] before
//! applying a local change, send the request, and on failure
//! [`SessionState::restore`] the snapshot. Desired state and confirmed
//! state are never conflated in one structure.

use uuid::Uuid;

use crate::catalog::{Category, CatalogStore, Product, Store};
use crate::error::Result;
use crate::reconcile::ReconcileHandle;

use super::model::Account;

/// A store with its loaded categories and products.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreWithChildren {
    pub store: Store,
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
}

/// In-memory state for one signed-in account.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub account: Account,
    pub stores: Vec<StoreWithChildren>,
    /// The store currently selected in the client.
    pub current_store: Option<Uuid>,
}

impl SessionState {
    /// Load the account's stores with their categories and products,
    /// ordered oldest-first, selecting the first store as current.
    pub async fn load<C: CatalogStore>(catalog: &C, account: Account) -> Result<Self> {
        let stores = catalog.list_stores(account.id).await?;
        let mut loaded = Vec::with_capacity(stores.len());
        for store in stores {
            let categories = catalog.list_categories(store.id).await?;
            let products = catalog.list_products(store.id).await?;
            loaded.push(StoreWithChildren {
                store,
                categories,
                products,
            });
        }
        let current_store = loaded.first().map(|s| s.store.id);
        Ok(Self {
            account,
            stores: loaded,
            current_store,
        })
    }

    /// Capture the state before an optimistic local mutation.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Roll back to a previously captured snapshot.
    pub fn restore(&mut self, snapshot: Self) {
        *self = snapshot;
    }

    #[must_use]
    pub fn store(&self, store_id: Uuid) -> Option<&StoreWithChildren> {
        self.stores.iter().find(|s| s.store.id == store_id)
    }

    fn store_mut(&mut self, store_id: Uuid) -> Option<&mut StoreWithChildren> {
        self.stores.iter_mut().find(|s| s.store.id == store_id)
    }

    /// Apply a confirmed (or optimistic) store update.
    pub fn upsert_store(&mut self, store: Store) {
        match self.store_mut(store.id) {
            Some(existing) => existing.store = store,
            None => {
                let id = store.id;
                self.stores.push(StoreWithChildren {
                    store,
                    categories: Vec::new(),
                    products: Vec::new(),
                });
                // A newly created store becomes the current one.
                self.current_store = Some(id);
            }
        }
    }

    pub fn remove_store(&mut self, store_id: Uuid) {
        self.stores.retain(|s| s.store.id != store_id);
        if self.current_store == Some(store_id) {
            self.current_store = self.stores.first().map(|s| s.store.id);
        }
    }

    pub fn upsert_category(&mut self, category: Category) {
        if let Some(store) = self.store_mut(category.store_id) {
            match store.categories.iter_mut().find(|c| c.id == category.id) {
                Some(existing) => *existing = category,
                None => store.categories.push(category),
            }
        }
    }

    /// Remove a category and null the references products hold to it.
    pub fn remove_category(&mut self, store_id: Uuid, category_id: Uuid) {
        if let Some(store) = self.store_mut(store_id) {
            store.categories.retain(|c| c.id != category_id);
            for product in &mut store.products {
                if product.category_id == Some(category_id) {
                    product.category_id = None;
                }
            }
        }
    }

    pub fn upsert_product(&mut self, product: Product) {
        if let Some(store) = self.store_mut(product.store_id) {
            match store.products.iter_mut().find(|p| p.id == product.id) {
                Some(existing) => *existing = product,
                None => store.products.push(product),
            }
        }
    }

    pub fn remove_product(&mut self, store_id: Uuid, product_id: Uuid) {
        if let Some(store) = self.store_mut(store_id) {
            store.products.retain(|p| p.id != product_id);
        }
    }
}

/// A signed-in session: state plus the background work bound to it.
///
/// Closing the session cancels the reconciliation loop so no orphaned work
/// runs against a logged-out account.
pub struct Session {
    pub state: SessionState,
    reconcile: Option<ReconcileHandle>,
}

impl Session {
    #[must_use]
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            reconcile: None,
        }
    }

    /// Bind a running reconciliation loop to this session's lifetime.
    pub fn attach_reconcile(&mut self, handle: ReconcileHandle) {
        self.reconcile = Some(handle);
    }

    /// End the session, stopping the reconciliation loop.
    pub async fn close(mut self) {
        if let Some(handle) = self.reconcile.take() {
            handle.shutdown().await;
        }
    }
}
