//! Storage trait for account records.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

use super::model::Account;

/// Read/write access to the accounts table, plus webhook-event idempotency
/// tracking.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>>;

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Find the account linked to a billing-customer reference.
    async fn find_by_stripe_customer(&self, customer_id: &str) -> Result<Option<Account>>;

    async fn insert_account(&self, account: &Account) -> Result<()>;

    /// Replace the stored record with `account` (whole-row update).
    async fn update_account(&self, account: &Account) -> Result<()>;

    async fn delete_account(&self, account_id: Uuid) -> Result<()>;

    /// Persist only the plan reference (used by the background correction
    /// that writes the free-plan id onto records with dangling plans).
    async fn set_plan(&self, account_id: Uuid, plan_id: &str) -> Result<()>;

    // Webhook idempotency

    /// Check if a webhook event has already been processed.
    async fn is_event_processed(&self, event_id: &str) -> Result<bool>;

    /// Mark a webhook event as processed.
    async fn mark_event_processed(&self, event_id: &str) -> Result<()>;
}

/// In-memory account store.
///
/// Used by the test-suite and for prototyping. Wraps data in `Arc` for
/// cheap cloning.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    inner: std::sync::Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    accounts: std::sync::RwLock<std::collections::HashMap<Uuid, Account>>,
    processed_events: std::sync::RwLock<std::collections::HashSet<String>>,
}

impl InMemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored accounts (for assertions in tests).
    #[must_use]
    pub fn all_accounts(&self) -> Vec<Account> {
        self.inner
            .accounts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>> {
        let accounts = self.inner.accounts.read().unwrap_or_else(|e| e.into_inner());
        Ok(accounts.get(&account_id).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.inner.accounts.read().unwrap_or_else(|e| e.into_inner());
        Ok(accounts
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_stripe_customer(&self, customer_id: &str) -> Result<Option<Account>> {
        let accounts = self.inner.accounts.read().unwrap_or_else(|e| e.into_inner());
        Ok(accounts
            .values()
            .find(|a| a.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn insert_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.inner.accounts.write().unwrap_or_else(|e| e.into_inner());
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.inner.accounts.write().unwrap_or_else(|e| e.into_inner());
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<()> {
        let mut accounts = self.inner.accounts.write().unwrap_or_else(|e| e.into_inner());
        accounts.remove(&account_id);
        Ok(())
    }

    async fn set_plan(&self, account_id: Uuid, plan_id: &str) -> Result<()> {
        let mut accounts = self.inner.accounts.write().unwrap_or_else(|e| e.into_inner());
        if let Some(account) = accounts.get_mut(&account_id) {
            account.plan = plan_id.to_string();
            account.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool> {
        let events = self
            .inner
            .processed_events
            .read()
            .unwrap_or_else(|e| e.into_inner());
        Ok(events.contains(event_id))
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<()> {
        let mut events = self
            .inner
            .processed_events
            .write()
            .unwrap_or_else(|e| e.into_inner());
        events.insert(event_id.to_string());
        Ok(())
    }
}
