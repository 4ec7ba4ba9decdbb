//! Store, category, and product records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store lifecycle status.
///
/// Enforcement only moves stores between `active` and `suspended`;
/// `archived` is a user decision. No transition deletes data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    Active,
    Suspended,
    Archived,
}

impl StoreStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tenant's catalog instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    /// URL slug, unique across all accounts.
    pub slug: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    /// WhatsApp number orders are sent to.
    pub whatsapp: Option<String>,
    pub currency: String,
    pub status: StoreStatus,
    // Order-message templates. `{storeName}` and `{customerName}` are
    // substituted by the catalog renderer.
    pub message_greeting: String,
    pub message_introduction: String,
    pub message_closing: String,
    // Payment and delivery toggles.
    pub accept_cash: bool,
    pub accept_bank_transfer: bool,
    pub allow_pickup: bool,
    pub allow_delivery: bool,
    pub delivery_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    /// A new active store with default catalog configuration.
    #[must_use]
    pub fn new(account_id: Uuid, name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            name: name.into(),
            slug: slug.into(),
            description: None,
            logo: None,
            whatsapp: None,
            currency: "USD".to_string(),
            status: StoreStatus::Active,
            message_greeting: "¡Hola {storeName}!".to_string(),
            message_introduction: "Soy {customerName}.\nMe gustaría hacer el siguiente pedido:"
                .to_string(),
            message_closing: "¡Muchas gracias!".to_string(),
            accept_cash: true,
            accept_bank_transfer: false,
            allow_pickup: true,
            allow_delivery: false,
            delivery_cost: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == StoreStatus::Active
    }
}

/// A product grouping within a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    #[must_use]
    pub fn new(store_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            store_id,
            name: name.into(),
            description: None,
            sort_order: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// A catalog item.
///
/// Holds a non-owning reference to at most one category; the reference is
/// nulled, not cascade-deleted, when the category is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    /// Non-negative price.
    pub price: Decimal,
    pub main_image: Option<String>,
    pub gallery: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn new(store_id: Uuid, name: impl Into<String>, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            store_id,
            category_id: None,
            name: name.into(),
            short_description: None,
            long_description: None,
            price,
            main_image: None,
            gallery: Vec::new(),
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }
}
