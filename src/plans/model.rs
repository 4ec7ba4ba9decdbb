//! Plan definition.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A subscription tier with numeric ceilings on stores, products, and
/// categories.
///
/// Exactly one plan in the active set should carry `is_free = true`; it is
/// the fallback for accounts whose plan reference does not resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan identifier (e.g. "gratuito", "emprendedor", "profesional").
    pub id: String,
    /// Display name shown to users.
    pub name: String,
    /// Description of the plan.
    pub description: Option<String>,
    /// Monthly price.
    pub price: Decimal,
    /// Maximum active stores per account.
    pub max_stores: u32,
    /// Maximum active products per store.
    pub max_products: u32,
    /// Maximum active categories per store.
    pub max_categories: u32,
    /// Features available on this plan.
    pub features: Vec<String>,
    /// Whether the plan is active and available.
    pub is_active: bool,
    /// Whether this is the free fallback plan.
    pub is_free: bool,
    /// Ordinal level used to rank plans for upgrade/downgrade comparison.
    pub level: i32,
    /// Stripe price ID for checkout (absent on the free plan).
    pub stripe_price_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// The ceiling this plan sets for a resource kind.
    #[must_use]
    pub fn limit_for(&self, resource: ResourceKind) -> u32 {
        match resource {
            ResourceKind::Stores => self.max_stores,
            ResourceKind::Products => self.max_products,
            ResourceKind::Categories => self.max_categories,
        }
    }

    /// Check if this plan includes a feature.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// The kinds of plan-limited resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Stores,
    Products,
    Categories,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stores => "stores",
            Self::Products => "products",
            Self::Categories => "categories",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
