//! Account and subscription state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated user identity with its plan and subscription state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Plan reference: a plan id, or (legacy records) a plan name.
    pub plan: String,
    /// Payment-provider subscription identifier.
    pub subscription_id: Option<String>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub subscription_canceled_at: Option<DateTime<Utc>>,
    /// Payment-method tag (e.g. "card").
    pub payment_method: Option<String>,
    /// Outcome of the most recent invoice payment.
    pub last_payment_outcome: Option<PaymentOutcome>,
    pub last_payment_at: Option<DateTime<Utc>>,
    /// Billing-customer reference at the payment provider.
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A fresh account on the given plan, with all optional state unset.
    #[must_use]
    pub fn new(id: Uuid, email: impl Into<String>, name: impl Into<String>, plan: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            name: name.into(),
            phone: None,
            bio: None,
            avatar: None,
            company: None,
            location: None,
            plan: plan.into(),
            subscription_id: None,
            subscription_status: None,
            subscription_start_date: None,
            subscription_end_date: None,
            subscription_canceled_at: None,
            payment_method: None,
            last_payment_outcome: None,
            last_payment_at: None,
            stripe_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the subscription still reads active but its end date has
    /// passed. The reconciler treats this as equivalent to cancellation.
    #[must_use]
    pub fn subscription_expired(&self, now: DateTime<Utc>) -> bool {
        self.subscription_status == Some(SubscriptionStatus::Active)
            && self.subscription_end_date.is_some_and(|end| end < now)
    }
}

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active and paid.
    Active,
    /// Subscription has been canceled.
    Canceled,
    /// Subscription passed its end date while still reading active.
    Expired,
}

impl SubscriptionStatus {
    /// Parse from a status string; unknown values read as canceled.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "expired" => Self::Expired,
            _ => Self::Canceled,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recorded outcome of an invoice payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}
