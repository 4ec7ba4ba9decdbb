//! Stripe client traits and request/response types.
//!
//! The traits keep the payment provider swappable and testable; the mock
//! records what was requested and hands back deterministic ids.

use async_trait::async_trait;

use crate::error::Result;

/// Request to create a billing customer.
#[derive(Debug, Clone)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub name: Option<String>,
    /// The account this customer belongs to, carried as provider metadata.
    pub account_id: String,
}

/// Request to create a hosted-checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionRequest {
    pub customer_id: String,
    /// The plan's price reference.
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Metadata echoed back on webhook events.
    pub account_id: String,
    pub plan_id: String,
}

/// A hosted-checkout session to redirect the customer to.
#[derive(Debug, Clone)]
#[must_use]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Request to create a billing-portal session.
#[derive(Debug, Clone)]
pub struct CreatePortalSessionRequest {
    pub customer_id: String,
    pub return_url: String,
}

/// A billing-portal session to redirect the customer to.
#[derive(Debug, Clone)]
#[must_use]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// Customer creation at the payment provider.
#[async_trait]
pub trait StripeCustomerClient: Send + Sync {
    /// Create a customer; returns the provider's customer id.
    async fn create_customer(&self, request: CreateCustomerRequest) -> Result<String>;
}

/// Hosted-checkout session creation.
#[async_trait]
pub trait StripeCheckoutClient: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession>;
}

/// Billing-portal session creation.
#[async_trait]
pub trait StripePortalClient: Send + Sync {
    async fn create_portal_session(
        &self,
        request: CreatePortalSessionRequest,
    ) -> Result<PortalSession>;
}

/// Mock Stripe client implementing all three traits.
///
/// Used by the test-suite; counters make the generated ids deterministic
/// within a test.
#[derive(Default)]
pub struct MockStripeClient {
    customer_counter: std::sync::atomic::AtomicU64,
    session_counter: std::sync::atomic::AtomicU64,
    customers: std::sync::RwLock<Vec<CreateCustomerRequest>>,
    checkouts: std::sync::RwLock<Vec<CreateCheckoutSessionRequest>>,
}

impl MockStripeClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Customers created so far.
    #[must_use]
    pub fn created_customers(&self) -> Vec<CreateCustomerRequest> {
        self.customers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Checkout sessions requested so far.
    #[must_use]
    pub fn requested_checkouts(&self) -> Vec<CreateCheckoutSessionRequest> {
        self.checkouts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl StripeCustomerClient for MockStripeClient {
    async fn create_customer(&self, request: CreateCustomerRequest) -> Result<String> {
        let n = self
            .customer_counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.customers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        Ok(format!("cus_test_{}", n))
    }
}

#[async_trait]
impl StripeCheckoutClient for MockStripeClient {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        let n = self
            .session_counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.checkouts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let id = format!("cs_test_{}", n);
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.com/c/pay/{}", id),
            id,
        })
    }
}

#[async_trait]
impl StripePortalClient for MockStripeClient {
    async fn create_portal_session(
        &self,
        request: CreatePortalSessionRequest,
    ) -> Result<PortalSession> {
        let n = self
            .session_counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let _ = request;
        let id = format!("bps_test_{}", n);
        Ok(PortalSession {
            url: format!("https://billing.stripe.com/p/session/{}", id),
            id,
        })
    }
}
