//! Stripe billing bridge.
//!
//! Checkout and billing-portal session creation, and a webhook receiver
//! that translates payment-provider events into account-record mutations.
//! The Stripe API is consumed through narrow client traits with mock
//! implementations for tests and a production client speaking the REST
//! API.

mod checkout;
mod client;
mod live;
mod portal;
mod webhook;

pub use checkout::{CheckoutConfig, CheckoutManager};
pub use client::{
    CheckoutSession, CreateCheckoutSessionRequest, CreateCustomerRequest,
    CreatePortalSessionRequest, MockStripeClient, PortalSession, StripeCheckoutClient,
    StripeCustomerClient, StripePortalClient,
};
pub use live::{LiveStripeClient, LiveStripeClientConfig};
pub use portal::PortalManager;
pub use webhook::{WebhookEvent, WebhookEventData, WebhookHandler, WebhookOutcome};
