//! Vitrina - core library for a multi-tenant WhatsApp-catalog store builder.
//!
//! Users register, create catalogs ("stores"), manage products and
//! categories, and pay for tiered subscription plans that gate how many
//! stores, products, and categories each account may have. This crate owns
//! the hard part of that product: plan-limit enforcement and account-state
//! reconciliation, plus the Stripe checkout/portal/webhook bridge.
//!
//! # Architecture
//!
//! - **Plans**: a cached catalog of admin-managed subscription tiers and
//!   the resolver mapping accounts to ceilings ([`plans`]).
//! - **Accounts**: identity flows, subscription state, session snapshot
//!   ([`accounts`]).
//! - **Catalog**: stores/categories/products and their managed mutations
//!   ([`catalog`]).
//! - **Enforcement**: deterministic survivor selection bringing active
//!   counts back under plan ceilings, by deactivation only, never by
//!   deletion ([`enforcement`]).
//! - **Reconcile**: the periodic and event-triggered loop that detects
//!   plan/subscription drift and re-applies enforcement ([`reconcile`]).
//! - **Billing**: Stripe checkout, billing portal, and the webhook
//!   receiver mutating account records ([`billing`]).
//!
//! External collaborators (identity provider, relational store, payment
//! provider) sit behind narrow traits with in-memory implementations used
//! by the test-suite.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vitrina::{Config, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     vitrina::init_tracing();
//!
//!     let config: Config = ConfigBuilder::new().from_env().build();
//!     // Wire stores, managers, and the reconcile loop from here.
//!     let _ = config;
//! }
//! ```

#![allow(async_fn_in_trait)] // client traits use native async fns

pub mod accounts;
pub mod admin;
pub mod billing;
pub mod catalog;
mod config;
pub mod enforcement;
mod error;
pub mod http;
pub mod notify;
pub mod plans;
pub mod reconcile;

// Re-exports for the public API.
pub use accounts::{
    Account, AccountStore, AuthFlow, AuthSession, IdentityProvider, PaymentOutcome, Session,
    SessionState, SubscriptionStatus,
};
pub use admin::{AdminSync, AuditEvent, AuditLogger, NoOpAuditLogger, TracingAuditLogger};
pub use billing::{
    CheckoutConfig, CheckoutManager, CheckoutSession, LiveStripeClient, LiveStripeClientConfig,
    PortalManager, PortalSession, WebhookEvent, WebhookHandler, WebhookOutcome,
};
pub use catalog::{CatalogManager, CatalogStore, Category, Product, Store, StoreStatus};
pub use config::{
    BillingConfig, Config, ConfigBuilder, LoggingConfig, ReconcileConfig, ServerConfig,
};
pub use enforcement::{EnforcementEngine, EnforcementReport, Selection};
pub use error::{DomainError, ErrorResponse, Result, VitrinaError};
pub use http::{ApiState, router};
pub use notify::{NoOpNotifier, Notifier, TracingNotifier};
pub use plans::{Plan, PlanCatalog, PlanStore, ResourceKind};
pub use reconcile::{
    AccountSnapshot, ChangeEvent, ChangeHub, ChangeOp, ReconcileHandle, ReconcileLoop, Reconciler,
    TableKind, TickOutcome,
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults.
///
/// Call early in `main()`, before wiring the application.
///
/// # Environment Variables
///
/// - `RUST_LOG`: log filter (e.g. "info", "vitrina=debug")
/// - `VITRINA_LOG_JSON`: set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("VITRINA_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from a [`Config`].
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
