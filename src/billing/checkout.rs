//! Hosted-checkout session creation.

use url::Url;
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::error::{DomainError, Result};
use crate::plans::{PlanCatalog, PlanStore};

use super::client::{
    CheckoutSession, CreateCheckoutSessionRequest, CreateCustomerRequest, StripeCheckoutClient,
    StripeCustomerClient,
};

/// Checkout policy: redirect-URL validation.
#[derive(Debug, Clone, Default)]
pub struct CheckoutConfig {
    /// Allowed domains for redirect URLs (empty = allow any HTTPS URL).
    /// This prevents open redirects through the checkout flow.
    pub allowed_redirect_domains: Vec<String>,
}

impl CheckoutConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allowed_redirect_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_redirect_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Validate a redirect URL: parseable, HTTPS, and (when a list is
    /// configured) on an allowed domain.
    pub fn validate_redirect_url(&self, url: &str) -> Result<()> {
        let parsed = Url::parse(url).map_err(|e| DomainError::InvalidRedirectUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if parsed.scheme() != "https" {
            return Err(DomainError::InvalidRedirectUrl {
                url: url.to_string(),
                reason: "must use HTTPS".to_string(),
            }
            .into());
        }

        if !self.allowed_redirect_domains.is_empty() {
            let host = parsed
                .host_str()
                .ok_or_else(|| DomainError::InvalidRedirectUrl {
                    url: url.to_string(),
                    reason: "must have a host".to_string(),
                })?;

            let allowed = self.allowed_redirect_domains.iter().any(|domain| {
                host == domain || host.ends_with(&format!(".{}", domain))
            });
            if !allowed {
                return Err(DomainError::RedirectDomainNotAllowed {
                    domain: host.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Creates hosted-checkout sessions for plan purchases.
pub struct CheckoutManager<A, C, P>
where
    A: AccountStore,
    C: StripeCustomerClient + StripeCheckoutClient,
    P: PlanStore,
{
    accounts: A,
    client: C,
    plans: PlanCatalog<P>,
    config: CheckoutConfig,
}

impl<A, C, P> CheckoutManager<A, C, P>
where
    A: AccountStore,
    C: StripeCustomerClient + StripeCheckoutClient,
    P: PlanStore,
{
    #[must_use]
    pub fn new(accounts: A, client: C, plans: PlanCatalog<P>, config: CheckoutConfig) -> Self {
        Self {
            accounts,
            client,
            plans,
            config,
        }
    }

    /// Create a checkout session for the given plan.
    ///
    /// Creates and persists a billing customer for the account when none
    /// exists yet, then returns the hosted page's redirect URL. The plan
    /// must be a known, purchasable one; there is no silent defaulting on
    /// this path.
    pub async fn create_checkout_session(
        &self,
        account_id: Uuid,
        plan_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        self.config.validate_redirect_url(success_url)?;
        self.config.validate_redirect_url(cancel_url)?;

        let plan = self
            .plans
            .plan_by_id(plan_id)
            .ok_or_else(|| DomainError::PlanNotFound {
                plan_id: plan_id.to_string(),
            })?;
        let price_id = plan
            .stripe_price_id
            .clone()
            .ok_or_else(|| DomainError::MissingPriceReference {
                plan_id: plan.id.clone(),
            })?;

        let mut account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;

        let customer_id = match account.stripe_customer_id.clone() {
            Some(id) => id,
            None => {
                let id = self
                    .client
                    .create_customer(CreateCustomerRequest {
                        email: account.email.clone(),
                        name: Some(account.name.clone()),
                        account_id: account.id.to_string(),
                    })
                    .await?;
                account.stripe_customer_id = Some(id.clone());
                account.updated_at = chrono::Utc::now();
                self.accounts.update_account(&account).await?;
                id
            }
        };

        // The success page reads the purchased plan off the query string.
        let success_url = format!("{}?plan={}", success_url, plan.id);

        let session = self
            .client
            .create_checkout_session(CreateCheckoutSessionRequest {
                customer_id,
                price_id,
                success_url,
                cancel_url: cancel_url.to_string(),
                account_id: account.id.to_string(),
                plan_id: plan.id.clone(),
            })
            .await?;

        tracing::info!(
            target: "vitrina::billing",
            account_id = %account.id,
            plan = %plan.id,
            session = %session.id,
            "checkout session created"
        );
        Ok(session)
    }
}
