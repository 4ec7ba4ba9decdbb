//! Billing-portal session creation.

use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::error::{DomainError, Result};

use super::client::{CreatePortalSessionRequest, PortalSession, StripePortalClient};

/// Creates billing-portal sessions for subscription self-service.
pub struct PortalManager<A, C>
where
    A: AccountStore,
    C: StripePortalClient,
{
    accounts: A,
    client: C,
}

impl<A, C> PortalManager<A, C>
where
    A: AccountStore,
    C: StripePortalClient,
{
    #[must_use]
    pub fn new(accounts: A, client: C) -> Self {
        Self { accounts, client }
    }

    /// Create a portal session for the account.
    ///
    /// Requires a pre-existing billing-customer reference; an account that
    /// has never checked out gets a specific error rather than a customer
    /// fabricated just to open a portal.
    pub async fn create_portal_session(
        &self,
        account_id: Uuid,
        return_url: &str,
    ) -> Result<PortalSession> {
        let account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;

        let customer_id =
            account
                .stripe_customer_id
                .ok_or_else(|| DomainError::NoBillingCustomer {
                    account_id: account_id.to_string(),
                })?;

        self.client
            .create_portal_session(CreatePortalSessionRequest {
                customer_id,
                return_url: return_url.to_string(),
            })
            .await
    }
}
