//! Identity provider integration and sign-up/sign-in flows.
//!
//! The identity provider is an external collaborator; this module owns the
//! flows around it: registration requires a configured free plan, and
//! provider error strings are normalized into consistent messages.

use uuid::Uuid;

use crate::error::{DomainError, Result, VitrinaError};
use crate::plans::{PlanCatalog, PlanStore};

use super::model::Account;
use super::storage::AccountStore;

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 6;

/// An authenticated provider session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account_id: Uuid,
    pub access_token: String,
}

/// Errors reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The email is already registered.
    AlreadyRegistered,
    /// Credentials rejected at sign-in.
    InvalidCredentials,
    /// The provider rejected the email format.
    InvalidEmail,
    /// The provider rejected the password as too weak.
    WeakPassword,
    /// Any other provider failure, with its raw message.
    Provider(String),
}

impl IdentityError {
    /// Normalize a raw provider error string.
    ///
    /// Providers word the same condition several ways ("User already
    /// registered", "already been registered", and sign-up attempts that
    /// surface as "Invalid login credentials"); collapse them so the user
    /// always sees one consistent message.
    #[must_use]
    pub fn from_provider_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("already registered")
            || lower.contains("already been registered")
            || lower.contains("invalid login credentials")
        {
            Self::AlreadyRegistered
        } else if lower.contains("password should be at least") {
            Self::WeakPassword
        } else if lower.contains("unable to validate email") {
            Self::InvalidEmail
        } else {
            Self::Provider(message.to_string())
        }
    }
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRegistered => write!(f, "email already registered"),
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::InvalidEmail => write!(f, "invalid email"),
            Self::WeakPassword => write!(f, "password too weak"),
            Self::Provider(msg) => write!(f, "identity provider error: {}", msg),
        }
    }
}

impl std::error::Error for IdentityError {}

/// External identity provider.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider: Send + Sync {
    /// Create an identity; returns the new account identifier.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> std::result::Result<Uuid, IdentityError>;

    /// Authenticate; returns a provider session.
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<AuthSession, IdentityError>;

    /// Invalidate a provider session.
    async fn sign_out(&self, session: &AuthSession) -> std::result::Result<(), IdentityError>;
}

/// Registration and login flows.
pub struct AuthFlow<I, A, P>
where
    I: IdentityProvider,
    A: AccountStore,
    P: PlanStore,
{
    identity: I,
    accounts: A,
    plans: PlanCatalog<P>,
}

impl<I, A, P> AuthFlow<I, A, P>
where
    I: IdentityProvider,
    A: AccountStore,
    P: PlanStore,
{
    #[must_use]
    pub fn new(identity: I, accounts: A, plans: PlanCatalog<P>) -> Self {
        Self {
            identity,
            accounts,
            plans,
        }
    }

    /// Register a new account on the free plan.
    ///
    /// The plan catalog is reloaded first so the free plan's current id is
    /// captured; registration fails loudly when no free plan is configured
    /// rather than assigning an arbitrary plan.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<Account> {
        let email = email.trim().to_lowercase();

        if !is_valid_email(&email) {
            return Err(DomainError::InvalidEmail.into());
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::PasswordTooShort {
                min_length: MIN_PASSWORD_LENGTH,
            }
            .into());
        }

        // Capture the free plan's current identifier before creating
        // anything. A reload failure leaves the previous cache usable.
        if let Err(err) = self.plans.load_plans().await {
            tracing::warn!(
                target: "vitrina::auth",
                error = %err,
                "plan reload before registration failed, using cached plans"
            );
        }
        let free_plan = self.plans.free_plan().ok_or(DomainError::NoFreePlan)?;

        let account_id = self
            .identity
            .sign_up(&email, password, name)
            .await
            .map_err(map_identity_error)?;

        let account = Account::new(account_id, email, name, free_plan.id.clone());
        self.accounts.insert_account(&account).await?;

        tracing::info!(
            target: "vitrina::auth",
            account_id = %account.id,
            plan = %free_plan.id,
            "account registered"
        );
        Ok(account)
    }

    /// Sign in and load the account record and plan catalog.
    pub async fn login(&self, email: &str, password: &str) -> Result<(AuthSession, Account)> {
        let email = email.trim().to_lowercase();

        let session = self
            .identity
            .sign_in(&email, password)
            .await
            .map_err(map_identity_error)?;

        let account = self
            .accounts
            .get_account(session.account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound {
                account_id: session.account_id.to_string(),
            })?;

        if let Err(err) = self.plans.load_plans().await {
            tracing::warn!(target: "vitrina::auth", error = %err, "plan reload at login failed");
        }

        Ok((session, account))
    }

    /// Sign out of the provider session.
    pub async fn logout(&self, session: &AuthSession) -> Result<()> {
        self.identity
            .sign_out(session)
            .await
            .map_err(map_identity_error)
    }
}

fn map_identity_error(err: IdentityError) -> VitrinaError {
    match err {
        IdentityError::AlreadyRegistered => DomainError::EmailAlreadyRegistered.into(),
        IdentityError::InvalidCredentials => DomainError::InvalidCredentials.into(),
        IdentityError::InvalidEmail => DomainError::InvalidEmail.into(),
        IdentityError::WeakPassword => DomainError::PasswordTooShort {
            min_length: MIN_PASSWORD_LENGTH,
        }
        .into(),
        IdentityError::Provider(msg) => {
            tracing::error!(target: "vitrina::auth", error = %msg, "identity provider failure");
            VitrinaError::ServiceUnavailable("Authentication is temporarily unavailable".to_string())
        }
    }
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// In-memory identity provider.
///
/// Used by the test-suite and for prototyping. Stores passwords in plain
/// text and must never back a real deployment.
#[derive(Default, Clone)]
pub struct InMemoryIdentityProvider {
    inner: std::sync::Arc<std::sync::RwLock<std::collections::HashMap<String, (String, Uuid)>>>,
}

impl InMemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _name: &str,
    ) -> std::result::Result<Uuid, IdentityError> {
        let mut users = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if users.contains_key(email) {
            // Raw provider wording on purpose; flows normalize it.
            return Err(IdentityError::from_provider_message("User already registered"));
        }
        let id = Uuid::new_v4();
        users.insert(email.to_string(), (password.to_string(), id));
        Ok(id)
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<AuthSession, IdentityError> {
        let users = self.inner.read().unwrap_or_else(|e| e.into_inner());
        match users.get(email) {
            Some((stored, id)) if stored == password => Ok(AuthSession {
                account_id: *id,
                access_token: format!("tok_{}", Uuid::new_v4().simple()),
            }),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn sign_out(&self, _session: &AuthSession) -> std::result::Result<(), IdentityError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::storage::InMemoryAccountStore;
    use crate::plans::{InMemoryPlanStore, Plan};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn free_plan() -> Plan {
        Plan {
            id: "gratuito".to_string(),
            name: "Gratuito".to_string(),
            description: None,
            price: Decimal::ZERO,
            max_stores: 1,
            max_products: 10,
            max_categories: 3,
            features: Vec::new(),
            is_active: true,
            is_free: true,
            level: 1,
            stripe_price_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn flow(
        plans: Vec<Plan>,
    ) -> AuthFlow<InMemoryIdentityProvider, InMemoryAccountStore, InMemoryPlanStore> {
        let plan_store = InMemoryPlanStore::new();
        plan_store.seed_plans(plans);
        AuthFlow::new(
            InMemoryIdentityProvider::new(),
            InMemoryAccountStore::new(),
            PlanCatalog::new(plan_store),
        )
    }

    #[test]
    fn provider_message_normalization() {
        assert_eq!(
            IdentityError::from_provider_message("User already registered"),
            IdentityError::AlreadyRegistered
        );
        assert_eq!(
            IdentityError::from_provider_message("This email has already been registered"),
            IdentityError::AlreadyRegistered
        );
        assert_eq!(
            IdentityError::from_provider_message("Invalid login credentials"),
            IdentityError::AlreadyRegistered
        );
        assert_eq!(
            IdentityError::from_provider_message("Password should be at least 6 characters"),
            IdentityError::WeakPassword
        );
        assert!(matches!(
            IdentityError::from_provider_message("connection reset"),
            IdentityError::Provider(_)
        ));
    }

    #[tokio::test]
    async fn register_assigns_free_plan() {
        let flow = flow(vec![free_plan()]);
        let account = flow
            .register("Ana@Example.com", "secret123", "Ana")
            .await
            .unwrap();
        assert_eq!(account.email, "ana@example.com");
        assert_eq!(account.plan, "gratuito");
        assert!(account.subscription_status.is_none());
    }

    #[tokio::test]
    async fn register_fails_without_free_plan() {
        let flow = flow(Vec::new());
        let err = flow
            .register("ana@example.com", "secret123", "Ana")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("free plan"));
    }

    #[tokio::test]
    async fn register_rejects_duplicates_with_normalized_message() {
        let flow = flow(vec![free_plan()]);
        flow.register("ana@example.com", "secret123", "Ana")
            .await
            .unwrap();
        let err = flow
            .register("ana@example.com", "secret123", "Ana")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let flow = flow(vec![free_plan()]);
        assert!(flow.register("not-an-email", "secret123", "Ana").await.is_err());
        assert!(flow.register("ana@example.com", "abc", "Ana").await.is_err());
    }

    #[tokio::test]
    async fn login_round_trip() {
        let flow = flow(vec![free_plan()]);
        let registered = flow
            .register("ana@example.com", "secret123", "Ana")
            .await
            .unwrap();

        let (session, account) = flow.login("ana@example.com", "secret123").await.unwrap();
        assert_eq!(account.id, registered.id);
        assert_eq!(session.account_id, registered.id);

        assert!(flow.login("ana@example.com", "wrong").await.is_err());
        flow.logout(&session).await.unwrap();
    }
}
