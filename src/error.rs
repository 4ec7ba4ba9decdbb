//! Crate-level and domain error types.
//!
//! [`VitrinaError`] is the transport-facing error every fallible operation
//! ultimately returns; [`DomainError`] carries the granular business-rule
//! failures (limit ceilings, unresolved references, webhook rejection) and
//! converts into it.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::plans::ResourceKind;

/// The main error type for vitrina operations.
#[derive(Debug, thiserror::Error)]
pub enum VitrinaError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VitrinaError>;

impl VitrinaError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body returned by the HTTP endpoints.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

impl IntoResponse for VitrinaError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs, not in the response body.
        let message = match &self {
            Self::Internal(_) | Self::Anyhow(_) => {
                tracing::error!(target: "vitrina", error = %self, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Granular business-rule errors.
///
/// These carry enough context for the caller to render a corrective message
/// (a limit error always names the ceiling and the plan) and convert into
/// [`VitrinaError`] for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    // Plan resolution
    /// The referenced plan does not exist.
    PlanNotFound { plan_id: String },
    /// No single active free plan is configured (zero or several).
    NoFreePlan,
    /// The plan has no payment-provider price reference.
    MissingPriceReference { plan_id: String },

    // Limits
    /// A plan ceiling would be exceeded; carries the limit and plan name so
    /// the caller can render an upgrade prompt.
    LimitExceeded {
        resource: ResourceKind,
        limit: u32,
        plan_name: String,
    },

    // Catalog references
    StoreNotFound { store_id: String },
    CategoryNotFound { category_id: String },
    ProductNotFound { product_id: String },
    AccountNotFound { account_id: String },
    /// The store slug is already taken by another store.
    SlugTaken { slug: String },
    /// The acting account does not own the resource.
    NotOwner,
    /// Product prices must be non-negative.
    NegativePrice,

    // Billing
    /// The account has no billing-customer reference.
    NoBillingCustomer { account_id: String },
    /// Webhook signature did not verify.
    InvalidWebhookSignature,
    /// Webhook timestamp outside the tolerance window.
    WebhookTimestampExpired { age_seconds: i64 },
    /// Webhook event body is malformed.
    InvalidWebhookPayload { message: String },
    /// Redirect URL failed validation.
    InvalidRedirectUrl { url: String, reason: String },
    /// Redirect URL domain not in the allowed list.
    RedirectDomainNotAllowed { domain: String },
    /// The payment provider returned an error.
    PaymentApiError {
        operation: String,
        message: String,
        http_status: Option<u16>,
    },

    // Auth
    /// The email is already registered (normalized across provider wording).
    EmailAlreadyRegistered,
    /// Sign-in credentials were rejected.
    InvalidCredentials,
    /// Email failed format validation.
    InvalidEmail,
    /// Password below the minimum length.
    PasswordTooShort { min_length: usize },

    // Concurrency
    /// The precondition re-check failed; the caller should retry.
    ConcurrentModification { entity: String },
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlanNotFound { plan_id } => write!(f, "Plan not found: {}", plan_id),
            Self::NoFreePlan => write!(f, "No free plan is configured"),
            Self::MissingPriceReference { plan_id } => {
                write!(f, "Plan '{}' has no payment price reference", plan_id)
            }
            Self::LimitExceeded {
                resource,
                limit,
                plan_name,
            } => write!(
                f,
                "You have reached the limit of {} {} for the {} plan. Upgrade your plan to add more.",
                limit, resource, plan_name
            ),
            Self::StoreNotFound { store_id } => write!(f, "Store not found: {}", store_id),
            Self::CategoryNotFound { category_id } => {
                write!(f, "Category not found: {}", category_id)
            }
            Self::ProductNotFound { product_id } => {
                write!(f, "Product not found: {}", product_id)
            }
            Self::AccountNotFound { account_id } => {
                write!(f, "Account not found: {}", account_id)
            }
            Self::SlugTaken { slug } => {
                write!(f, "The URL '{}' is already in use. Please choose another.", slug)
            }
            Self::NotOwner => write!(f, "You do not have access to this resource"),
            Self::NegativePrice => write!(f, "Price must not be negative"),
            Self::NoBillingCustomer { account_id } => write!(
                f,
                "No billing customer exists for account '{}'. Complete a checkout first.",
                account_id
            ),
            Self::InvalidWebhookSignature => write!(f, "Invalid webhook signature"),
            Self::WebhookTimestampExpired { age_seconds } => {
                write!(f, "Webhook timestamp expired ({} seconds old)", age_seconds)
            }
            Self::InvalidWebhookPayload { message } => {
                write!(f, "Invalid webhook payload: {}", message)
            }
            Self::InvalidRedirectUrl { url, reason } => {
                write!(f, "Invalid redirect URL '{}': {}", url, reason)
            }
            Self::RedirectDomainNotAllowed { domain } => {
                write!(f, "Redirect domain '{}' is not allowed", domain)
            }
            Self::PaymentApiError {
                operation,
                message,
                http_status,
            } => {
                write!(f, "Payment provider error during '{}': {}", operation, message)?;
                if let Some(status) = http_status {
                    write!(f, " [HTTP {}]", status)?;
                }
                Ok(())
            }
            Self::EmailAlreadyRegistered => {
                write!(f, "This email is already registered. Sign in or use another email.")
            }
            Self::InvalidCredentials => write!(f, "Invalid email or password"),
            Self::InvalidEmail => write!(f, "The email address is not valid"),
            Self::PasswordTooShort { min_length } => {
                write!(f, "Password must be at least {} characters", min_length)
            }
            Self::ConcurrentModification { entity } => {
                write!(f, "Concurrent modification detected for '{}', please retry", entity)
            }
        }
    }
}

impl std::error::Error for DomainError {}

impl From<DomainError> for VitrinaError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::PlanNotFound { .. }
            | DomainError::NoFreePlan
            | DomainError::StoreNotFound { .. }
            | DomainError::CategoryNotFound { .. }
            | DomainError::ProductNotFound { .. }
            | DomainError::AccountNotFound { .. }
            | DomainError::NoBillingCustomer { .. } => VitrinaError::NotFound(err.to_string()),

            DomainError::LimitExceeded { .. } | DomainError::NotOwner => {
                VitrinaError::Forbidden(err.to_string())
            }

            DomainError::InvalidCredentials => VitrinaError::Unauthorized(err.to_string()),

            DomainError::MissingPriceReference { .. }
            | DomainError::SlugTaken { .. }
            | DomainError::NegativePrice
            | DomainError::InvalidWebhookSignature
            | DomainError::WebhookTimestampExpired { .. }
            | DomainError::InvalidWebhookPayload { .. }
            | DomainError::InvalidRedirectUrl { .. }
            | DomainError::RedirectDomainNotAllowed { .. }
            | DomainError::EmailAlreadyRegistered
            | DomainError::InvalidEmail
            | DomainError::PasswordTooShort { .. } => VitrinaError::BadRequest(err.to_string()),

            DomainError::PaymentApiError { http_status, .. } => match http_status {
                Some(400..=499) => VitrinaError::BadRequest(err.to_string()),
                _ => VitrinaError::ServiceUnavailable(err.to_string()),
            },

            DomainError::ConcurrentModification { .. } => VitrinaError::Internal(err.to_string()),
        }
    }
}

impl DomainError {
    /// Check if this is a client error (bad input, limit, unresolved ref).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::ConcurrentModification { .. }
                | Self::PaymentApiError {
                    http_status: Some(500..=599) | None,
                    ..
                }
        )
    }

    /// Check if retrying the operation could succeed without changes.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrentModification { .. } => true,
            Self::PaymentApiError { http_status, .. } => {
                matches!(http_status, Some(429) | Some(500..=599) | None)
            }
            _ => false,
        }
    }
}
