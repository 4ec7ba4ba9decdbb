//! Accounts: identity, subscription state, session snapshot.

mod auth;
mod model;
mod session;
mod storage;

pub use auth::{AuthFlow, AuthSession, IdentityError, IdentityProvider, InMemoryIdentityProvider};
pub use model::{Account, PaymentOutcome, SubscriptionStatus};
pub use session::{Session, SessionState, StoreWithChildren};
pub use storage::{AccountStore, InMemoryAccountStore};
