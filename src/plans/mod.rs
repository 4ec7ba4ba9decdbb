//! Subscription plans: definitions, the cached catalog, and resolution.
//!
//! Plans are created and edited by an administrative actor outside this
//! core; here they are read, cached, and resolved against accounts.

mod catalog;
mod model;
mod resolver;
mod storage;

pub use catalog::PlanCatalog;
pub use model::{Plan, ResourceKind};
pub use resolver::{DEFAULT_MAX_CATEGORIES, DEFAULT_MAX_PRODUCTS, DEFAULT_MAX_STORES, default_limit};
pub use storage::{InMemoryPlanStore, PlanStore};
