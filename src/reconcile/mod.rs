//! Account-state reconciliation.
//!
//! A periodic loop re-fetches the account record, detects plan or
//! subscription drift, and re-applies limit enforcement. Change
//! notifications from the backing store trigger the same work ad hoc.

mod events;
mod reconciler;
mod worker;

pub use events::{ChangeEvent, ChangeHub, ChangeOp, TableKind};
pub use reconciler::{AccountSnapshot, Reconciler, TickOutcome};
pub use worker::{ReconcileHandle, ReconcileLoop};
