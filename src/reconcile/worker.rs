//! The reconciliation loop.
//!
//! A cancellable task bound to the session lifetime. Ticks fire on a fixed
//! interval (default 60 seconds) and ad hoc on change notifications: an
//! account-row event runs a full tick, a plans-table event only reloads
//! the plan cache. The interval skips missed ticks, so at most one
//! reconciliation is in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::catalog::CatalogStore;
use crate::plans::PlanStore;

use super::events::{ChangeHub, TableKind};
use super::reconciler::{AccountSnapshot, Reconciler, TickOutcome};

/// Handle to a running reconciliation loop.
///
/// The loop must be shut down when the session ends so no orphaned work
/// runs against a logged-out account.
pub struct ReconcileHandle {
    shutdown: watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

impl ReconcileHandle {
    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.join.await {
            if !err.is_cancelled() {
                tracing::warn!(target: "vitrina::reconcile", error = %err, "reconcile loop panicked");
            }
        }
    }

    /// Whether the loop has already exited (e.g. the account was deleted).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Spawns reconciliation loops.
pub struct ReconcileLoop;

impl ReconcileLoop {
    /// Start the loop for one account.
    ///
    /// The first tick runs immediately; subsequent ticks follow the
    /// interval. Errors are transient by policy: they are logged and the
    /// loop simply retries on its next tick.
    pub fn spawn<C, A, P>(
        reconciler: Arc<Reconciler<C, A, P>>,
        account_id: Uuid,
        initial: AccountSnapshot,
        interval: Duration,
        hub: &ChangeHub,
    ) -> ReconcileHandle
    where
        C: CatalogStore + Clone + 'static,
        A: AccountStore + 'static,
        P: PlanStore + 'static,
    {
        let mut account_rx = hub.subscribe_row(TableKind::Accounts, &account_id.to_string());
        let mut plans_rx = hub.subscribe_table(TableKind::Plans);
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut snapshot = initial;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut account_events_open = true;
            let mut plan_events_open = true;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !run_tick(&reconciler, account_id, &mut snapshot).await {
                            break;
                        }
                    }
                    event = account_rx.recv(), if account_events_open => {
                        match event {
                            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                                // React to administrative edits within
                                // seconds instead of waiting for the poll.
                                if !run_tick(&reconciler, account_id, &mut snapshot).await {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                account_events_open = false;
                            }
                        }
                    }
                    event = plans_rx.recv(), if plan_events_open => {
                        match event {
                            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                                // Plan-table changes only reload the cache.
                                if let Err(err) = reconciler.plans().load_plans().await {
                                    tracing::warn!(
                                        target: "vitrina::reconcile",
                                        error = %err,
                                        "plan cache reload failed, will retry on next change"
                                    );
                                }
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                plan_events_open = false;
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!(
                            target: "vitrina::reconcile",
                            account_id = %account_id,
                            "reconcile loop stopped"
                        );
                        break;
                    }
                }
            }
        });

        ReconcileHandle { shutdown, join }
    }
}

/// Run one tick; returns `false` when the loop should stop.
async fn run_tick<C, A, P>(
    reconciler: &Reconciler<C, A, P>,
    account_id: Uuid,
    snapshot: &mut AccountSnapshot,
) -> bool
where
    C: CatalogStore + Clone,
    A: AccountStore,
    P: PlanStore,
{
    match reconciler.tick(account_id, snapshot).await {
        Ok(TickOutcome::AccountGone) => {
            tracing::warn!(
                target: "vitrina::reconcile",
                account_id = %account_id,
                "account no longer exists, stopping reconcile loop"
            );
            false
        }
        Ok(_) => true,
        Err(err) => {
            // Infrastructure failures are transient: keep the previous
            // consistent state and retry on the next tick.
            tracing::warn!(
                target: "vitrina::reconcile",
                account_id = %account_id,
                error = %err,
                "reconciliation tick failed, retrying next tick"
            );
            true
        }
    }
}
