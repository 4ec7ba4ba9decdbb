//! Transient user-facing notifications.
//!
//! The reconciler surfaces exactly one notification on a plan change and
//! is otherwise silent; where those notifications go is the application's
//! decision, so it is a trait.

use uuid::Uuid;

/// Sink for transient user-facing notifications.
pub trait Notifier: Send + Sync {
    /// The account's plan changed (upgrade, downgrade, or admin edit).
    fn plan_changed(&self, account_id: Uuid, plan_name: &str);
}

/// Notifier that logs through `tracing`.
#[derive(Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for TracingNotifier {
    fn plan_changed(&self, account_id: Uuid, plan_name: &str) {
        tracing::info!(
            target: "vitrina::notify",
            account_id = %account_id,
            plan = plan_name,
            "plan updated"
        );
    }
}

/// Notifier that discards everything.
#[derive(Default)]
pub struct NoOpNotifier;

impl NoOpNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for NoOpNotifier {
    fn plan_changed(&self, _account_id: Uuid, _plan_name: &str) {}
}

/// Notifier that records notifications for assertions.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    notifications: std::sync::Arc<std::sync::Mutex<Vec<(Uuid, String)>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn plan_changes(&self) -> Vec<(Uuid, String)> {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn plan_changed(&self, account_id: Uuid, plan_name: &str) {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((account_id, plan_name.to_string()));
    }
}
