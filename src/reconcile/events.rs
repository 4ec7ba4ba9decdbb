//! Change notifications from the backing store.
//!
//! The external store emits change events on logical channels scoped by
//! table and, for some tables, by row key. The hub stands in for that
//! transport: publishers announce inserts/updates/deletes and subscribers
//! receive them over broadcast channels. Dropping a receiver is the
//! unsubscribe.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

/// Tables that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Accounts,
    Plans,
    Stores,
    Categories,
    Products,
}

/// The kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A change to one row of one table.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: TableKind,
    pub op: ChangeOp,
    /// Row key, when the emitting table has one worth scoping by.
    pub row_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChannelKey {
    Table(TableKind),
    Row(TableKind, String),
}

const CHANNEL_CAPACITY: usize = 64;

/// Routes change events to table- and row-scoped subscribers.
#[derive(Clone, Default)]
pub struct ChangeHub {
    channels: Arc<Mutex<HashMap<ChannelKey, broadcast::Sender<ChangeEvent>>>>,
}

impl ChangeHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, key: ChannelKey) -> broadcast::Sender<ChangeEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to every change on a table.
    #[must_use]
    pub fn subscribe_table(&self, table: TableKind) -> broadcast::Receiver<ChangeEvent> {
        self.sender(ChannelKey::Table(table)).subscribe()
    }

    /// Subscribe to changes on a single row.
    #[must_use]
    pub fn subscribe_row(&self, table: TableKind, row_id: &str) -> broadcast::Receiver<ChangeEvent> {
        self.sender(ChannelKey::Row(table, row_id.to_string()))
            .subscribe()
    }

    /// Publish a change to the table channel and, when a row key is given,
    /// the row channel.
    pub fn publish(&self, event: ChangeEvent) {
        // Send errors just mean nobody is listening.
        let _ = self.sender(ChannelKey::Table(event.table)).send(event.clone());
        if let Some(row_id) = &event.row_id {
            let _ = self
                .sender(ChannelKey::Row(event.table, row_id.clone()))
                .send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn table_and_row_scoping() {
        let hub = ChangeHub::new();
        let mut table_rx = hub.subscribe_table(TableKind::Accounts);
        let mut row_rx = hub.subscribe_row(TableKind::Accounts, "user-1");
        let mut other_row_rx = hub.subscribe_row(TableKind::Accounts, "user-2");

        hub.publish(ChangeEvent {
            table: TableKind::Accounts,
            op: ChangeOp::Update,
            row_id: Some("user-1".to_string()),
        });

        assert!(table_rx.try_recv().is_ok());
        assert!(row_rx.try_recv().is_ok());
        assert!(other_row_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let hub = ChangeHub::new();
        hub.publish(ChangeEvent {
            table: TableKind::Plans,
            op: ChangeOp::Delete,
            row_id: None,
        });
    }
}
