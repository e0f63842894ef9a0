//! IPC event types (server to client).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tonewire_core::{EventKind, Notification};

/// Event sent from daemon to subscribed clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type
    pub event: EventKind,
    /// Event data
    pub data: Value,
}

impl Event {
    /// Wrap a router notification for the wire.
    #[must_use]
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            event: notification.kind(),
            data: serde_json::to_value(notification).unwrap_or(Value::Null),
        }
    }

    /// Decode the payload back into a notification.
    #[must_use]
    pub fn notification(&self) -> Option<Notification> {
        serde_json::from_value(self.data.clone()).ok()
    }
}
