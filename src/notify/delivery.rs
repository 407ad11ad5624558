//! Delivery collaborators
//!
//! The engine hands a notification over and forgets it. Transport (push,
//! email) and delivery status belong to the receiving side.

use std::fmt::{self, Debug};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What produced the alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewEvent,
    StatusChanged,
    Resolved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewEvent => "new_event",
            NotificationKind::StatusChanged => "status_changed",
            NotificationKind::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub kind: NotificationKind,
    pub channel: Channel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Receives notifications the cooldown gate let through
pub trait Notifier: Send + Sync + Debug {
    fn deliver(&self, notification: Notification);
}

pub type NotificationSender = mpsc::UnboundedSender<Notification>;
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

/// Forwards notifications to an in-process consumer task
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: NotificationSender,
}

impl ChannelNotifier {
    pub fn new() -> (Self, NotificationReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn deliver(&self, notification: Notification) {
        // A closed receiver drops the alert; state is already committed.
        let _ = self.sender.send(notification);
    }
}

/// Keeps delivered notifications in memory until drained
#[derive(Debug, Default)]
pub struct OutboxNotifier {
    outbox: Mutex<Vec<Notification>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.outbox
            .lock()
            .map(|mut o| std::mem::take(&mut *o))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.outbox.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for OutboxNotifier {
    fn deliver(&self, notification: Notification) {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification {
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            kind: NotificationKind::NewEvent,
            channel: Channel::InApp,
            message: "AAPL moved -4.20% in 5m".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let sent = notification();
        notifier.deliver(sent.clone());
        assert_eq!(rx.recv().await, Some(sent));
    }

    #[test]
    fn test_channel_notifier_tolerates_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.deliver(notification());
    }

    #[test]
    fn test_outbox_drains() {
        let outbox = OutboxNotifier::new();
        outbox.deliver(notification());
        outbox.deliver(notification());
        assert_eq!(outbox.drain().len(), 2);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_channel_wire_name() {
        assert_eq!(serde_json::to_string(&Channel::InApp).unwrap(), "\"in_app\"");
    }
}
