//! # Notification Cooldown Gate
//!
//! Decides whether a state change reaches the user as an alert. State
//! changes themselves never wait on this module.

mod cooldown;
mod delivery;
mod dispatcher;

pub use cooldown::{CooldownGate, CooldownStore, GateDecision, MemoryCooldownStore};
pub use delivery::{
    Channel, ChannelNotifier, Notification, NotificationKind, NotificationReceiver, Notifier,
    OutboxNotifier,
};
pub use dispatcher::{NotificationDispatcher, NotifyOutcome};
