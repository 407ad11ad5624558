//! Gate + delivery
//!
//! Every producer of user-facing alerts goes through
//! [`NotificationDispatcher::notify`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::observability::{EngineMetrics, LogEvent, Logger};

use super::cooldown::{CooldownGate, GateDecision};
use super::delivery::{Channel, Notification, NotificationKind, Notifier};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotifyOutcome {
    Sent,
    Cooldown { message: String, retry_after_secs: i64 },
}

impl NotifyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotifyOutcome::Sent)
    }
}

#[derive(Debug)]
pub struct NotificationDispatcher {
    gate: CooldownGate,
    notifier: Arc<dyn Notifier>,
    channel: Channel,
    metrics: Arc<EngineMetrics>,
}

impl NotificationDispatcher {
    pub fn new(gate: CooldownGate, notifier: Arc<dyn Notifier>, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            gate,
            notifier,
            channel: Channel::InApp,
            metrics,
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    pub fn notify(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        kind: NotificationKind,
        message: String,
        now: DateTime<Utc>,
    ) -> NotifyOutcome {
        let user = user_id.to_string();
        let event = event_id.to_string();

        match self.gate.check(user_id, event_id, now) {
            GateDecision::Allow => {
                self.notifier.deliver(Notification {
                    user_id,
                    event_id,
                    kind,
                    channel: self.channel,
                    message,
                    created_at: now,
                });
                self.metrics.increment_notifications_sent();
                Logger::info(
                    LogEvent::NotificationSent,
                    &[
                        ("channel", self.channel.as_str()),
                        ("event_id", event.as_str()),
                        ("kind", kind.as_str()),
                        ("user_id", user.as_str()),
                    ],
                );
                NotifyOutcome::Sent
            }
            decision @ GateDecision::Suppress { .. } => {
                let retry_after_secs = match &decision {
                    GateDecision::Suppress { retry_after, .. } => retry_after.num_seconds().max(1),
                    GateDecision::Allow => 0,
                };
                self.metrics.increment_notifications_suppressed();
                Logger::trace(
                    LogEvent::NotificationSuppressed,
                    &[
                        ("event_id", event.as_str()),
                        ("kind", kind.as_str()),
                        ("user_id", user.as_str()),
                    ],
                );
                NotifyOutcome::Cooldown {
                    message: decision.message().unwrap_or_default(),
                    retry_after_secs,
                }
            }
        }
    }
}
