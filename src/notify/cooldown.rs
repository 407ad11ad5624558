//! # Cooldown Gate
//!
//! Suppresses repeat alerts for the same `(user_id, event_id)` inside a
//! fixed window. State lives behind [`CooldownStore`] so several engine
//! instances can share it.
//!
//! The gate never blocks a state change. Losing a race here costs at most
//! one duplicate or one missed alert.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// CAS attempts before the gate assumes a concurrent sender won
const MAX_CAS_ATTEMPTS: usize = 3;

/// Keyed last-sent timestamps
pub trait CooldownStore: Send + Sync + Debug {
    fn last_sent(&self, user_id: Uuid, event_id: Uuid) -> Option<DateTime<Utc>>;

    /// Store `next` only if the current value is still `expected`
    fn compare_and_set(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        expected: Option<DateTime<Utc>>,
        next: DateTime<Utc>,
    ) -> bool;
}

/// Retention of [`MemoryCooldownStore::new`]
const DEFAULT_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Default)]
struct Entries {
    last_sent: HashMap<(Uuid, Uuid), DateTime<Utc>>,
    pruned_at: Option<DateTime<Utc>>,
}

/// In-process cooldown state
///
/// Entries older than the retention are dropped, at most once per
/// retention period. A dropped entry reads as "never sent", which the
/// gate treats the same as an expired one, so the retention must be at
/// least the gate window.
#[derive(Debug)]
pub struct MemoryCooldownStore {
    entries: RwLock<Entries>,
    retention: Duration,
}

impl Default for MemoryCooldownStore {
    fn default() -> Self {
        Self::with_retention(Duration::hours(DEFAULT_RETENTION_HOURS))
    }
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            retention,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.last_sent.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Entries {
    fn prune(&mut self, now: DateTime<Utc>, retention: Duration) {
        let due = self.pruned_at.map_or(true, |at| now - at >= retention);
        if !due {
            return;
        }
        self.last_sent.retain(|_, sent| now - *sent < retention);
        self.pruned_at = Some(now);
    }
}

impl CooldownStore for MemoryCooldownStore {
    fn last_sent(&self, user_id: Uuid, event_id: Uuid) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .ok()
            .and_then(|e| e.last_sent.get(&(user_id, event_id)).copied())
    }

    fn compare_and_set(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        expected: Option<DateTime<Utc>>,
        next: DateTime<Utc>,
    ) -> bool {
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(_) => return false,
        };
        let key = (user_id, event_id);
        if entries.last_sent.get(&key).copied() != expected {
            return false;
        }
        entries.last_sent.insert(key, next);
        entries.prune(next, self.retention);
        true
    }
}

/// Outcome of consulting the gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Allow,
    Suppress {
        last_sent: DateTime<Utc>,
        retry_after: Duration,
    },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    /// Human-readable cooldown message, `None` when allowed
    pub fn message(&self) -> Option<String> {
        match self {
            GateDecision::Allow => None,
            GateDecision::Suppress { retry_after, .. } => Some(format!(
                "You were already alerted about this event. Next alert possible in {}s.",
                retry_after.num_seconds().max(1)
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CooldownGate {
    store: Arc<dyn CooldownStore>,
    window: Duration,
}

impl CooldownGate {
    pub fn new(store: Arc<dyn CooldownStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when an alert may go out now; records `now` as last sent
    pub fn should_notify(&self, user_id: Uuid, event_id: Uuid, now: DateTime<Utc>) -> bool {
        self.check(user_id, event_id, now).is_allowed()
    }

    pub fn check(&self, user_id: Uuid, event_id: Uuid, now: DateTime<Utc>) -> GateDecision {
        let mut last = self.store.last_sent(user_id, event_id);
        for _ in 0..MAX_CAS_ATTEMPTS {
            if let Some(sent) = last {
                let elapsed = now - sent;
                if elapsed < self.window {
                    return GateDecision::Suppress {
                        last_sent: sent,
                        retry_after: self.window - elapsed,
                    };
                }
            }
            if self.store.compare_and_set(user_id, event_id, last, now) {
                return GateDecision::Allow;
            }
            last = self.store.last_sent(user_id, event_id);
        }

        GateDecision::Suppress {
            last_sent: last.unwrap_or(now),
            retry_after: self.window,
        }
    }
}
