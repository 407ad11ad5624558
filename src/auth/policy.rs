//! # Access Policies
//!
//! Authorization collaborator consulted before a user may dispute an
//! event's reasons. A deny surfaces as a non-retryable `Forbidden`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::model::{Event, Market};

/// Decision returned by a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Decides whether a user may act on an event
pub trait AccessPolicy: Send + Sync + std::fmt::Debug {
    fn check(&self, user_id: Uuid, event: &Event) -> Access;

    /// Users who should hear about the event at all
    fn watchers(&self, _event: &Event) -> Vec<Uuid> {
        Vec::new()
    }
}

/// Require access or fail with `Forbidden`
pub fn require_access(policy: &dyn AccessPolicy, user_id: Uuid, event: &Event) -> EngineResult<()> {
    match policy.check(user_id, event) {
        Access::Allow => Ok(()),
        Access::Deny => Err(EngineError::Forbidden { event_id: event.id }),
    }
}

/// No access control
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn check(&self, _user_id: Uuid, _event: &Event) -> Access {
        Access::Allow
    }
}

/// Users may act only on events for symbols on their watchlist
#[derive(Debug, Default)]
pub struct WatchlistPolicy {
    watchlists: RwLock<HashMap<Uuid, HashSet<(Market, String)>>>,
}

impl WatchlistPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol to a user's watchlist
    pub fn watch(&self, user_id: Uuid, market: Market, symbol: &str) {
        if let Ok(mut lists) = self.watchlists.write() {
            lists
                .entry(user_id)
                .or_default()
                .insert((market, symbol.trim().to_ascii_uppercase()));
        }
    }

    /// Remove a symbol from a user's watchlist
    pub fn unwatch(&self, user_id: Uuid, market: Market, symbol: &str) {
        if let Ok(mut lists) = self.watchlists.write() {
            if let Some(list) = lists.get_mut(&user_id) {
                list.remove(&(market, symbol.trim().to_ascii_uppercase()));
            }
        }
    }

    fn key(event: &Event) -> (Market, String) {
        (event.market, event.symbol.to_ascii_uppercase())
    }
}

impl AccessPolicy for WatchlistPolicy {
    fn check(&self, user_id: Uuid, event: &Event) -> Access {
        let key = Self::key(event);
        let allowed = self
            .watchlists
            .read()
            .map(|lists| lists.get(&user_id).map(|l| l.contains(&key)).unwrap_or(false))
            .unwrap_or(false);
        if allowed {
            Access::Allow
        } else {
            Access::Deny
        }
    }

    fn watchers(&self, event: &Event) -> Vec<Uuid> {
        let key = Self::key(event);
        let mut users: Vec<Uuid> = self
            .watchlists
            .read()
            .map(|lists| {
                lists
                    .iter()
                    .filter(|(_, l)| l.contains(&key))
                    .map(|(u, _)| *u)
                    .collect()
            })
            .unwrap_or_default();
        users.sort();
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReasonStatus, SessionLabel};
    use chrono::Utc;

    fn event(symbol: &str, market: Market) -> Event {
        Event {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            market,
            percent_change: 3.1,
            window_minutes: 5,
            detected_at: Utc::now(),
            exchange_timezone: "Asia/Seoul".into(),
            session: SessionLabel::Regular,
            reasons: Vec::new(),
            portfolio_impact: None,
            reason_status: ReasonStatus::Unreported,
            revision_hint: None,
        }
    }

    #[test]
    fn test_allow_all() {
        let e = event("005930", Market::Kr);
        assert!(require_access(&AllowAll, Uuid::new_v4(), &e).is_ok());
    }

    #[test]
    fn test_watchlist_gates_access() {
        let policy = WatchlistPolicy::new();
        let user = Uuid::new_v4();
        let e = event("005930", Market::Kr);

        let err = require_access(&policy, user, &e).unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert!(!err.is_retryable());

        policy.watch(user, Market::Kr, "005930");
        assert_eq!(policy.check(user, &e), Access::Allow);
        assert_eq!(policy.watchers(&e), vec![user]);

        // Same ticker on another market is a different instrument
        assert_eq!(policy.check(user, &event("005930", Market::Us)), Access::Deny);

        policy.unwatch(user, Market::Kr, "005930");
        assert_eq!(policy.check(user, &e), Access::Deny);
    }
}
