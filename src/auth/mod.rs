//! # Authorization
//!
//! Access checks delegated to an external collaborator. The engine only
//! needs allow/deny per `(user, event)` and, for new-event alerts, the set
//! of users watching the event's symbol.

pub mod policy;

pub use policy::{require_access, Access, AccessPolicy, AllowAll, WatchlistPolicy};
