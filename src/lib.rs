//! tickerwatch - reason attribution and report revision engine
//!
//! Detected price-move events carry scored reasons. Users dispute a reason
//! through a report that a background workflow takes from `received` to
//! `resolved`, possibly revising the reason's confidence. Alerts about
//! these changes pass a per-user, per-event cooldown gate.

pub mod auth;
pub mod cli;
pub mod confidence;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod http_server;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
pub mod workflow;

pub use engine::{Engine, EngineDeps};
pub use errors::{EngineError, EngineResult};
