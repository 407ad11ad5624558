//! # Shared Store
//!
//! The event store and the report ledger share this store so that a
//! resolution (transition + confidence revision + revision record)
//! commits as a single transaction.

mod backend;
mod database;
mod errors;
mod tables;

pub use backend::{FileBackend, MemoryBackend, Snapshot, StoreBackend, WriterLock};
pub use database::Database;
pub use errors::{StoreError, StoreResult};
pub use tables::Tables;
