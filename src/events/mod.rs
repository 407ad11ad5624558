//! # Event Store
//!
//! Detected events and their attributed reasons.

mod store;

pub use store::{EventPage, EventStore, CONFIDENCE_EPSILON, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub(crate) use store::{apply_revision_in, find_event, find_reason, set_reason_status};
