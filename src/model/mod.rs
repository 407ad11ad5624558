//! # Data Model
//!
//! Events, their attributed reasons, and the payloads the detector
//! ingests. Users, watchlists and the symbol catalog are external and
//! referenced by id only.

mod breakdown;
mod event;
mod ingest;

pub use breakdown::{ScoreBreakdown, SCORE_TOLERANCE};
pub use event::{Event, Market, PortfolioImpact, Reason, ReasonStatus, ReasonType, SessionLabel};
pub use ingest::{NewEvent, NewReason, ReasonScoring};
