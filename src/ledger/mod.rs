//! # Report Ledger
//!
//! User disputes against reasons, their three-step lifecycle and the
//! revision records produced when a dispute changes a confidence score.

mod report;
mod service;
mod state;

pub use report::{
    AdvanceOutcome, HistoryMeta, HistoryTransition, QueuePosition, ReasonReport, RevisionHistory,
    RevisionRecord, RevisionRequest, StatusTransition,
};
pub use service::ReportLedger;
pub use state::ReportStatus;
