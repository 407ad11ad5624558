//! # Revision Workflow
//!
//! Background driver that takes reports from `received` to `resolved`.
//! With the default manual resolution it stops at `reviewed` and a human
//! finishes the report through `advance`.

mod reviewer;
mod worker;

pub use reviewer::{reviewer_for, ConfirmingReviewer, ManualReviewer, Resolution, Reviewer};
pub use worker::{RevisionWorker, TickStats};
