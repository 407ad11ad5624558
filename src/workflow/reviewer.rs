//! Review decisions
//!
//! Gathering external evidence is the reviewer's business. The worker only
//! applies what the reviewer decides.

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::ResolutionMode;
use crate::errors::EngineResult;
use crate::ledger::ReasonReport;
use crate::model::{Reason, ReasonScoring};

/// Final decision on a reviewed report
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Attribution stands; no revision record is written
    Confirm { note: Option<String> },
    /// Re-score the reason
    Revise {
        note: Option<String>,
        revision_reason: String,
        scoring: ReasonScoring,
    },
}

pub trait Reviewer: Send + Sync + Debug {
    /// Look at a received report. The note lands on the `reviewed` transition.
    fn review(&self, report: &ReasonReport, reason: &Reason) -> EngineResult<Option<String>>;

    /// Decide a reviewed report, `None` to look again on a later tick
    fn resolve(&self, report: &ReasonReport, reason: &Reason) -> EngineResult<Option<Resolution>>;

    /// False when resolution happens outside the worker
    fn resolves(&self) -> bool {
        true
    }
}

/// Reviewer for a worker configured with `mode`
pub fn reviewer_for(mode: ResolutionMode) -> Arc<dyn Reviewer> {
    match mode {
        ResolutionMode::Manual => Arc::new(ManualReviewer),
        ResolutionMode::AutoConfirm => Arc::new(ConfirmingReviewer),
    }
}

/// Queues received reports for a human reviewer, who resolves them
/// through `advance` with or without a revision
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualReviewer;

impl Reviewer for ManualReviewer {
    fn review(&self, _report: &ReasonReport, _reason: &Reason) -> EngineResult<Option<String>> {
        Ok(Some("awaiting reviewer decision".to_string()))
    }

    fn resolve(&self, _report: &ReasonReport, _reason: &Reason) -> EngineResult<Option<Resolution>> {
        Ok(None)
    }

    fn resolves(&self) -> bool {
        false
    }
}

/// Moves every report through review and confirms the attribution
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmingReviewer;

impl Reviewer for ConfirmingReviewer {
    fn review(&self, _report: &ReasonReport, _reason: &Reason) -> EngineResult<Option<String>> {
        Ok(None)
    }

    fn resolve(&self, _report: &ReasonReport, reason: &Reason) -> EngineResult<Option<Resolution>> {
        Ok(Some(Resolution::Confirm {
            note: Some(format!(
                "attribution kept at {:.2} ({})",
                reason.confidence_score,
                reason.score_breakdown.explain()
            )),
        }))
    }
}
