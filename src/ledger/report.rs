//! # Reports, Transitions and Revisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ScoreBreakdown;

use super::state::ReportStatus;

/// One entry of a report's append-only status log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Store-wide append order
    pub seq: u64,
    pub from: Option<ReportStatus>,
    pub to: ReportStatus,
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

/// A user's dispute of an attributed reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonReport {
    pub id: Uuid,
    pub event_id: Uuid,
    pub reason_id: Uuid,
    pub user_id: Uuid,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub transitions: Vec<StatusTransition>,
}

/// Where a report sits in a status queue
pub type QueuePosition = (DateTime<Utc>, Uuid);

impl ReasonReport {
    pub fn queue_position(&self) -> QueuePosition {
        (self.created_at, self.id)
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn last_changed_at(&self) -> DateTime<Utc> {
        self.transitions
            .last()
            .map(|t| t.changed_at)
            .unwrap_or(self.created_at)
    }
}

/// Immutable record of a confidence change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: Uuid,
    pub report_id: Uuid,
    pub event_id: Uuid,
    pub reason_id: Uuid,
    pub revision_reason: String,
    pub confidence_before: f64,
    pub confidence_after: f64,
    pub breakdown_after: ScoreBreakdown,
    pub revised_at: DateTime<Utc>,
}

impl RevisionRecord {
    pub fn delta(&self) -> f64 {
        self.confidence_after - self.confidence_before
    }
}

/// Revision carried by a `resolved` transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRequest {
    /// Confidence the caller read before computing the revision
    pub expected_confidence: f64,
    pub new_confidence: f64,
    pub breakdown: ScoreBreakdown,
    pub revision_reason: String,
}

/// Transition entry as surfaced in an event's history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryTransition {
    pub report_id: Uuid,
    pub reason_id: Uuid,
    pub from: Option<ReportStatus>,
    pub to: ReportStatus,
    pub changed_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Summary attached to a revision history read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryMeta {
    pub event_id: Uuid,
    pub report_count: usize,
    pub open_report_count: usize,
    pub revision_count: usize,
    pub last_revised_at: Option<DateTime<Utc>>,
}

/// Everything the ledger knows about an event's disputes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionHistory {
    pub revision_history: Vec<RevisionRecord>,
    pub status_transitions: Vec<HistoryTransition>,
    pub meta: HistoryMeta,
}

/// Outcome of a successful `advance`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvanceOutcome {
    pub report: ReasonReport,
    pub revision: Option<RevisionRecord>,
}
