//! Report State Machine
//!
//! `received -> reviewed -> resolved`
//!
//! - Linear: no skip, no cancel
//! - `received` is assigned at creation
//! - `resolved` is terminal
//! - Re-applying the current status is rejected, never a silent no-op

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

/// Lifecycle status of a reason report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Received,
    Reviewed,
    Resolved,
}

impl ReportStatus {
    /// Status every report starts in
    pub const INITIAL: ReportStatus = ReportStatus::Received;

    /// Every status in lifecycle order
    pub const LIFECYCLE: [ReportStatus; 3] = [
        ReportStatus::Received,
        ReportStatus::Reviewed,
        ReportStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Received => "received",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Resolved => "resolved",
        }
    }

    /// The single legal successor, if any
    pub fn next(&self) -> Option<ReportStatus> {
        match self {
            ReportStatus::Received => Some(ReportStatus::Reviewed),
            ReportStatus::Reviewed => Some(ReportStatus::Resolved),
            ReportStatus::Resolved => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }

    /// Validate `self -> to`
    pub fn transition_to(self, to: ReportStatus) -> EngineResult<ReportStatus> {
        match self.next() {
            Some(next) if next == to => Ok(to),
            _ => Err(EngineError::InvalidTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            }),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(ReportStatus::Received),
            "reviewed" => Ok(ReportStatus::Reviewed),
            "resolved" => Ok(ReportStatus::Resolved),
            other => Err(EngineError::invalid_input(format!(
                "unknown report status '{}'",
                other
            ))),
        }
    }
}
