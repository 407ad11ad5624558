//! # Engine Errors
//!
//! Error taxonomy shared by the event store, report ledger, revision
//! workflow and the HTTP binding.
//!
//! Every error carries a stable code, a human message, a retryable marker
//! and optional structured details. Only `StaleRevision` and
//! `TemporarilyUnavailable` are retryable.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    // ==================
    // Lookup Errors
    // ==================
    /// Entity absent
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// No report for this event has recorded a transition yet
    #[error("No revision history for event {event_id}")]
    RevisionHistoryNotFound { event_id: Uuid },

    // ==================
    // Authorization Errors
    // ==================
    /// Authorization collaborator denied access
    #[error("Not authorized to access event {event_id}")]
    Forbidden { event_id: Uuid },

    // ==================
    // Conflict Errors
    // ==================
    /// Event with the same symbol/market/window/timestamp already ingested
    #[error("Event already ingested as {existing_id}")]
    DuplicateEvent { existing_id: Uuid },

    /// An open report already exists for the reason
    #[error("A report is already open for reason {reason_id}")]
    DuplicateReasonReport { reason_id: Uuid, open_report_id: Uuid },

    /// Report state machine violation
    #[error("Invalid report transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Optimistic concurrency conflict on a reason's confidence
    #[error("Stale revision: expected confidence {expected}, found {actual}")]
    StaleRevision { expected: f64, actual: f64 },

    // ==================
    // Input Errors
    // ==================
    /// Malformed submission or ingestion payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================
    // Infrastructure Errors
    // ==================
    /// Storage or dependency outage
    #[error("Temporarily unavailable: {0}")]
    TemporarilyUnavailable(String),
}

impl EngineError {
    /// Shorthand for a `NotFound` error
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for an `InvalidInput` error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        EngineError::InvalidInput(message.into())
    }

    /// Shorthand for a `TemporarilyUnavailable` error
    pub fn unavailable(message: impl Into<String>) -> Self {
        EngineError::TemporarilyUnavailable(message.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::RevisionHistoryNotFound { .. } => "reason_revision_history_not_found",
            EngineError::Forbidden { .. } => "forbidden",
            EngineError::DuplicateEvent { .. } => "duplicate_event",
            EngineError::DuplicateReasonReport { .. } => "duplicate_reason_report",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::StaleRevision { .. } => "stale_revision",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::TemporarilyUnavailable(_) => "temporarily_unavailable",
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            EngineError::InvalidInput(_) => 400,

            // 403 Forbidden
            EngineError::Forbidden { .. } => 403,

            // 404 Not Found
            EngineError::NotFound { .. } => 404,
            EngineError::RevisionHistoryNotFound { .. } => 404,

            // 409 Conflict
            EngineError::DuplicateEvent { .. } => 409,
            EngineError::DuplicateReasonReport { .. } => 409,
            EngineError::InvalidTransition { .. } => 409,
            EngineError::StaleRevision { .. } => 409,

            // 503 Service Unavailable
            EngineError::TemporarilyUnavailable(_) => 503,
        }
    }

    /// Whether the caller may back off and retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::StaleRevision { .. } | EngineError::TemporarilyUnavailable(_)
        )
    }

    /// Whether the error means "nothing here yet" rather than a failure
    pub fn is_empty_state(&self) -> bool {
        matches!(self, EngineError::RevisionHistoryNotFound { .. })
    }

    /// Structured details for the wire body
    pub fn details(&self) -> Option<Value> {
        match self {
            EngineError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            EngineError::RevisionHistoryNotFound { event_id } => {
                Some(json!({ "event_id": event_id }))
            }
            EngineError::Forbidden { event_id } => Some(json!({ "event_id": event_id })),
            EngineError::DuplicateEvent { existing_id } => {
                Some(json!({ "existing_event_id": existing_id }))
            }
            EngineError::DuplicateReasonReport {
                reason_id,
                open_report_id,
            } => Some(json!({
                "reason_id": reason_id,
                "open_report_id": open_report_id,
            })),
            EngineError::InvalidTransition { from, to } => Some(json!({ "from": from, "to": to })),
            EngineError::StaleRevision { expected, actual } => {
                Some(json!({ "expected": expected, "actual": actual }))
            }
            EngineError::InvalidInput(_) | EngineError::TemporarilyUnavailable(_) => None,
        }
    }

    /// Wire representation
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
            details: self.details(),
        }
    }
}

/// Serializable error body returned by every transport binding
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(EngineError::not_found("event", "x").status_code(), 404);
        assert_eq!(
            EngineError::Forbidden {
                event_id: Uuid::nil()
            }
            .status_code(),
            403
        );
        assert_eq!(EngineError::invalid_input("bad").status_code(), 400);
        assert_eq!(EngineError::unavailable("down").status_code(), 503);
    }

    #[test]
    fn test_only_conflicts_and_outages_are_retryable() {
        assert!(EngineError::StaleRevision {
            expected: 0.8,
            actual: 0.6
        }
        .is_retryable());
        assert!(EngineError::unavailable("db").is_retryable());

        assert!(!EngineError::DuplicateReasonReport {
            reason_id: Uuid::nil(),
            open_report_id: Uuid::nil(),
        }
        .is_retryable());
        assert!(!EngineError::InvalidTransition {
            from: "resolved".into(),
            to: "resolved".into(),
        }
        .is_retryable());
        assert!(!EngineError::invalid_input("x").is_retryable());
    }

    #[test]
    fn test_history_not_found_code() {
        let err = EngineError::RevisionHistoryNotFound {
            event_id: Uuid::nil(),
        };
        assert_eq!(err.code(), "reason_revision_history_not_found");
        assert!(err.is_empty_state());
    }

    #[test]
    fn test_duplicate_body_points_at_open_report() {
        let open = Uuid::new_v4();
        let body = EngineError::DuplicateReasonReport {
            reason_id: Uuid::new_v4(),
            open_report_id: open,
        }
        .to_body();

        assert_eq!(body.code, "duplicate_reason_report");
        assert!(!body.retryable);
        let details = body.details.unwrap();
        assert_eq!(details["open_report_id"], json!(open));
    }
}
