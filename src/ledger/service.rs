//! # Report Ledger
//!
//! Owns reason reports.
//!
//! ## Invariants
//! - At most one non-`resolved` report per reason. The check and the
//!   insert happen in one store transaction.
//! - A report's transitions are always a prefix of
//!   `[received, reviewed, resolved]`.
//! - A `resolved` transition carrying a revision commits together with the
//!   confidence change and the revision record, or not at all.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::{require_access, AccessPolicy};
use crate::errors::{EngineError, EngineResult};
use crate::events::{apply_revision_in, find_event, find_reason, set_reason_status};
use crate::model::ReasonStatus;
use crate::observability::{EngineMetrics, LogEvent, Logger};
use crate::store::{Database, Tables};

use super::report::{
    AdvanceOutcome, HistoryMeta, HistoryTransition, QueuePosition, ReasonReport, RevisionHistory,
    RevisionRecord, RevisionRequest, StatusTransition,
};
use super::state::ReportStatus;

#[derive(Debug)]
pub struct ReportLedger {
    db: Arc<Database>,
    policy: Arc<dyn AccessPolicy>,
    metrics: Arc<EngineMetrics>,
}

impl ReportLedger {
    pub fn new(
        db: Arc<Database>,
        policy: Arc<dyn AccessPolicy>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            db,
            policy,
            metrics,
        }
    }

    /// File a dispute against one reason of an event
    pub fn submit_report(&self, event_id: Uuid, reason_id: Uuid, user_id: Uuid) -> EngineResult<Uuid> {
        let result = self.db.transaction(|tables| {
            let event = find_event(tables, event_id)?;
            find_reason(event, reason_id)?;
            require_access(self.policy.as_ref(), user_id, event)?;

            if let Some(open) = tables.open_reports.get(&reason_id) {
                return Err(EngineError::DuplicateReasonReport {
                    reason_id,
                    open_report_id: *open,
                });
            }

            let now = Utc::now();
            let report = ReasonReport {
                id: Uuid::new_v4(),
                event_id,
                reason_id,
                user_id,
                status: ReportStatus::INITIAL,
                created_at: now,
                transitions: vec![StatusTransition {
                    seq: tables.next_seq(),
                    from: None,
                    to: ReportStatus::INITIAL,
                    changed_at: now,
                    note: None,
                }],
            };
            let report_id = report.id;

            tables.open_reports.insert(reason_id, report_id);
            tables.reports.insert(report_id, report);
            set_reason_status(tables, event_id, reason_id, ReasonStatus::UnderReview)?;
            Ok(report_id)
        });

        let reason = reason_id.to_string();
        let user = user_id.to_string();
        match &result {
            Ok(report_id) => {
                self.metrics.increment_reports_submitted();
                let report = report_id.to_string();
                Logger::info(
                    LogEvent::ReportSubmitted,
                    &[
                        ("report_id", report.as_str()),
                        ("reason_id", reason.as_str()),
                        ("user_id", user.as_str()),
                    ],
                );
            }
            Err(EngineError::DuplicateReasonReport { open_report_id, .. }) => {
                self.metrics.increment_reports_duplicate();
                let open = open_report_id.to_string();
                Logger::info(
                    LogEvent::ReportDuplicateRejected,
                    &[
                        ("open_report_id", open.as_str()),
                        ("reason_id", reason.as_str()),
                        ("user_id", user.as_str()),
                    ],
                );
            }
            Err(_) => {}
        }
        result
    }

    /// Move a report to its next status
    ///
    /// `revision` is only accepted with `to == resolved`. Without it the
    /// report resolves as "no change" and the reason is marked confirmed.
    pub fn advance(
        &self,
        report_id: Uuid,
        to: ReportStatus,
        note: Option<String>,
        revision: Option<RevisionRequest>,
    ) -> EngineResult<AdvanceOutcome> {
        let result = self
            .db
            .transaction(|tables| advance_in(tables, report_id, to, note, revision));

        let report = report_id.to_string();
        match &result {
            Ok(outcome) => {
                self.metrics.increment_transitions_applied();
                let from = outcome
                    .report
                    .transitions
                    .last()
                    .and_then(|t| t.from)
                    .map(|s| s.as_str())
                    .unwrap_or("none");
                Logger::info(
                    LogEvent::ReportAdvanced,
                    &[
                        ("from", from),
                        ("report_id", report.as_str()),
                        ("to", outcome.report.status.as_str()),
                    ],
                );
                if let Some(record) = &outcome.revision {
                    self.metrics.increment_revisions_applied();
                    let before = format!("{:.4}", record.confidence_before);
                    let after = format!("{:.4}", record.confidence_after);
                    let reason = record.reason_id.to_string();
                    Logger::info(
                        LogEvent::RevisionApplied,
                        &[
                            ("after", after.as_str()),
                            ("before", before.as_str()),
                            ("reason_id", reason.as_str()),
                            ("report_id", report.as_str()),
                        ],
                    );
                }
            }
            Err(EngineError::InvalidTransition { .. }) => {
                self.metrics.increment_transitions_rejected();
            }
            Err(err @ EngineError::StaleRevision { .. }) => {
                self.metrics.increment_revisions_stale();
                let message = err.to_string();
                Logger::warn(
                    LogEvent::RevisionStale,
                    &[("error", message.as_str()), ("report_id", report.as_str())],
                );
            }
            Err(_) => {}
        }
        result
    }

    pub fn get_report(&self, report_id: Uuid) -> EngineResult<ReasonReport> {
        self.db.read(|tables| {
            tables
                .reports
                .get(&report_id)
                .cloned()
                .ok_or_else(|| EngineError::not_found("report", report_id))
        })
    }

    /// The open report for a reason, if any
    pub fn open_report_for(&self, reason_id: Uuid) -> EngineResult<Option<ReasonReport>> {
        self.db.read(|tables| {
            Ok(tables
                .open_reports
                .get(&reason_id)
                .and_then(|id| tables.reports.get(id))
                .cloned())
        })
    }

    /// Oldest first, at most `limit`
    pub fn list_reports_by_status(
        &self,
        status: ReportStatus,
        limit: usize,
    ) -> EngineResult<Vec<ReasonReport>> {
        self.list_reports_by_status_after(status, None, limit)
    }

    /// Oldest first, strictly after `after` in queue order, at most `limit`
    pub fn list_reports_by_status_after(
        &self,
        status: ReportStatus,
        after: Option<QueuePosition>,
        limit: usize,
    ) -> EngineResult<Vec<ReasonReport>> {
        self.db.read(|tables| {
            let mut reports: Vec<ReasonReport> = tables
                .reports
                .values()
                .filter(|r| r.status == status)
                .filter(|r| after.map_or(true, |pos| r.queue_position() > pos))
                .cloned()
                .collect();
            reports.sort_by_key(ReasonReport::queue_position);
            reports.truncate(limit);
            Ok(reports)
        })
    }

    /// Newest first
    pub fn list_reports_for_user(&self, user_id: Uuid) -> EngineResult<Vec<ReasonReport>> {
        self.db.read(|tables| {
            let mut reports: Vec<ReasonReport> = tables
                .reports
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(reports)
        })
    }

    /// Revisions and status transitions recorded for an event
    ///
    /// `RevisionHistoryNotFound` means no report has been filed yet. It is
    /// an empty state, not a failure worth retrying.
    pub fn get_revision_history(&self, event_id: Uuid) -> EngineResult<RevisionHistory> {
        self.db.read(|tables| {
            find_event(tables, event_id)?;

            let reports: Vec<&ReasonReport> = tables
                .reports
                .values()
                .filter(|r| r.event_id == event_id && !r.transitions.is_empty())
                .collect();
            if reports.is_empty() {
                return Err(EngineError::RevisionHistoryNotFound { event_id });
            }

            let mut entries: Vec<(u64, HistoryTransition)> = reports
                .iter()
                .flat_map(|r| {
                    r.transitions.iter().map(move |t| {
                        (
                            t.seq,
                            HistoryTransition {
                                report_id: r.id,
                                reason_id: r.reason_id,
                                from: t.from,
                                to: t.to,
                                changed_at: t.changed_at,
                                note: t.note.clone(),
                            },
                        )
                    })
                })
                .collect();
            entries.sort_by_key(|(seq, _)| *seq);

            let revision_history: Vec<RevisionRecord> = tables
                .revisions
                .iter()
                .filter(|r| r.event_id == event_id)
                .cloned()
                .collect();

            let meta = HistoryMeta {
                event_id,
                report_count: reports.len(),
                open_report_count: reports.iter().filter(|r| r.is_open()).count(),
                revision_count: revision_history.len(),
                last_revised_at: revision_history.last().map(|r| r.revised_at),
            };

            Ok(RevisionHistory {
                revision_history,
                status_transitions: entries.into_iter().map(|(_, t)| t).collect(),
                meta,
            })
        })
    }
}

fn advance_in(
    tables: &mut Tables,
    report_id: Uuid,
    to: ReportStatus,
    note: Option<String>,
    revision: Option<RevisionRequest>,
) -> EngineResult<AdvanceOutcome> {
    let mut report = tables
        .reports
        .get(&report_id)
        .cloned()
        .ok_or_else(|| EngineError::not_found("report", report_id))?;

    let from = report.status;
    let to = from.transition_to(to)?;
    if revision.is_some() && to != ReportStatus::Resolved {
        return Err(EngineError::invalid_input(
            "a revision can only accompany the resolved transition",
        ));
    }

    let changed_at = monotonic_now(report.last_changed_at());
    let seq = tables.next_seq();
    report.transitions.push(StatusTransition {
        seq,
        from: Some(from),
        to,
        changed_at,
        note,
    });
    report.status = to;

    let mut record = None;
    if to == ReportStatus::Resolved {
        if tables.open_reports.get(&report.reason_id) == Some(&report.id) {
            tables.open_reports.remove(&report.reason_id);
        }

        match revision {
            Some(request) => {
                if request.revision_reason.trim().is_empty() {
                    return Err(EngineError::invalid_input("revision_reason is required"));
                }
                let before = apply_revision_in(
                    tables,
                    report.event_id,
                    report.reason_id,
                    request.expected_confidence,
                    request.new_confidence,
                    request.breakdown.clone(),
                )?;
                let revision = RevisionRecord {
                    id: Uuid::new_v4(),
                    report_id: report.id,
                    event_id: report.event_id,
                    reason_id: report.reason_id,
                    revision_reason: request.revision_reason,
                    confidence_before: before,
                    confidence_after: request.new_confidence,
                    breakdown_after: request.breakdown,
                    revised_at: changed_at,
                };
                tables.revisions.push(revision.clone());
                record = Some(revision);
            }
            None => {
                set_reason_status(
                    tables,
                    report.event_id,
                    report.reason_id,
                    ReasonStatus::Confirmed,
                )?;
            }
        }
    }

    tables.reports.insert(report.id, report.clone());
    Ok(AdvanceOutcome {
        report,
        revision: record,
    })
}

/// Wall clock, never earlier than the previous transition
fn monotonic_now(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AllowAll, WatchlistPolicy};
    use crate::confidence::ConfidenceModel;
    use crate::events::EventStore;
    use crate::model::{
        Market, NewEvent, NewReason, ReasonScoring, ReasonType, ScoreBreakdown, SessionLabel,
    };

    struct Fixture {
        events: EventStore,
        ledger: ReportLedger,
        event_id: Uuid,
        reason_id: Uuid,
    }

    fn fixture_with(policy: Arc<dyn AccessPolicy>) -> Fixture {
        let db = Arc::new(Database::in_memory());
        let metrics = Arc::new(EngineMetrics::new());
        let events = EventStore::new(
            Arc::clone(&db),
            Arc::new(ConfidenceModel::default()),
            Arc::clone(&metrics),
        );
        let ledger = ReportLedger::new(db, policy, metrics);

        let event_id = events
            .create_event(
                NewEvent {
                    symbol: "NVDA".into(),
                    market: Market::Us,
                    percent_change: -6.0,
                    window_minutes: 15,
                    detected_at: Utc::now(),
                    exchange_timezone: "America/New_York".into(),
                    session: SessionLabel::Post,
                    portfolio_impact: None,
                },
                vec![NewReason {
                    rank: 1,
                    reason_type: ReasonType::Filing,
                    summary: "8-K filed".into(),
                    source_url: "https://sec.example.com/8k".into(),
                    published_at: Utc::now(),
                    scoring: ReasonScoring::Scored {
                        confidence: 0.82,
                        breakdown: breakdown(&[("relevance", 0.4), ("source_reliability", 0.42)]),
                    },
                }],
            )
            .unwrap();
        let reason_id = events.get_event(event_id).unwrap().reasons[0].id;

        Fixture {
            events,
            ledger,
            event_id,
            reason_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(AllowAll))
    }

    fn breakdown(pairs: &[(&str, f64)]) -> ScoreBreakdown {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_submit_creates_received_report() {
        let f = fixture();
        let user = Uuid::new_v4();
        let id = f.ledger.submit_report(f.event_id, f.reason_id, user).unwrap();

        let report = f.ledger.get_report(id).unwrap();
        assert_eq!(report.status, ReportStatus::Received);
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].from, None);
        assert_eq!(report.transitions[0].to, ReportStatus::Received);

        let event = f.events.get_event(f.event_id).unwrap();
        assert_eq!(event.reason_status, ReasonStatus::UnderReview);
    }

    #[test]
    fn test_second_open_report_rejected() {
        let f = fixture();
        let first = f
            .ledger
            .submit_report(f.event_id, f.reason_id, Uuid::new_v4())
            .unwrap();
        let err = f
            .ledger
            .submit_report(f.event_id, f.reason_id, Uuid::new_v4())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::DuplicateReasonReport {
                reason_id: f.reason_id,
                open_report_id: first,
            }
        );
        assert_eq!(f.ledger.list_reports_by_status(ReportStatus::Received, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_reason_and_forbidden() {
        let f = fixture();
        let err = f
            .ledger
            .submit_report(f.event_id, Uuid::new_v4(), Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let g = fixture_with(Arc::new(WatchlistPolicy::new()));
        let err = g
            .ledger
            .submit_report(g.event_id, g.reason_id, Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert!(g.ledger.get_revision_history(g.event_id).is_err());
    }

    #[test]
    fn test_skip_and_repeat_rejected() {
        let f = fixture();
        let id = f
            .ledger
            .submit_report(f.event_id, f.reason_id, Uuid::new_v4())
            .unwrap();

        let err = f
            .ledger
            .advance(id, ReportStatus::Resolved, None, None)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");

        f.ledger.advance(id, ReportStatus::Reviewed, None, None).unwrap();
        let err = f
            .ledger
            .advance(id, ReportStatus::Reviewed, None, None)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
        assert_eq!(f.ledger.get_report(id).unwrap().transitions.len(), 2);
    }

    #[test]
    fn test_stale_revision_rolls_back_transition() {
        let f = fixture();
        let id = f
            .ledger
            .submit_report(f.event_id, f.reason_id, Uuid::new_v4())
            .unwrap();
        f.ledger.advance(id, ReportStatus::Reviewed, None, None).unwrap();

        let request = RevisionRequest {
            expected_confidence: 0.5,
            new_confidence: 0.61,
            breakdown: breakdown(&[("relevance", 0.3), ("source_reliability", 0.31)]),
            revision_reason: "filing was a routine amendment".into(),
        };
        let err = f
            .ledger
            .advance(id, ReportStatus::Resolved, None, Some(request))
            .unwrap_err();
        assert!(matches!(err, EngineError::StaleRevision { .. }));

        let report = f.ledger.get_report(id).unwrap();
        assert_eq!(report.status, ReportStatus::Reviewed);
        assert_eq!(report.transitions.len(), 2);
        let reason = f.events.get_reason(f.event_id, f.reason_id).unwrap();
        assert!((reason.confidence_score - 0.82).abs() < 1e-12);
        assert!(f.ledger.open_report_for(f.reason_id).unwrap().is_some());
    }

    #[test]
    fn test_revision_only_on_resolve() {
        let f = fixture();
        let id = f
            .ledger
            .submit_report(f.event_id, f.reason_id, Uuid::new_v4())
            .unwrap();
        let request = RevisionRequest {
            expected_confidence: 0.82,
            new_confidence: 0.5,
            breakdown: breakdown(&[("relevance", 0.5)]),
            revision_reason: "x".into(),
        };
        let err = f
            .ledger
            .advance(id, ReportStatus::Reviewed, None, Some(request))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn test_resolve_without_revision_confirms_reason() {
        let f = fixture();
        let id = f
            .ledger
            .submit_report(f.event_id, f.reason_id, Uuid::new_v4())
            .unwrap();
        f.ledger.advance(id, ReportStatus::Reviewed, None, None).unwrap();
        let outcome = f
            .ledger
            .advance(
                id,
                ReportStatus::Resolved,
                Some("attribution holds".into()),
                None,
            )
            .unwrap();

        assert!(outcome.revision.is_none());
        let history = f.ledger.get_revision_history(f.event_id).unwrap();
        assert!(history.revision_history.is_empty());
        assert_eq!(history.status_transitions.len(), 3);
        assert_eq!(
            history.status_transitions[2].note.as_deref(),
            Some("attribution holds")
        );

        let event = f.events.get_event(f.event_id).unwrap();
        assert_eq!(event.reason_status, ReasonStatus::Confirmed);

        // Resolved reports no longer block new disputes
        assert!(f
            .ledger
            .submit_report(f.event_id, f.reason_id, Uuid::new_v4())
            .is_ok());
    }

    #[test]
    fn test_history_empty_state() {
        let f = fixture();
        let err = f.ledger.get_revision_history(f.event_id).unwrap_err();
        assert_eq!(err, EngineError::RevisionHistoryNotFound { event_id: f.event_id });
        assert!(err.is_empty_state());

        let err = f.ledger.get_revision_history(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
