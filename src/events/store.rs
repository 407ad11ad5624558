//! # Event Store
//!
//! Owns detected events and their reasons. Events are never deleted; the
//! only mutation after ingestion is a confidence revision of one reason
//! plus the recomputed summary fields.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::confidence::{validate_scored, ConfidenceModel};
use crate::errors::{EngineError, EngineResult};
use crate::model::{
    Event, NewEvent, NewReason, Reason, ReasonScoring, ReasonStatus, ScoreBreakdown,
};
use crate::observability::{EngineMetrics, LogEvent, Logger};
use crate::store::{Database, Tables};

/// Two confidences closer than this are the same value
pub const CONFIDENCE_EPSILON: f64 = 1e-9;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// One page of `list_events`
#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub next_cursor: Option<String>,
}

#[derive(Debug)]
pub struct EventStore {
    db: Arc<Database>,
    model: Arc<ConfidenceModel>,
    metrics: Arc<EngineMetrics>,
}

impl EventStore {
    pub fn new(db: Arc<Database>, model: Arc<ConfidenceModel>, metrics: Arc<EngineMetrics>) -> Self {
        Self { db, model, metrics }
    }

    /// Ingest a detector event; idempotent on symbol/market/window/timestamp
    pub fn create_event(&self, event: NewEvent, reasons: Vec<NewReason>) -> EngineResult<Uuid> {
        validate_header(&event)?;
        validate_ranks(&reasons)?;

        let event_id = Uuid::new_v4();
        let mut scored = Vec::with_capacity(reasons.len());
        for reason in reasons {
            scored.push(self.build_reason(event_id, reason)?);
        }
        scored.sort_by_key(|r| r.rank);

        let record = Event {
            id: event_id,
            symbol: event.symbol.trim().to_ascii_uppercase(),
            market: event.market,
            percent_change: event.percent_change,
            window_minutes: event.window_minutes,
            detected_at: event.detected_at,
            exchange_timezone: event.exchange_timezone,
            session: event.session,
            reasons: scored,
            portfolio_impact: event.portfolio_impact,
            reason_status: ReasonStatus::Unreported,
            revision_hint: None,
        };
        let key = record.dedup_key();

        let result = self.db.transaction(|tables| {
            if let Some(existing) = tables.event_keys.get(&key) {
                return Err(EngineError::DuplicateEvent {
                    existing_id: *existing,
                });
            }
            tables.event_keys.insert(key.clone(), event_id);
            tables.events.insert(event_id, record.clone());
            Ok(event_id)
        });

        match &result {
            Ok(id) => {
                self.metrics.increment_events_ingested();
                let id = id.to_string();
                let reasons = record.reasons.len().to_string();
                Logger::info(
                    LogEvent::EventIngested,
                    &[
                        ("event_id", id.as_str()),
                        ("symbol", record.symbol.as_str()),
                        ("market", record.market.as_str()),
                        ("reasons", reasons.as_str()),
                    ],
                );
            }
            Err(EngineError::DuplicateEvent { existing_id }) => {
                self.metrics.increment_events_duplicate();
                let existing = existing_id.to_string();
                Logger::info(
                    LogEvent::EventDuplicateRejected,
                    &[("existing_id", existing.as_str()), ("key", key.as_str())],
                );
            }
            Err(_) => {}
        }
        result
    }

    pub fn get_event(&self, event_id: Uuid) -> EngineResult<Event> {
        self.db.read(|tables| find_event(tables, event_id).cloned())
    }

    pub fn get_reason(&self, event_id: Uuid, reason_id: Uuid) -> EngineResult<Reason> {
        self.db
            .read(|tables| find_reason(find_event(tables, event_id)?, reason_id).cloned())
    }

    /// Newest first; cursor is opaque to callers
    pub fn list_events(&self, cursor: Option<&str>, limit: Option<usize>) -> EngineResult<EventPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let after = cursor.map(decode_cursor).transpose()?;

        self.db.read(|tables| {
            let mut ordered: Vec<&Event> = tables.events.values().collect();
            ordered.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));

            let mut page: Vec<Event> = ordered
                .into_iter()
                .filter(|e| match &after {
                    Some(position) => sort_key(e) < *position,
                    None => true,
                })
                .take(limit + 1)
                .cloned()
                .collect();

            let next_cursor = if page.len() > limit {
                page.truncate(limit);
                page.last().map(encode_cursor)
            } else {
                None
            };

            Ok(EventPage {
                events: page,
                next_cursor,
            })
        })
    }

    /// Replace one reason's confidence if it still equals `expected_confidence`
    pub fn apply_revision(
        &self,
        event_id: Uuid,
        reason_id: Uuid,
        expected_confidence: f64,
        new_confidence: f64,
        new_breakdown: ScoreBreakdown,
    ) -> EngineResult<()> {
        self.db.transaction(|tables| {
            apply_revision_in(
                tables,
                event_id,
                reason_id,
                expected_confidence,
                new_confidence,
                new_breakdown.clone(),
            )
            .map(|_| ())
        })
    }

    fn build_reason(&self, event_id: Uuid, reason: NewReason) -> EngineResult<Reason> {
        if reason.source_url.trim().is_empty() {
            return Err(EngineError::invalid_input(format!(
                "reason rank {} has no source url",
                reason.rank
            )));
        }

        let (confidence, breakdown) = match reason.scoring {
            ReasonScoring::Scored {
                confidence,
                breakdown,
            } => {
                validate_scored(confidence, &breakdown)?;
                (confidence, breakdown)
            }
            ReasonScoring::Signals { signals } => {
                let score = self.model.score(&reason.reason_type, &signals)?;
                (score.confidence, score.breakdown)
            }
        };

        Ok(Reason {
            id: Uuid::new_v4(),
            event_id,
            rank: reason.rank,
            reason_type: reason.reason_type,
            summary: reason.summary,
            confidence_score: confidence,
            score_breakdown: breakdown,
            source_url: reason.source_url,
            published_at: reason.published_at,
            status: ReasonStatus::Unreported,
        })
    }
}

pub(crate) fn find_event(tables: &Tables, event_id: Uuid) -> EngineResult<&Event> {
    tables
        .events
        .get(&event_id)
        .ok_or_else(|| EngineError::not_found("event", event_id))
}

pub(crate) fn find_reason(event: &Event, reason_id: Uuid) -> EngineResult<&Reason> {
    event
        .reason(reason_id)
        .ok_or_else(|| EngineError::not_found("reason", reason_id))
}

/// Mark a reason's review status and refresh the event summary
pub(crate) fn set_reason_status(
    tables: &mut Tables,
    event_id: Uuid,
    reason_id: Uuid,
    status: ReasonStatus,
) -> EngineResult<()> {
    let event = tables
        .events
        .get_mut(&event_id)
        .ok_or_else(|| EngineError::not_found("event", event_id))?;
    let reason = event
        .reason_mut(reason_id)
        .ok_or_else(|| EngineError::not_found("reason", reason_id))?;
    reason.status = status;
    event.refresh_summary();
    Ok(())
}

/// Revision step usable inside a wider transaction; returns the prior confidence
pub(crate) fn apply_revision_in(
    tables: &mut Tables,
    event_id: Uuid,
    reason_id: Uuid,
    expected_confidence: f64,
    new_confidence: f64,
    new_breakdown: ScoreBreakdown,
) -> EngineResult<f64> {
    validate_scored(new_confidence, &new_breakdown)?;

    let event = tables
        .events
        .get_mut(&event_id)
        .ok_or_else(|| EngineError::not_found("event", event_id))?;
    let reason = event
        .reason_mut(reason_id)
        .ok_or_else(|| EngineError::not_found("reason", reason_id))?;

    let current = reason.confidence_score;
    if (current - expected_confidence).abs() > CONFIDENCE_EPSILON {
        return Err(EngineError::StaleRevision {
            expected: expected_confidence,
            actual: current,
        });
    }

    reason.confidence_score = new_confidence;
    reason.score_breakdown = new_breakdown;
    reason.status = ReasonStatus::Revised;
    event.refresh_summary();
    Ok(current)
}

fn validate_header(event: &NewEvent) -> EngineResult<()> {
    let symbol = event.symbol.trim();
    if symbol.is_empty() || symbol.contains('|') {
        return Err(EngineError::invalid_input("symbol must be a non-empty ticker"));
    }
    if !event.percent_change.is_finite() {
        return Err(EngineError::invalid_input("percent_change must be finite"));
    }
    if event.window_minutes == 0 {
        return Err(EngineError::invalid_input("window_minutes must be positive"));
    }
    if event.exchange_timezone.trim().is_empty() {
        return Err(EngineError::invalid_input("exchange_timezone is required"));
    }
    Ok(())
}

/// Ranks must form exactly 1..=N
fn validate_ranks(reasons: &[NewReason]) -> EngineResult<()> {
    let mut ranks: Vec<u32> = reasons.iter().map(|r| r.rank).collect();
    ranks.sort_unstable();
    for (expected, rank) in (1u32..).zip(&ranks) {
        if *rank != expected {
            return Err(EngineError::invalid_input(format!(
                "reason ranks must be a dense 1..{} sequence, got {:?}",
                reasons.len(),
                ranks
            )));
        }
    }
    Ok(())
}

fn sort_key(event: &Event) -> (DateTime<Utc>, Uuid) {
    (event.detected_at, event.id)
}

fn encode_cursor(event: &Event) -> String {
    format!("{}|{}", event.detected_at.to_rfc3339(), event.id)
}

fn decode_cursor(cursor: &str) -> EngineResult<(DateTime<Utc>, Uuid)> {
    let invalid = || EngineError::invalid_input(format!("invalid cursor '{}'", cursor));
    let (at, id) = cursor.split_once('|').ok_or_else(invalid)?;
    let at = DateTime::parse_from_rfc3339(at)
        .map_err(|_| invalid())?
        .with_timezone(&Utc);
    let id = Uuid::parse_str(id).map_err(|_| invalid())?;
    Ok((at, id))
}
