//! # Engine
//!
//! Wires the event store, report ledger and notification dispatcher over
//! one shared database. Request handlers and the revision worker talk to
//! this type only.
//!
//! Notifications are emitted after the state change has committed. A
//! suppressed or undeliverable alert never rolls anything back.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AccessPolicy, AllowAll};
use crate::confidence::{validate_scored, ConfidenceModel};
use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::events::{EventPage, EventStore};
use crate::ledger::{
    AdvanceOutcome, ReasonReport, ReportLedger, ReportStatus, RevisionHistory, RevisionRequest,
};
use crate::model::{Event, NewEvent, NewReason, Reason, ReasonScoring};
use crate::notify::{
    CooldownGate, CooldownStore, MemoryCooldownStore, NotificationDispatcher, NotificationKind,
    Notifier, NotifyOutcome, OutboxNotifier,
};
use crate::observability::{EngineMetrics, LogEvent, Logger};
use crate::store::{Database, FileBackend, StoreBackend};

/// Collaborators the engine does not own
#[derive(Debug, Clone)]
pub struct EngineDeps {
    pub db: Arc<Database>,
    pub policy: Arc<dyn AccessPolicy>,
    pub cooldown: Arc<dyn CooldownStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl EngineDeps {
    /// Everything in memory, every user allowed, alerts kept in an outbox
    pub fn in_memory() -> Self {
        Self {
            db: Arc::new(Database::in_memory()),
            policy: Arc::new(AllowAll),
            cooldown: Arc::new(MemoryCooldownStore::new()),
            notifier: Arc::new(OutboxNotifier::new()),
        }
    }

    /// Store from `config.data_path`, or in memory when unset
    pub fn open(
        config: &EngineConfig,
        policy: Arc<dyn AccessPolicy>,
        notifier: Arc<dyn Notifier>,
    ) -> EngineResult<Self> {
        let db = match &config.data_path {
            Some(path) => {
                let backend: Arc<dyn StoreBackend> = Arc::new(FileBackend::new(path));
                Database::open(backend)?
            }
            None => Database::in_memory(),
        };
        Ok(Self {
            db: Arc::new(db),
            policy,
            cooldown: Arc::new(MemoryCooldownStore::with_retention(config.cooldown_window())),
            notifier,
        })
    }
}

/// Revision as supplied by a reviewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionInput {
    /// Confidence the reviewer saw when computing the revision
    pub expected_confidence: f64,
    pub revision_reason: String,
    pub scoring: ReasonScoring,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub report: ReasonReport,
    pub notification: NotifyOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Advanced {
    #[serde(flatten)]
    pub outcome: AdvanceOutcome,
    pub notification: NotifyOutcome,
}

#[derive(Debug)]
pub struct Engine {
    events: EventStore,
    ledger: ReportLedger,
    dispatcher: NotificationDispatcher,
    model: Arc<ConfidenceModel>,
    policy: Arc<dyn AccessPolicy>,
    metrics: Arc<EngineMetrics>,
}

impl Engine {
    pub fn new(config: &EngineConfig, deps: EngineDeps) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let model = Arc::new(ConfidenceModel::new(config.weights.clone()));
        let gate = CooldownGate::new(deps.cooldown, config.cooldown_window());

        Self {
            events: EventStore::new(Arc::clone(&deps.db), Arc::clone(&model), Arc::clone(&metrics)),
            ledger: ReportLedger::new(
                Arc::clone(&deps.db),
                Arc::clone(&deps.policy),
                Arc::clone(&metrics),
            ),
            dispatcher: NotificationDispatcher::new(gate, deps.notifier, Arc::clone(&metrics)),
            model,
            policy: deps.policy,
            metrics,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(&EngineConfig::default(), EngineDeps::in_memory())
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    pub fn ledger(&self) -> &ReportLedger {
        &self.ledger
    }

    pub fn model(&self) -> &ConfidenceModel {
        &self.model
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Ingest a detector event and alert the users watching its symbol
    pub fn ingest_event(&self, event: NewEvent, reasons: Vec<NewReason>) -> EngineResult<Uuid> {
        let event_id = self.events.create_event(event, reasons)?;

        // The event is committed; a failed alert read must not fail ingestion.
        match self.events.get_event(event_id) {
            Ok(event) => self.alert_watchers(&event),
            Err(e) => {
                let id = event_id.to_string();
                let message = e.to_string();
                Logger::warn(
                    LogEvent::AlertSkipped,
                    &[
                        ("code", e.code()),
                        ("error", message.as_str()),
                        ("event_id", id.as_str()),
                    ],
                );
            }
        }
        Ok(event_id)
    }

    fn alert_watchers(&self, event: &Event) {
        let message = format!(
            "{} {:+.2}% in {}m",
            event.symbol, event.percent_change, event.window_minutes
        );
        let now = Utc::now();
        for user_id in self.policy.watchers(event) {
            self.dispatcher.notify(
                user_id,
                event.id,
                NotificationKind::NewEvent,
                message.clone(),
                now,
            );
        }
    }

    pub fn get_event(&self, event_id: Uuid) -> EngineResult<Event> {
        self.events.get_event(event_id)
    }

    pub fn get_reason(&self, event_id: Uuid, reason_id: Uuid) -> EngineResult<Reason> {
        self.events.get_reason(event_id, reason_id)
    }

    pub fn list_events(&self, cursor: Option<&str>, limit: Option<usize>) -> EngineResult<EventPage> {
        self.events.list_events(cursor, limit)
    }

    pub fn submit_report(
        &self,
        event_id: Uuid,
        reason_id: Uuid,
        user_id: Uuid,
    ) -> EngineResult<Submission> {
        let report_id = self.ledger.submit_report(event_id, reason_id, user_id)?;
        let report = self.ledger.get_report(report_id)?;
        let message = format!(
            "Your report on {} was received and is queued for review",
            self.symbol_of(event_id)
        );
        let notification = self.dispatcher.notify(
            user_id,
            event_id,
            NotificationKind::StatusChanged,
            message,
            Utc::now(),
        );
        Ok(Submission {
            report,
            notification,
        })
    }

    /// Advance a report, scoring signal-based revisions with the reason's type
    pub fn advance(
        &self,
        report_id: Uuid,
        to: ReportStatus,
        note: Option<String>,
        revision: Option<RevisionInput>,
    ) -> EngineResult<Advanced> {
        let request = match revision {
            Some(input) => Some(self.revision_request(report_id, input)?),
            None => None,
        };
        let outcome = self.ledger.advance(report_id, to, note, request)?;

        let report = &outcome.report;
        let symbol = self.symbol_of(report.event_id);
        let (kind, message) = match (report.status, &outcome.revision) {
            (ReportStatus::Resolved, Some(record)) => (
                NotificationKind::Resolved,
                format!(
                    "Your report on {} was resolved: confidence revised from {:.0}% to {:.0}%",
                    symbol,
                    record.confidence_before * 100.0,
                    record.confidence_after * 100.0
                ),
            ),
            (ReportStatus::Resolved, None) => (
                NotificationKind::Resolved,
                format!(
                    "Your report on {} was resolved: the attribution stands",
                    symbol
                ),
            ),
            (status, _) => (
                NotificationKind::StatusChanged,
                format!("Your report on {} is now {}", symbol, status),
            ),
        };
        let notification =
            self.dispatcher
                .notify(report.user_id, report.event_id, kind, message, Utc::now());

        Ok(Advanced {
            outcome,
            notification,
        })
    }

    pub fn get_report(&self, report_id: Uuid) -> EngineResult<ReasonReport> {
        self.ledger.get_report(report_id)
    }

    pub fn list_reports_for_user(&self, user_id: Uuid) -> EngineResult<Vec<ReasonReport>> {
        self.ledger.list_reports_for_user(user_id)
    }

    pub fn list_reports_by_status(
        &self,
        status: ReportStatus,
        limit: usize,
    ) -> EngineResult<Vec<ReasonReport>> {
        self.ledger.list_reports_by_status(status, limit)
    }

    pub fn get_revision_history(&self, event_id: Uuid) -> EngineResult<RevisionHistory> {
        self.ledger.get_revision_history(event_id)
    }

    fn revision_request(
        &self,
        report_id: Uuid,
        input: RevisionInput,
    ) -> EngineResult<RevisionRequest> {
        let (new_confidence, breakdown) = match input.scoring {
            ReasonScoring::Scored {
                confidence,
                breakdown,
            } => {
                validate_scored(confidence, &breakdown)?;
                (confidence, breakdown)
            }
            ReasonScoring::Signals { signals } => {
                let report = self.ledger.get_report(report_id)?;
                let reason = self.events.get_reason(report.event_id, report.reason_id)?;
                let score = self.model.score(&reason.reason_type, &signals)?;
                (score.confidence, score.breakdown)
            }
        };

        Ok(RevisionRequest {
            expected_confidence: input.expected_confidence,
            new_confidence,
            breakdown,
            revision_reason: input.revision_reason,
        })
    }

    fn symbol_of(&self, event_id: Uuid) -> String {
        self.events
            .get_event(event_id)
            .map(|e| e.symbol)
            .unwrap_or_else(|_| event_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Duration;

    use super::*;
    use crate::auth::WatchlistPolicy;
    use crate::model::{Market, ReasonType, SessionLabel};
    use crate::store::{MemoryBackend, Snapshot, StoreError, StoreResult, WriterLock};

    fn new_event(symbol: &str) -> NewEvent {
        NewEvent {
            symbol: symbol.into(),
            market: Market::Us,
            percent_change: 5.1,
            window_minutes: 5,
            detected_at: Utc::now() - Duration::minutes(1),
            exchange_timezone: "America/New_York".into(),
            session: SessionLabel::Regular,
            portfolio_impact: None,
        }
    }

    fn news_reason(signals: &[(&str, f64)]) -> NewReason {
        NewReason {
            rank: 1,
            reason_type: ReasonType::News,
            summary: "Guidance raised".into(),
            source_url: "https://news.example.com/a".into(),
            published_at: Utc::now(),
            scoring: ReasonScoring::Signals {
                signals: signals.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            },
        }
    }

    #[test]
    fn test_watchers_alerted_once_per_event() {
        let policy = Arc::new(WatchlistPolicy::new());
        let outbox = Arc::new(OutboxNotifier::new());
        let watcher = Uuid::new_v4();
        policy.watch(watcher, Market::Us, "MSFT");

        let deps = EngineDeps {
            policy: policy.clone(),
            notifier: outbox.clone(),
            ..EngineDeps::in_memory()
        };
        let engine = Engine::new(&EngineConfig::default(), deps);

        let event_id = engine
            .ingest_event(new_event("msft"), vec![news_reason(&[("relevance", 1.0)])])
            .unwrap();

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, watcher);
        assert_eq!(sent[0].event_id, event_id);
        assert_eq!(sent[0].kind, NotificationKind::NewEvent);
    }

    /// Commits fine, but every read after the first commit fails
    #[derive(Debug, Default)]
    struct UnreadableAfterCommit {
        inner: MemoryBackend,
    }

    impl StoreBackend for UnreadableAfterCommit {
        fn load(&self) -> StoreResult<Snapshot> {
            self.inner.load()
        }

        fn load_if_changed(&self, generation: u64) -> StoreResult<Option<Snapshot>> {
            if self.inner.load()?.generation > 0 {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "read timed out",
                )));
            }
            self.inner.load_if_changed(generation)
        }

        fn persist(&self, snapshot: &Snapshot) -> StoreResult<()> {
            self.inner.persist(snapshot)
        }

        fn lock(&self) -> StoreResult<WriterLock<'_>> {
            self.inner.lock()
        }
    }

    #[test]
    fn test_ingestion_commits_when_alert_read_fails() {
        let policy = Arc::new(WatchlistPolicy::new());
        let outbox = Arc::new(OutboxNotifier::new());
        policy.watch(Uuid::new_v4(), Market::Us, "NFLX");

        let db = Database::open(Arc::new(UnreadableAfterCommit::default())).unwrap();
        let deps = EngineDeps {
            db: Arc::new(db),
            policy: policy.clone(),
            notifier: outbox.clone(),
            ..EngineDeps::in_memory()
        };
        let engine = Engine::new(&EngineConfig::default(), deps);

        let result = engine.ingest_event(new_event("NFLX"), vec![news_reason(&[("relevance", 1.0)])]);
        assert!(result.is_ok());
        assert!(outbox.is_empty());
        assert_eq!(engine.metrics().snapshot().events_ingested, 1);
    }

    #[test]
    fn test_signal_revision_uses_reason_type_weights() {
        let engine = Engine::in_memory();
        let event_id = engine
            .ingest_event(
                new_event("AMD"),
                vec![news_reason(&[("relevance", 1.0), ("source_reliability", 1.0)])],
            )
            .unwrap();
        let reason = engine.get_event(event_id).unwrap().reasons[0].clone();
        assert!((reason.confidence_score - 0.70).abs() < 1e-9);

        let user = Uuid::new_v4();
        let submission = engine.submit_report(event_id, reason.id, user).unwrap();
        assert!(submission.notification.is_sent());
        let report_id = submission.report.id;

        let reviewed = engine
            .advance(report_id, ReportStatus::Reviewed, None, None)
            .unwrap();
        // Same user, same event, inside the window
        assert!(!reviewed.notification.is_sent());

        let mut signals = BTreeMap::new();
        signals.insert("relevance".to_string(), 1.0);
        let resolved = engine
            .advance(
                report_id,
                ReportStatus::Resolved,
                None,
                Some(RevisionInput {
                    expected_confidence: reason.confidence_score,
                    revision_reason: "source unverified".into(),
                    scoring: ReasonScoring::Signals { signals },
                }),
            )
            .unwrap();

        let record = resolved.outcome.revision.unwrap();
        assert!((record.confidence_after - 0.35).abs() < 1e-9);
        assert!((record.delta() + 0.35).abs() < 1e-9);
        let after = engine.get_reason(event_id, reason.id).unwrap();
        assert_eq!(after.score_breakdown, record.breakdown_after);
    }
}
