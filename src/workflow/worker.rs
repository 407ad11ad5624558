//! # Revision Worker
//!
//! Drains `received` and `reviewed` reports. Several workers may run
//! against the same store: `advance` re-checks the current status inside
//! its transaction, so a worker that loses a race gets `InvalidTransition`
//! and moves on. `StaleRevision` means the reason changed under the
//! reviewer; the worker re-reads and retries a bounded number of times.
//!
//! Each queue is walked in pages that resume after the last report seen,
//! wrapping to the head once a short page comes back. Reports the reviewer
//! defers therefore never starve the ones behind them.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::engine::{Engine, RevisionInput};
use crate::errors::{EngineError, EngineResult};
use crate::ledger::{QueuePosition, ReasonReport, ReportStatus};
use crate::observability::{LogEvent, Logger};

use super::reviewer::{Resolution, Reviewer};

/// Counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub reviewed: usize,
    pub resolved: usize,
    pub revised: usize,
    /// Another instance got there first
    pub skipped: usize,
    /// Reviewer asked for more time
    pub deferred: usize,
    pub stale_retries: usize,
    pub failed: usize,
}

impl TickStats {
    pub fn is_idle(&self) -> bool {
        *self == TickStats::default()
    }
}

enum Step {
    Applied { revised: bool },
    Skipped,
    Deferred,
}

/// Resume points for the two queues
#[derive(Debug, Default)]
struct Cursors {
    received: Option<QueuePosition>,
    reviewed: Option<QueuePosition>,
}

#[derive(Debug)]
pub struct RevisionWorker {
    engine: Arc<Engine>,
    reviewer: Arc<dyn Reviewer>,
    config: WorkerConfig,
    cursors: Mutex<Cursors>,
}

impl RevisionWorker {
    pub fn new(engine: Arc<Engine>, reviewer: Arc<dyn Reviewer>, config: WorkerConfig) -> Self {
        Self {
            engine,
            reviewer,
            config,
            cursors: Mutex::new(Cursors::default()),
        }
    }

    /// Next page of `status`, advancing that queue's cursor
    fn next_batch(&self, status: ReportStatus) -> EngineResult<Vec<ReasonReport>> {
        // A cursor is only a resume hint; a poisoned one is still usable.
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        let cursor = match status {
            ReportStatus::Reviewed => &mut cursors.reviewed,
            _ => &mut cursors.received,
        };

        let batch = self.engine.ledger().list_reports_by_status_after(
            status,
            *cursor,
            self.config.batch_size,
        )?;
        *cursor = if batch.len() < self.config.batch_size {
            None
        } else {
            batch.last().map(ReasonReport::queue_position)
        };
        Ok(batch)
    }

    /// One pass over both queues, `received` first
    pub fn run_once(&self) -> EngineResult<TickStats> {
        let mut stats = TickStats::default();

        let received = self.next_batch(ReportStatus::Received)?;
        for report in received {
            match self.review_one(&report) {
                Ok(Step::Applied { .. }) => stats.reviewed += 1,
                Ok(Step::Skipped) => stats.skipped += 1,
                Ok(Step::Deferred) => stats.deferred += 1,
                Err(e) => {
                    stats.failed += 1;
                    log_failure(report.id, &e);
                }
            }
        }

        let reviewed = if self.reviewer.resolves() {
            self.next_batch(ReportStatus::Reviewed)?
        } else {
            Vec::new()
        };
        for report in reviewed {
            match self.resolve_one(report.id, &mut stats) {
                Ok(Step::Applied { revised }) => {
                    stats.resolved += 1;
                    if revised {
                        stats.revised += 1;
                    }
                }
                Ok(Step::Skipped) => stats.skipped += 1,
                Ok(Step::Deferred) => stats.deferred += 1,
                Err(e) => {
                    stats.failed += 1;
                    log_failure(report.id, &e);
                }
            }
        }

        if !stats.is_idle() {
            let reviewed = stats.reviewed.to_string();
            let resolved = stats.resolved.to_string();
            let skipped = stats.skipped.to_string();
            let failed = stats.failed.to_string();
            Logger::trace(
                LogEvent::WorkerTick,
                &[
                    ("failed", failed.as_str()),
                    ("resolved", resolved.as_str()),
                    ("reviewed", reviewed.as_str()),
                    ("skipped", skipped.as_str()),
                ],
            );
        }
        Ok(stats)
    }

    fn review_one(&self, report: &ReasonReport) -> EngineResult<Step> {
        let reason = self.engine.get_reason(report.event_id, report.reason_id)?;
        let note = self.reviewer.review(report, &reason)?;
        match self
            .engine
            .advance(report.id, ReportStatus::Reviewed, note, None)
        {
            Ok(_) => Ok(Step::Applied { revised: false }),
            Err(EngineError::InvalidTransition { .. }) => Ok(Step::Skipped),
            Err(e) => Err(e),
        }
    }

    fn resolve_one(&self, report_id: Uuid, stats: &mut TickStats) -> EngineResult<Step> {
        let mut attempt = 0;
        loop {
            // Re-read every attempt: the reviewer must see the current score.
            let report = self.engine.get_report(report_id)?;
            if report.status != ReportStatus::Reviewed {
                return Ok(Step::Skipped);
            }
            let reason = self.engine.get_reason(report.event_id, report.reason_id)?;

            let (note, revision) = match self.reviewer.resolve(&report, &reason)? {
                None => return Ok(Step::Deferred),
                Some(Resolution::Confirm { note }) => (note, None),
                Some(Resolution::Revise {
                    note,
                    revision_reason,
                    scoring,
                }) => (
                    note,
                    Some(RevisionInput {
                        expected_confidence: reason.confidence_score,
                        revision_reason,
                        scoring,
                    }),
                ),
            };

            match self
                .engine
                .advance(report_id, ReportStatus::Resolved, note, revision)
            {
                Ok(advanced) => {
                    return Ok(Step::Applied {
                        revised: advanced.outcome.revision.is_some(),
                    })
                }
                Err(EngineError::StaleRevision { .. }) if attempt < self.config.max_stale_retries => {
                    attempt += 1;
                    stats.stale_retries += 1;
                }
                Err(EngineError::InvalidTransition { .. }) => return Ok(Step::Skipped),
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll interval plus a random share of the configured jitter
    fn next_delay(&self) -> Duration {
        let jitter = if self.config.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        };
        Duration::from_millis(self.config.poll_interval_ms + jitter)
    }

    /// Run until `shutdown` flips to true
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                // Store commits may fsync; keep them off the async threads.
                let worker = Arc::clone(&self);
                let message = match tokio::task::spawn_blocking(move || worker.run_once()).await {
                    Ok(Ok(_)) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(e) => Some(e.to_string()),
                };
                if let Some(message) = message {
                    Logger::error(LogEvent::WorkerError, &[("error", message.as_str())]);
                }

                let delay = self.next_delay();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

fn log_failure(report_id: Uuid, error: &EngineError) {
    let report = report_id.to_string();
    let message = error.to_string();
    Logger::error(
        LogEvent::WorkerError,
        &[
            ("code", error.code()),
            ("error", message.as_str()),
            ("report_id", report.as_str()),
        ],
    );
}
