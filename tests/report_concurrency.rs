//! Report Concurrency Tests
//!
//! Races across threads sharing one engine:
//! - concurrent submissions for one reason create exactly one report
//! - concurrent workers resolve each report exactly once
//! - concurrent revisions of one reason: one wins, the rest are stale

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, Utc};
use uuid::Uuid;

use tickerwatch::config::WorkerConfig;
use tickerwatch::engine::Engine;
use tickerwatch::errors::EngineError;
use tickerwatch::ledger::ReportStatus;
use tickerwatch::model::{
    Market, NewEvent, NewReason, ReasonScoring, ReasonStatus, ReasonType, ScoreBreakdown,
    SessionLabel,
};
use tickerwatch::workflow::{ConfirmingReviewer, RevisionWorker};

fn ingest(engine: &Engine, symbol: &str, reason_count: u32) -> Uuid {
    let reasons = (1..=reason_count)
        .map(|rank| NewReason {
            rank,
            reason_type: ReasonType::News,
            summary: format!("headline {}", rank),
            source_url: format!("https://news.example.com/{}", rank),
            published_at: Utc::now(),
            scoring: ReasonScoring::Scored {
                confidence: 0.5,
                breakdown: [("relevance".to_string(), 0.5)].into_iter().collect(),
            },
        })
        .collect();
    engine
        .ingest_event(
            NewEvent {
                symbol: symbol.into(),
                market: Market::Us,
                percent_change: 3.3,
                window_minutes: 5,
                detected_at: Utc::now() - Duration::seconds(10),
                exchange_timezone: "America/New_York".into(),
                session: SessionLabel::Pre,
                portfolio_impact: None,
            },
            reasons,
        )
        .unwrap()
}

// =============================================================================
// Submission Races
// =============================================================================

/// Eight users race to report the same reason; one report exists afterwards.
#[test]
fn test_racing_submissions_create_one_report() {
    let engine = Arc::new(Engine::in_memory());
    let event_id = ingest(&engine, "NFLX", 1);
    let reason_id = engine.get_event(event_id).unwrap().reasons[0].id;

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.submit_report(event_id, reason_id, Uuid::new_v4())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let created: Vec<Uuid> = results
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|s| s.report.id))
        .collect();
    assert_eq!(created.len(), 1);

    for result in &results {
        if let Err(err) = result {
            assert_eq!(
                err,
                &EngineError::DuplicateReasonReport {
                    reason_id,
                    open_report_id: created[0],
                }
            );
        }
    }
    assert_eq!(
        engine
            .list_reports_by_status(ReportStatus::Received, 100)
            .unwrap()
            .len(),
        1
    );
}

// =============================================================================
// Worker Races
// =============================================================================

/// Four workers drain the same queue; every report ends with exactly three transitions.
#[test]
fn test_concurrent_workers_resolve_each_report_once() {
    let engine = Arc::new(Engine::in_memory());
    let event_id = ingest(&engine, "AAPL", 10);
    let event = engine.get_event(event_id).unwrap();
    let report_ids: Vec<Uuid> = event
        .reasons
        .iter()
        .map(|r| {
            engine
                .submit_report(event_id, r.id, Uuid::new_v4())
                .unwrap()
                .report
                .id
        })
        .collect();

    let workers = 4;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let worker = RevisionWorker::new(
                Arc::clone(&engine),
                Arc::new(ConfirmingReviewer),
                WorkerConfig {
                    batch_size: 3,
                    ..WorkerConfig::default()
                },
            );
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut resolved = 0;
                for _ in 0..10 {
                    resolved += worker.run_once().unwrap().resolved;
                }
                resolved
            })
        })
        .collect();

    let resolved: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(resolved, report_ids.len());

    for id in report_ids {
        let report = engine.get_report(id).unwrap();
        assert_eq!(report.status, ReportStatus::Resolved);
        let path: Vec<_> = report.transitions.iter().map(|t| t.to).collect();
        assert_eq!(path, ReportStatus::LIFECYCLE.to_vec());
    }
    let event = engine.get_event(event_id).unwrap();
    assert!(event
        .reasons
        .iter()
        .all(|r| r.status == ReasonStatus::Confirmed));
}

// =============================================================================
// Revision Races
// =============================================================================

/// Two revisions computed from the same read: exactly one applies.
#[test]
fn test_concurrent_revisions_one_wins() {
    let engine = Arc::new(Engine::in_memory());
    let event_id = ingest(&engine, "AMZN", 1);
    let reason = engine.get_event(event_id).unwrap().reasons[0].clone();

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let expected = reason.confidence_score;
            let reason_id = reason.id;
            thread::spawn(move || {
                let target = 0.1 + 0.05 * i as f64;
                let breakdown: ScoreBreakdown =
                    [("relevance".to_string(), target)].into_iter().collect();
                barrier.wait();
                engine
                    .events()
                    .apply_revision(event_id, reason_id, expected, target, breakdown)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let applied = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(applied, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, EngineError::StaleRevision { .. }) && e.is_retryable()));

    let after = engine.get_reason(event_id, reason.id).unwrap();
    assert!((after.score_breakdown.total() - after.confidence_score).abs() < 1e-9);
}
