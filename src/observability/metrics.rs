//! Engine counters
//!
//! - Counters only, monotonic, reset on process start
//! - Relaxed atomics; exactness across threads is not required

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for the engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    events_ingested: AtomicU64,
    events_duplicate: AtomicU64,
    reports_submitted: AtomicU64,
    reports_duplicate: AtomicU64,
    transitions_applied: AtomicU64,
    transitions_rejected: AtomicU64,
    revisions_applied: AtomicU64,
    revisions_stale: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_suppressed: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_events_ingested(&self) {
        self.events_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_events_duplicate(&self) {
        self.events_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reports_submitted(&self) {
        self.reports_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reports_duplicate(&self) {
        self.reports_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transitions_applied(&self) {
        self.transitions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transitions_rejected(&self) {
        self.transitions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_revisions_applied(&self) {
        self.revisions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_revisions_stale(&self) {
        self.revisions_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notifications_suppressed(&self) {
        self.notifications_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            events_duplicate: self.events_duplicate.load(Ordering::Relaxed),
            reports_submitted: self.reports_submitted.load(Ordering::Relaxed),
            reports_duplicate: self.reports_duplicate.load(Ordering::Relaxed),
            transitions_applied: self.transitions_applied.load(Ordering::Relaxed),
            transitions_rejected: self.transitions_rejected.load(Ordering::Relaxed),
            revisions_applied: self.revisions_applied.load(Ordering::Relaxed),
            revisions_stale: self.revisions_stale.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_suppressed: self.notifications_suppressed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`EngineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_ingested: u64,
    pub events_duplicate: u64,
    pub reports_submitted: u64,
    pub reports_duplicate: u64,
    pub transitions_applied: u64,
    pub transitions_rejected: u64,
    pub revisions_applied: u64,
    pub revisions_stale: u64,
    pub notifications_sent: u64,
    pub notifications_suppressed: u64,
}
