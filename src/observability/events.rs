//! Observable lifecycle events
//!
//! Every log line names one of these. Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    // Boot & Lifecycle
    /// Configuration loaded
    ConfigLoaded,
    /// HTTP server bound and serving
    ServerStart,
    /// Shutdown requested
    ShutdownStart,

    // Event store
    /// Detector event persisted
    EventIngested,
    /// Duplicate detector event rejected
    EventDuplicateRejected,
    /// Signal with no configured weight was dropped
    SignalIgnored,
    /// Confidence clamped to 1.0
    ConfidenceClamped,

    // Report ledger
    /// Reason report created
    ReportSubmitted,
    /// Second report for an open reason rejected
    ReportDuplicateRejected,
    /// Report moved to its next status
    ReportAdvanced,
    /// Reason confidence revised
    RevisionApplied,
    /// Optimistic concurrency conflict on a revision
    RevisionStale,

    // Notifications
    /// Notification handed to delivery
    NotificationSent,
    /// Notification held back by the cooldown gate
    NotificationSuppressed,
    /// Notification picked up by the delivery consumer
    NotificationDelivered,

    // Workflow
    /// Worker sweep finished
    WorkerTick,
    /// Worker failed to process a report
    WorkerError,
    /// Watcher alerts skipped for an ingested event
    AlertSkipped,

    // Storage
    /// Store loaded from its backend
    StoreOpened,
    /// Backend refused to persist a transaction
    StoreCommitFailed,
    /// Another process committed; local copy replaced
    StoreReloaded,
}

impl LogEvent {
    /// Returns the event name string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEvent::ConfigLoaded => "CONFIG_LOADED",
            LogEvent::ServerStart => "SERVER_START",
            LogEvent::ShutdownStart => "SHUTDOWN_START",
            LogEvent::EventIngested => "EVENT_INGESTED",
            LogEvent::EventDuplicateRejected => "EVENT_DUPLICATE_REJECTED",
            LogEvent::SignalIgnored => "SIGNAL_IGNORED",
            LogEvent::ConfidenceClamped => "CONFIDENCE_CLAMPED",
            LogEvent::ReportSubmitted => "REPORT_SUBMITTED",
            LogEvent::ReportDuplicateRejected => "REPORT_DUPLICATE_REJECTED",
            LogEvent::ReportAdvanced => "REPORT_ADVANCED",
            LogEvent::RevisionApplied => "REVISION_APPLIED",
            LogEvent::RevisionStale => "REVISION_STALE",
            LogEvent::NotificationSent => "NOTIFICATION_SENT",
            LogEvent::NotificationSuppressed => "NOTIFICATION_SUPPRESSED",
            LogEvent::NotificationDelivered => "NOTIFICATION_DELIVERED",
            LogEvent::WorkerTick => "WORKER_TICK",
            LogEvent::WorkerError => "WORKER_ERROR",
            LogEvent::AlertSkipped => "ALERT_SKIPPED",
            LogEvent::StoreOpened => "STORE_OPENED",
            LogEvent::StoreCommitFailed => "STORE_COMMIT_FAILED",
            LogEvent::StoreReloaded => "STORE_RELOADED",
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
