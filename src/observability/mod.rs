//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Monotonic counters
//!
//! Observability is read-only: a failing log sink never changes the
//! outcome of an engine operation.

mod events;
mod logger;
mod metrics;

pub use events::LogEvent;
pub use logger::{Logger, Severity};
pub use metrics::{EngineMetrics, MetricsSnapshot};
