//! # Ingestion Payloads
//!
//! Shapes the detector hands to the event store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::breakdown::ScoreBreakdown;
use super::event::{Market, PortfolioImpact, ReasonType, SessionLabel};

/// Event header as produced by the detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub symbol: String,
    pub market: Market,
    pub percent_change: f64,
    pub window_minutes: u32,
    pub detected_at: DateTime<Utc>,
    pub exchange_timezone: String,
    pub session: SessionLabel,
    #[serde(default)]
    pub portfolio_impact: Option<PortfolioImpact>,
}

/// How a reason's confidence is supplied
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReasonScoring {
    /// Detector already scored the reason
    Scored {
        confidence: f64,
        breakdown: ScoreBreakdown,
    },
    /// Raw observed signal values in [0, 1]; the engine scores them
    Signals { signals: BTreeMap<String, f64> },
}

/// Reason as produced by the detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReason {
    pub rank: u32,
    pub reason_type: ReasonType,
    #[serde(default)]
    pub summary: String,
    pub source_url: String,
    pub published_at: DateTime<Utc>,
    pub scoring: ReasonScoring,
}
