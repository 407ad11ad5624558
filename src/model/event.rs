//! # Events and Reasons
//!
//! An event is a detected abnormal price move. Its reasons are the
//! attributed causes, rank-ordered and scored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::breakdown::ScoreBreakdown;

/// Market an event's symbol trades on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "KR")]
    Kr,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Kr => "KR",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading session at detection time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionLabel {
    Pre,
    Regular,
    Post,
    Closed,
}

/// Reason taxonomy
///
/// Open set: types the detector introduces later land in `Other` instead
/// of failing ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReasonType {
    News,
    Filing,
    Earnings,
    Analyst,
    Macro,
    Other(String),
}

impl ReasonType {
    pub fn as_str(&self) -> &str {
        match self {
            ReasonType::News => "news",
            ReasonType::Filing => "filing",
            ReasonType::Earnings => "earnings",
            ReasonType::Analyst => "analyst",
            ReasonType::Macro => "macro",
            ReasonType::Other(name) => name,
        }
    }

    /// Whether the type is one the engine knows natively
    pub fn is_known(&self) -> bool {
        !matches!(self, ReasonType::Other(_))
    }
}

impl From<String> for ReasonType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "news" => ReasonType::News,
            "filing" => ReasonType::Filing,
            "earnings" => ReasonType::Earnings,
            "analyst" => ReasonType::Analyst,
            "macro" => ReasonType::Macro,
            _ => ReasonType::Other(value),
        }
    }
}

impl From<&str> for ReasonType {
    fn from(value: &str) -> Self {
        ReasonType::from(value.to_string())
    }
}

impl From<ReasonType> for String {
    fn from(value: ReasonType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ReasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a single reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonStatus {
    /// No report has ever been filed
    #[default]
    Unreported,
    /// A report is open
    UnderReview,
    /// Last resolution changed the confidence
    Revised,
    /// Last resolution kept the confidence
    Confirmed,
}

/// Optional holding-level annotation supplied by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioImpact {
    pub holding_quantity: f64,
    pub estimated_pnl_change: f64,
}

/// An attributed cause for an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub id: Uuid,
    pub event_id: Uuid,
    /// 1-based, unique within the event
    pub rank: u32,
    pub reason_type: ReasonType,
    pub summary: String,
    pub confidence_score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub source_url: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ReasonStatus,
}

/// A detected abnormal price move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub symbol: String,
    pub market: Market,
    pub percent_change: f64,
    pub window_minutes: u32,
    pub detected_at: DateTime<Utc>,
    pub exchange_timezone: String,
    pub session: SessionLabel,
    pub reasons: Vec<Reason>,
    #[serde(default)]
    pub portfolio_impact: Option<PortfolioImpact>,
    #[serde(default)]
    pub reason_status: ReasonStatus,
    #[serde(default)]
    pub revision_hint: Option<String>,
}

impl Event {
    /// Ingestion identity: symbol, market, window and detection instant
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.symbol, self.market, self.window_minutes, self.detected_at)
    }

    pub fn reason(&self, reason_id: Uuid) -> Option<&Reason> {
        self.reasons.iter().find(|r| r.id == reason_id)
    }

    pub fn reason_mut(&mut self, reason_id: Uuid) -> Option<&mut Reason> {
        self.reasons.iter_mut().find(|r| r.id == reason_id)
    }

    /// Recompute `reason_status` and `revision_hint` from the reasons
    pub fn refresh_summary(&mut self) {
        let count = |status: ReasonStatus| {
            self.reasons
                .iter()
                .filter(|r| r.status == status)
                .count()
        };
        let under_review = count(ReasonStatus::UnderReview);
        let revised = count(ReasonStatus::Revised);
        let confirmed = count(ReasonStatus::Confirmed);

        self.reason_status = if under_review > 0 {
            ReasonStatus::UnderReview
        } else if revised > 0 {
            ReasonStatus::Revised
        } else if confirmed > 0 {
            ReasonStatus::Confirmed
        } else {
            ReasonStatus::Unreported
        };

        let mut parts = Vec::new();
        if under_review > 0 {
            parts.push(format!("{} under review", plural(under_review, "reason")));
        }
        if revised > 0 {
            parts.push(format!("{} revised", plural(revised, "reason")));
        }
        if confirmed > 0 {
            parts.push(format!("{} confirmed", plural(confirmed, "reason")));
        }
        self.revision_hint = if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        };
    }
}

fn dedup_key(
    symbol: &str,
    market: Market,
    window_minutes: u32,
    detected_at: DateTime<Utc>,
) -> String {
    format!(
        "{}|{}|{}|{}",
        market,
        symbol.trim().to_ascii_uppercase(),
        window_minutes,
        detected_at.timestamp_millis()
    )
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}
