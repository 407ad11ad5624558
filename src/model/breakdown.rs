//! # Score Breakdown
//!
//! Named signal contributions whose sum is a reason's confidence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tolerance between a breakdown's sum and its confidence score
pub const SCORE_TOLERANCE: f64 = 1e-6;

/// Signal name -> contribution
///
/// Immutable once built; re-scoring produces a new breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreBreakdown(BTreeMap<String, f64>);

impl ScoreBreakdown {
    pub fn new(contributions: BTreeMap<String, f64>) -> Self {
        Self(contributions)
    }

    /// Sum of all contributions
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn get(&self, signal: &str) -> Option<f64> {
        self.0.get(signal).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the contributions add up to `confidence`
    pub fn matches(&self, confidence: f64) -> bool {
        (self.total() - confidence).abs() <= SCORE_TOLERANCE
    }

    /// Human-readable explanation, largest contribution first
    ///
    /// e.g. `source_reliability 0.300 (60%), recency 0.200 (40%)`
    pub fn explain(&self) -> String {
        let total = self.total();
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        entries
            .into_iter()
            .map(|(name, value)| {
                let share = if total > 0.0 { value / total * 100.0 } else { 0.0 };
                format!("{} {:.3} ({:.0}%)", name, value, share)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<(String, f64)> for ScoreBreakdown {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(pairs: &[(&str, f64)]) -> ScoreBreakdown {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_total_and_match() {
        let b = breakdown(&[("recency", 0.2), ("source_reliability", 0.3)]);
        assert!((b.total() - 0.5).abs() < 1e-12);
        assert!(b.matches(0.5));
        assert!(!b.matches(0.51));
    }

    #[test]
    fn test_explain_orders_by_contribution() {
        let b = breakdown(&[("recency", 0.2), ("source_reliability", 0.3)]);
        assert_eq!(
            b.explain(),
            "source_reliability 0.300 (60%), recency 0.200 (40%)"
        );
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let b = breakdown(&[("recency", 0.25)]);
        assert_eq!(serde_json::to_string(&b).unwrap(), r#"{"recency":0.25}"#);
    }
}
