//! # Confidence Model
//!
//! `contribution = weight * value`, `total = sum(contributions)` clamped to
//! [0, 1]. Pure: callers always receive a fresh breakdown.

use std::collections::BTreeMap;

use crate::errors::{EngineError, EngineResult};
use crate::model::{ReasonType, ScoreBreakdown, SCORE_TOLERANCE};
use crate::observability::{LogEvent, Logger};

use super::weights::WeightTable;

/// Result of scoring one reason
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceScore {
    pub confidence: f64,
    pub breakdown: ScoreBreakdown,
    /// Signals with no configured weight for the reason type
    pub ignored: Vec<String>,
}

impl ConfidenceScore {
    pub fn explain(&self) -> String {
        self.breakdown.explain()
    }
}

/// Weighted-signal scorer
#[derive(Debug, Clone, Default)]
pub struct ConfidenceModel {
    weights: WeightTable,
}

impl ConfidenceModel {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Score observed signal values (each in [0, 1]) for a reason type
    pub fn score(
        &self,
        reason_type: &ReasonType,
        signals: &BTreeMap<String, f64>,
    ) -> EngineResult<ConfidenceScore> {
        let weights = self.weights.for_type(reason_type);
        let mut contributions = BTreeMap::new();
        let mut ignored = Vec::new();

        for (name, value) in signals {
            if !value.is_finite() || !(0.0..=1.0).contains(value) {
                return Err(EngineError::invalid_input(format!(
                    "signal '{}' must be within [0, 1], got {}",
                    name, value
                )));
            }
            match weights.get(name) {
                Some(weight) => {
                    contributions.insert(name.clone(), weight * value);
                }
                None => {
                    Logger::warn(
                        LogEvent::SignalIgnored,
                        &[("reason_type", reason_type.as_str()), ("signal", name.as_str())],
                    );
                    ignored.push(name.clone());
                }
            }
        }

        let total: f64 = contributions.values().sum();
        if total > 1.0 {
            // Rescale so the breakdown still sums to the clamped total.
            let total_str = format!("{:.6}", total);
            Logger::warn(
                LogEvent::ConfidenceClamped,
                &[("reason_type", reason_type.as_str()), ("total", total_str.as_str())],
            );
            for value in contributions.values_mut() {
                *value /= total;
            }
        }

        let breakdown = ScoreBreakdown::new(contributions);
        let confidence = breakdown.total().clamp(0.0, 1.0);

        Ok(ConfidenceScore {
            confidence,
            breakdown,
            ignored,
        })
    }
}

/// Check a detector- or reviewer-supplied score against the breakdown rules
pub fn validate_scored(confidence: f64, breakdown: &ScoreBreakdown) -> EngineResult<()> {
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(EngineError::invalid_input(format!(
            "confidence must be within [0, 1], got {}",
            confidence
        )));
    }
    if let Some((name, value)) = breakdown
        .iter()
        .find(|(_, v)| !v.is_finite() || *v < 0.0)
    {
        return Err(EngineError::invalid_input(format!(
            "contribution '{}' must be a non-negative number, got {}",
            name, value
        )));
    }
    if !breakdown.matches(confidence) {
        return Err(EngineError::invalid_input(format!(
            "breakdown sums to {:.6} but confidence is {:.6} (tolerance {})",
            breakdown.total(),
            confidence,
            SCORE_TOLERANCE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::SignalWeights;

    fn signals(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_weighted_sum() {
        let model = ConfidenceModel::default();
        let score = model
            .score(
                &ReasonType::Earnings,
                &signals(&[
                    ("surprise_magnitude", 0.8),
                    ("relevance", 1.0),
                    ("recency", 0.5),
                ]),
            )
            .unwrap();

        // 0.5*0.8 + 0.3*1.0 + 0.2*0.5
        assert!((score.confidence - 0.8).abs() < 1e-9);
        assert!(score.breakdown.matches(score.confidence));
        assert!((score.breakdown.get("surprise_magnitude").unwrap() - 0.4).abs() < 1e-9);
        assert!(score.ignored.is_empty());
    }

    #[test]
    fn test_unconfigured_signal_is_ignored_not_fatal() {
        let model = ConfidenceModel::default();
        let score = model
            .score(
                &ReasonType::Filing,
                &signals(&[("relevance", 1.0), ("social_buzz", 1.0)]),
            )
            .unwrap();

        assert_eq!(score.ignored, vec!["social_buzz".to_string()]);
        assert!(score.breakdown.get("social_buzz").is_none());
        assert!((score.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_signal_rejected() {
        let model = ConfidenceModel::default();
        let err = model
            .score(&ReasonType::News, &signals(&[("relevance", 1.5)]))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn test_clamp_keeps_breakdown_consistent() {
        let mut weights = WeightTable::default();
        let heavy: SignalWeights = [("a".to_string(), 0.9), ("b".to_string(), 0.9)]
            .into_iter()
            .collect();
        weights.by_type.insert("macro".into(), heavy);
        let model = ConfidenceModel::new(weights);

        let score = model
            .score(&ReasonType::Macro, &signals(&[("a", 1.0), ("b", 1.0)]))
            .unwrap();
        assert!((score.confidence - 1.0).abs() < 1e-9);
        assert!(score.breakdown.matches(score.confidence));
    }

    #[test]
    fn test_validate_scored() {
        let good: ScoreBreakdown = [("relevance".to_string(), 0.5), ("recency".to_string(), 0.32)]
            .into_iter()
            .collect();
        assert!(validate_scored(0.82, &good).is_ok());
        assert!(validate_scored(0.9, &good).is_err());
        assert!(validate_scored(1.2, &good).is_err());
        assert!(validate_scored(f64::NAN, &good).is_err());
    }
}
