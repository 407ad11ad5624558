//! # Signal Weights
//!
//! Fixed per-reason-type weight configuration. Types without an entry use
//! the fallback table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{ReasonType, SCORE_TOLERANCE};

/// Signal name -> weight
pub type SignalWeights = BTreeMap<String, f64>;

/// Weights for every reason type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    #[serde(default = "default_by_type")]
    pub by_type: BTreeMap<String, SignalWeights>,
    #[serde(default = "default_fallback")]
    pub fallback: SignalWeights,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            by_type: default_by_type(),
            fallback: default_fallback(),
        }
    }
}

impl WeightTable {
    /// Weights for a reason type
    pub fn for_type(&self, reason_type: &ReasonType) -> &SignalWeights {
        self.by_type
            .get(reason_type.as_str())
            .unwrap_or(&self.fallback)
    }

    /// Check every table: finite, non-negative, summing to at most 1.0
    pub fn validate(&self) -> Result<(), String> {
        let tables = self
            .by_type
            .iter()
            .map(|(name, w)| (name.as_str(), w))
            .chain(std::iter::once(("fallback", &self.fallback)));

        for (name, weights) in tables {
            if weights.is_empty() {
                return Err(format!("weights for '{}' are empty", name));
            }
            for (signal, weight) in weights {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(format!(
                        "weight '{}' for '{}' must be a non-negative number, got {}",
                        signal, name, weight
                    ));
                }
            }
            let sum: f64 = weights.values().sum();
            if sum > 1.0 + SCORE_TOLERANCE {
                return Err(format!(
                    "weights for '{}' sum to {:.4}, must not exceed 1.0",
                    name, sum
                ));
            }
        }
        Ok(())
    }
}

fn table(pairs: &[(&str, f64)]) -> SignalWeights {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn default_by_type() -> BTreeMap<String, SignalWeights> {
    let mut by_type = BTreeMap::new();
    by_type.insert(
        "news".to_string(),
        table(&[
            ("relevance", 0.35),
            ("source_reliability", 0.35),
            ("recency", 0.2),
            ("volume_confirmation", 0.1),
        ]),
    );
    by_type.insert(
        "filing".to_string(),
        table(&[
            ("relevance", 0.4),
            ("source_reliability", 0.4),
            ("recency", 0.2),
        ]),
    );
    by_type.insert(
        "earnings".to_string(),
        table(&[
            ("surprise_magnitude", 0.5),
            ("relevance", 0.3),
            ("recency", 0.2),
        ]),
    );
    by_type
}

fn default_fallback() -> SignalWeights {
    table(&[
        ("relevance", 0.5),
        ("recency", 0.3),
        ("source_reliability", 0.2),
    ])
}
