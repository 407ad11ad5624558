//! # Confidence Model
//!
//! Combines weighted signals into a reason's confidence score and a
//! human-readable breakdown.

mod model;
mod weights;

pub use model::{validate_scored, ConfidenceModel, ConfidenceScore};
pub use weights::{SignalWeights, WeightTable};
