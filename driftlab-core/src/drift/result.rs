//! Output of a single drift detection call.

use serde::{Deserialize, Serialize};

use super::config::DriftMethod;
use crate::domain::TrackedFeature;

/// Drift character, classified from the wall-clock time since the previous
/// detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    /// Previous drift less than a minute ago.
    Sudden,
    /// Previous drift less than an hour ago.
    Gradual,
    /// Previous drift an hour or more ago, or none before.
    Incremental,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Retrain,
    Adapt,
    Reset,
    Monitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendedAction,
    pub urgency: Urgency,
    pub reason: String,
}

/// Result of one `detect_drift` call.
///
/// `drift_score` is on a method-specific scale and must not be compared
/// across methods:
/// - adwin: `1 - mean(window)`, i.e. the error rate inside the adaptive window
/// - page_hinkley: `|cumulative sum| / 100`
/// - ddm: the error rate over the rolling history
/// - fallback: absolute accuracy difference between history halves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftDetectionResult {
    pub method: DriftMethod,
    pub is_drift: bool,
    pub is_warning: bool,
    pub drift_score: f64,
    pub drift_type: DriftType,
    /// Only populated when `is_drift` is true.
    pub affected_features: Vec<TrackedFeature>,
    pub confidence: f64,
    pub recommendation: Recommendation,
}
