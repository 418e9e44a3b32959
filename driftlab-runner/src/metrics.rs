//! Running performance metrics for the incremental learner.
//!
//! Accuracy and loss are exponential moving averages with a fixed
//! `alpha = 0.1`, starting from zero. Precision, recall, F1 and AUC are
//! heuristic placeholders derived as fixed multiples of smoothed accuracy;
//! they are not measured from a confusion matrix and must not be validated
//! against ground-truth classification metrics.

use serde::{Deserialize, Serialize};

/// EMA weight given to the newest observation.
pub const EMA_ALPHA: f64 = 0.1;
/// Probabilities are floored here before taking the log loss.
pub const LOSS_FLOOR: f64 = 0.001;

const PRECISION_FACTOR: f64 = 0.95;
const RECALL_FACTOR: f64 = 0.90;
const AUC_FACTOR: f64 = 0.85;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub auc: f64,
    pub loss: f64,
    pub drift_detections: u64,
    pub adaptations: u64,
    pub retrainings: u64,
    /// Wall time spent in the most recent `process_data_point` call.
    pub processing_time_ms: f64,
    /// Inline size of the buffered samples; heap data owned by their
    /// strings and feature maps is not counted.
    pub memory_usage_bytes: usize,
    /// Fraction of tracked features present on the most recent sample.
    pub data_quality: f64,
    /// Samples folded into the smoothed statistics since the last reset.
    pub samples: u64,
}

impl PerformanceMetrics {
    /// Fold one prediction outcome into the smoothed statistics.
    pub fn observe(&mut self, correct: bool, confidence: f64) {
        let hit = if correct { 1.0 } else { 0.0 };
        self.accuracy = ema(self.accuracy, hit);
        self.loss = ema(self.loss, log_loss(correct, confidence));

        self.precision = self.accuracy * PRECISION_FACTOR;
        self.recall = self.accuracy * RECALL_FACTOR;
        self.f1_score = f1(self.precision, self.recall);
        self.auc = self.accuracy * AUC_FACTOR;
        self.samples += 1;
    }

    /// Zero the smoothed statistics and point-in-time measurements, keeping
    /// the lifetime counters.
    pub fn reset_smoothed(&mut self) {
        *self = Self {
            drift_detections: self.drift_detections,
            adaptations: self.adaptations,
            retrainings: self.retrainings,
            ..Self::default()
        };
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn ema(previous: f64, observation: f64) -> f64 {
    EMA_ALPHA * observation + (1.0 - EMA_ALPHA) * previous
}

/// Cross-entropy style penalty on the probability assigned to the outcome.
pub fn log_loss(correct: bool, confidence: f64) -> f64 {
    let p = if correct { confidence } else { 1.0 - confidence };
    -p.max(LOSS_FLOOR).ln()
}

/// Harmonic mean; 0 when both inputs are 0.
pub fn f1(precision: f64, recall: f64) -> f64 {
    let denom = precision + recall;
    if denom <= 0.0 {
        0.0
    } else {
        2.0 * precision * recall / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_starts_from_zero() {
        let mut m = PerformanceMetrics::default();
        m.observe(true, 0.9);
        assert!((m.accuracy - 0.1).abs() < 1e-12);
        m.observe(true, 0.9);
        assert!((m.accuracy - 0.19).abs() < 1e-12);
        assert_eq!(m.samples, 2);
    }

    #[test]
    fn derived_metrics_are_fixed_multiples() {
        let mut m = PerformanceMetrics::default();
        for _ in 0..20 {
            m.observe(true, 0.8);
        }
        assert!((m.precision - 0.95 * m.accuracy).abs() < 1e-12);
        assert!((m.recall - 0.90 * m.accuracy).abs() < 1e-12);
        assert!((m.auc - 0.85 * m.accuracy).abs() < 1e-12);
        let expected_f1 = 2.0 * m.precision * m.recall / (m.precision + m.recall);
        assert!((m.f1_score - expected_f1).abs() < 1e-12);
    }

    #[test]
    fn log_loss_uses_outcome_probability() {
        assert!((log_loss(true, 0.9) - -(0.9f64).ln()).abs() < 1e-12);
        assert!((log_loss(false, 0.9) - -(0.1f64).ln()).abs() < 1e-9);
        // Fully confident and wrong hits the floor.
        assert!((log_loss(false, 1.0) - -(LOSS_FLOOR).ln()).abs() < 1e-12);
    }

    #[test]
    fn f1_of_zeros_is_zero() {
        assert_eq!(f1(0.0, 0.0), 0.0);
    }

    #[test]
    fn reset_keeps_counters() {
        let mut m = PerformanceMetrics::default();
        m.observe(true, 0.7);
        m.drift_detections = 3;
        m.adaptations = 2;
        m.retrainings = 1;
        m.data_quality = 1.0;
        m.reset_smoothed();
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.samples, 0);
        assert_eq!(m.data_quality, 0.0);
        assert_eq!((m.drift_detections, m.adaptations, m.retrainings), (3, 2, 1));
    }
}
