//! Concept drift orchestrator.
//!
//! Wraps the ADWIN and Page-Hinkley detectors plus the inline DDM and
//! two-halves checks behind the configured method, keeps the rolling
//! correctness and feature histories, and turns each detection into a
//! classified, attributed and actionable [`DriftDetectionResult`].

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::adwin::{Adwin, AdwinStatistics};
use super::config::{DriftDetectionConfig, DriftMethod};
use super::ddm;
use super::history::{mean, std_dev, RollingWindow};
use super::page_hinkley::{PageHinkley, PageHinkleyStatistics};
use super::result::{DriftDetectionResult, DriftType, Recommendation, RecommendedAction, Urgency};
use crate::domain::{FeatureSet, Label, Prediction, TrackedFeature};

/// Page-Hinkley scores are `|sum| / PAGE_HINKLEY_SCORE_SCALE`.
const PAGE_HINKLEY_SCORE_SCALE: f64 = 100.0;
/// Drift scores above this escalate the recommendation to a full retrain.
const CRITICAL_SCORE: f64 = 0.8;
const DRIFT_CONFIDENCE_MIN: f64 = 0.5;
const DRIFT_CONFIDENCE_MAX: f64 = 0.95;
/// Feature attribution: mean shift in units of baseline std.
const MEAN_SHIFT_SIGMAS: f64 = 2.0;
/// Feature attribution: std change relative to baseline std.
const STD_SHIFT_RATIO: f64 = 1.0;
const STD_FLOOR: f64 = 0.001;
const MIN_FEATURE_HISTORY: usize = 4;

/// Snapshot of detector state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftStatistics {
    pub method: DriftMethod,
    pub drift_count: u64,
    pub last_drift_time: Option<DateTime<Utc>>,
    pub samples_seen: u64,
    pub performance_history_len: usize,
    /// Mean correctness over the rolling history.
    pub recent_accuracy: f64,
    pub feature_history_lens: BTreeMap<TrackedFeature, usize>,
    pub adwin: AdwinStatistics,
    pub page_hinkley: PageHinkleyStatistics,
}

/// Raw verdict of the configured method before classification.
#[derive(Debug, Clone, Copy)]
struct MethodVerdict {
    is_drift: bool,
    is_warning: bool,
    score: f64,
}

#[derive(Debug, Clone)]
pub struct ConceptDriftDetector {
    config: DriftDetectionConfig,
    adwin: Adwin,
    page_hinkley: PageHinkley,
    performance_history: RollingWindow,
    feature_history: BTreeMap<TrackedFeature, RollingWindow>,
    drift_count: u64,
    last_drift_time: Option<DateTime<Utc>>,
    samples_seen: u64,
}

impl ConceptDriftDetector {
    pub fn new(config: DriftDetectionConfig) -> Self {
        let adwin = Adwin::new(config.adwin_delta(), config.min_samples);
        let page_hinkley = PageHinkley::new(
            config.page_hinkley_threshold,
            config.page_hinkley_alpha,
            config.min_samples as u64,
        );
        let performance_history = RollingWindow::new(config.window_size);
        Self {
            config,
            adwin,
            page_hinkley,
            performance_history,
            feature_history: BTreeMap::new(),
            drift_count: 0,
            last_drift_time: None,
            samples_seen: 0,
        }
    }

    pub fn config(&self) -> &DriftDetectionConfig {
        &self.config
    }

    pub fn drift_count(&self) -> u64 {
        self.drift_count
    }

    /// Run one detection step stamped with the current wall-clock time.
    pub fn detect_drift(
        &mut self,
        prediction: &Prediction,
        actual: Label,
        features: &FeatureSet,
    ) -> DriftDetectionResult {
        self.detect_drift_at(prediction, actual, features, Utc::now())
    }

    /// Run one detection step at an explicit time. `now` drives drift-type
    /// classification and is recorded as the last drift time on detection.
    pub fn detect_drift_at(
        &mut self,
        prediction: &Prediction,
        actual: Label,
        features: &FeatureSet,
        now: DateTime<Utc>,
    ) -> DriftDetectionResult {
        let correct = if prediction.is_correct(actual) { 1.0 } else { 0.0 };
        self.samples_seen += 1;
        self.performance_history.push(correct);

        let window = self.config.window_size;
        for (feature, value) in features.tracked() {
            self.feature_history
                .entry(feature)
                .or_insert_with(|| RollingWindow::new(window))
                .push(value);
        }

        let verdict = match self.config.method {
            DriftMethod::Adwin => self.adwin_verdict(correct),
            DriftMethod::PageHinkley => self.page_hinkley_verdict(correct),
            DriftMethod::Ddm => self.ddm_verdict(),
            DriftMethod::Eddm | DriftMethod::Kswin => self.two_halves_verdict(),
        };

        let drift_type = if verdict.is_drift {
            classify_drift_type(self.last_drift_time, now)
        } else {
            DriftType::None
        };

        let affected_features = if verdict.is_drift {
            self.affected_features()
        } else {
            Vec::new()
        };

        let confidence = if verdict.is_drift {
            verdict.score.clamp(DRIFT_CONFIDENCE_MIN, DRIFT_CONFIDENCE_MAX)
        } else {
            (1.0 - verdict.score).clamp(0.0, 1.0)
        };

        let recommendation = recommend(
            verdict.is_drift,
            verdict.is_warning,
            verdict.score,
            drift_type,
        );

        if verdict.is_drift {
            self.drift_count += 1;
            self.last_drift_time = Some(now);
        }

        DriftDetectionResult {
            method: self.config.method,
            is_drift: verdict.is_drift,
            is_warning: verdict.is_warning,
            drift_score: verdict.score,
            drift_type,
            affected_features,
            confidence,
            recommendation,
        }
    }

    /// Forget everything: sub-detectors, histories and drift bookkeeping.
    pub fn reset(&mut self) {
        self.adwin.reset();
        self.page_hinkley.reset();
        self.performance_history.clear();
        self.feature_history.clear();
        self.drift_count = 0;
        self.last_drift_time = None;
        self.samples_seen = 0;
    }

    pub fn statistics(&self) -> DriftStatistics {
        DriftStatistics {
            method: self.config.method,
            drift_count: self.drift_count,
            last_drift_time: self.last_drift_time,
            samples_seen: self.samples_seen,
            performance_history_len: self.performance_history.len(),
            recent_accuracy: self.performance_history.mean(),
            feature_history_lens: self
                .feature_history
                .iter()
                .map(|(feature, history)| (*feature, history.len()))
                .collect(),
            adwin: self.adwin.statistics(),
            page_hinkley: self.page_hinkley.statistics(),
        }
    }

    fn adwin_verdict(&mut self, correct: f64) -> MethodVerdict {
        let is_drift = self.adwin.add_element(correct);
        MethodVerdict {
            is_drift,
            is_warning: false,
            score: 1.0 - self.adwin.mean(),
        }
    }

    fn page_hinkley_verdict(&mut self, correct: f64) -> MethodVerdict {
        let is_drift = self.page_hinkley.add_element(correct);
        MethodVerdict {
            is_drift,
            is_warning: false,
            score: self.page_hinkley.last_sum().abs() / PAGE_HINKLEY_SCORE_SCALE,
        }
    }

    fn ddm_verdict(&self) -> MethodVerdict {
        let outcome = ddm::evaluate(&self.performance_history.to_vec(), self.config.min_samples);
        MethodVerdict {
            is_drift: outcome.is_drift,
            is_warning: outcome.is_warning,
            score: outcome.error_rate,
        }
    }

    /// Fallback: compare accuracy between the older and newer halves of the
    /// rolling history.
    fn two_halves_verdict(&self) -> MethodVerdict {
        if self.performance_history.len() < self.config.min_samples.max(2) {
            return MethodVerdict {
                is_drift: false,
                is_warning: false,
                score: 0.0,
            };
        }
        let (older, newer) = self.performance_history.halves();
        let score = (mean(&older) - mean(&newer)).abs();
        let is_drift = score > self.config.drift_threshold;
        MethodVerdict {
            is_drift,
            is_warning: !is_drift && score > self.config.warning_threshold,
            score,
        }
    }

    /// Features whose newer-half mean or std moved away from the older half.
    fn affected_features(&self) -> Vec<TrackedFeature> {
        let required = self
            .config
            .min_samples
            .min(self.config.window_size)
            .max(MIN_FEATURE_HISTORY);

        self.feature_history
            .iter()
            .filter(|(_, history)| history.len() >= required)
            .filter(|(_, history)| {
                let (baseline, recent) = history.halves();
                let base_std = std_dev(&baseline);
                let scale = base_std.max(STD_FLOOR);
                let mean_shift = (mean(&recent) - mean(&baseline)).abs() / scale;
                let std_shift = (std_dev(&recent) - base_std).abs() / scale;
                mean_shift > MEAN_SHIFT_SIGMAS || std_shift > STD_SHIFT_RATIO
            })
            .map(|(feature, _)| *feature)
            .collect()
    }
}

fn classify_drift_type(last_drift: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DriftType {
    let Some(last) = last_drift else {
        return DriftType::Incremental;
    };
    let elapsed = now - last;
    if elapsed < Duration::seconds(60) {
        DriftType::Sudden
    } else if elapsed < Duration::hours(1) {
        DriftType::Gradual
    } else {
        DriftType::Incremental
    }
}

/// Fixed decision table, evaluated top to bottom.
fn recommend(is_drift: bool, is_warning: bool, score: f64, drift_type: DriftType) -> Recommendation {
    if is_drift && score > CRITICAL_SCORE {
        Recommendation {
            action: RecommendedAction::Retrain,
            urgency: Urgency::Critical,
            reason: format!("severe drift (score {score:.3}) requires full retraining"),
        }
    } else if is_drift && drift_type == DriftType::Sudden {
        Recommendation {
            action: RecommendedAction::Reset,
            urgency: Urgency::High,
            reason: "sudden drift shortly after a previous one; reset the model".to_string(),
        }
    } else if is_drift {
        Recommendation {
            action: RecommendedAction::Adapt,
            urgency: Urgency::Medium,
            reason: format!("drift detected (score {score:.3}); adapt gradually"),
        }
    } else if is_warning {
        Recommendation {
            action: RecommendedAction::Monitor,
            urgency: Urgency::Low,
            reason: "warning level reached; monitor closely".to_string(),
        }
    } else {
        Recommendation {
            action: RecommendedAction::Monitor,
            urgency: Urgency::Low,
            reason: "no drift detected".to_string(),
        }
    }
}
