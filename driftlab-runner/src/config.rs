//! Serializable incremental learning configuration.
//!
//! Every section derives `Default` and is `#[serde(default)]`, so a TOML
//! file only needs the keys it overrides. [`ConfigUpdate`] carries a partial
//! update applied at runtime through `IncrementalLearningSystem::update_config`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use driftlab_core::buffer::BufferStrategy;
use driftlab_core::drift::{DriftConfigError, DriftDetectionConfig, DriftMethod};

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid drift detection config: {0}")]
    Drift(#[from] DriftConfigError),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ─── Adaptation strategy ─────────────────────────────────────────────

/// Descriptive label for how the deployment intends to adapt. The trigger
/// policy and action selection are the same for every kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationKind {
    #[default]
    Gradual,
    Immediate,
    Scheduled,
    ThresholdBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationParameters {
    /// Step size handed to the model updater during gradual adaptation.
    pub adaptation_rate: f64,
    /// Batch drawn from the buffer for gradual adaptation.
    pub batch_size: usize,
    pub max_iterations: usize,
    /// Gradual adaptation stops once a step improves by less than this.
    pub convergence_threshold: f64,
}

impl Default for AdaptationParameters {
    fn default() -> Self {
        Self {
            adaptation_rate: 0.01,
            batch_size: 32,
            max_iterations: 100,
            convergence_threshold: 0.001,
        }
    }
}

/// Adaptation fires when any enabled trigger fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationTriggers {
    /// Fires when smoothed accuracy falls below `1 - performance_drop`.
    pub performance_drop: f64,
    /// Fires on every detected drift.
    pub drift_detection: bool,
    /// Fires when this long has passed since the last adaptation.
    pub time_interval_ms: u64,
    /// Fires when the buffer holds at least this many samples.
    pub data_volume: usize,
}

impl Default for AdaptationTriggers {
    fn default() -> Self {
        Self {
            performance_drop: 0.1,
            drift_detection: true,
            time_interval_ms: 3_600_000,
            data_volume: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationStrategy {
    pub kind: AdaptationKind,
    pub parameters: AdaptationParameters,
    pub triggers: AdaptationTriggers,
}

// ─── Model selection ─────────────────────────────────────────────────

/// Which smoothed metric is reported as the model-selection score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMetric {
    Accuracy,
    Precision,
    Recall,
    #[default]
    F1,
    Auc,
    Loss,
}

impl SelectionMetric {
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Accuracy => metrics.accuracy,
            Self::Precision => metrics.precision,
            Self::Recall => metrics.recall,
            Self::F1 => metrics.f1_score,
            Self::Auc => metrics.auc,
            Self::Loss => metrics.loss,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSelection {
    pub metric: SelectionMetric,
}

// ─── Top-level config ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalLearningConfig {
    /// Handed to the model updater on full retrains.
    pub learning_rate: f64,
    /// Minimum buffer size for a full retrain.
    pub batch_size: usize,
    pub buffer_size: usize,
    pub buffer_strategy: BufferStrategy,
    /// Master seed for the buffer and model updater RNG streams.
    pub seed: u64,
    pub drift_detection: DriftDetectionConfig,
    pub adaptation: AdaptationStrategy,
    pub model_selection: ModelSelection,
}

impl Default for IncrementalLearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 32,
            buffer_size: 1000,
            buffer_strategy: BufferStrategy::ImportanceWeighted,
            seed: 42,
            drift_detection: DriftDetectionConfig::default(),
            adaptation: AdaptationStrategy::default(),
            model_selection: ModelSelection::default(),
        }
    }
}

impl IncrementalLearningConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", self.learning_rate, "a positive number"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", 0, "at least 1"));
        }
        if self.buffer_size == 0 {
            return Err(invalid("buffer_size", 0, "at least 1"));
        }
        self.drift_detection.validate()?;

        let params = &self.adaptation.parameters;
        if !(params.adaptation_rate.is_finite() && params.adaptation_rate >= 0.0) {
            return Err(invalid(
                "adaptation.parameters.adaptation_rate",
                params.adaptation_rate,
                "a non-negative number",
            ));
        }
        if params.batch_size == 0 {
            return Err(invalid("adaptation.parameters.batch_size", 0, "at least 1"));
        }
        if params.max_iterations == 0 {
            return Err(invalid("adaptation.parameters.max_iterations", 0, "at least 1"));
        }
        if !(params.convergence_threshold.is_finite() && params.convergence_threshold >= 0.0) {
            return Err(invalid(
                "adaptation.parameters.convergence_threshold",
                params.convergence_threshold,
                "a non-negative number",
            ));
        }
        let drop = self.adaptation.triggers.performance_drop;
        if !(0.0..=1.0).contains(&drop) {
            return Err(invalid("adaptation.triggers.performance_drop", drop, "in [0, 1]"));
        }
        Ok(())
    }

    /// Merge a partial update into a copy of this config and validate it.
    pub fn merged(&self, update: &ConfigUpdate) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if let Some(v) = update.learning_rate {
            next.learning_rate = v;
        }
        if let Some(v) = update.batch_size {
            next.batch_size = v;
        }
        if let Some(v) = update.buffer_size {
            next.buffer_size = v;
        }
        if let Some(v) = update.buffer_strategy {
            next.buffer_strategy = v;
        }
        if let Some(drift) = &update.drift_detection {
            drift.apply_to(&mut next.drift_detection);
        }
        if let Some(v) = &update.adaptation {
            next.adaptation = v.clone();
        }
        if let Some(v) = update.model_selection {
            next.model_selection = v;
        }
        next.validate()?;
        Ok(next)
    }
}

fn invalid(field: &'static str, value: impl std::fmt::Display, expected: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: format!("expected {expected}, got {value}"),
    }
}

// ─── Partial updates ─────────────────────────────────────────────────

/// Partial drift detection settings. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftDetectionUpdate {
    pub method: Option<DriftMethod>,
    pub window_size: Option<usize>,
    pub confidence_level: Option<f64>,
    pub warning_threshold: Option<f64>,
    pub drift_threshold: Option<f64>,
    pub min_samples: Option<usize>,
    pub adaptation_rate: Option<f64>,
    pub page_hinkley_threshold: Option<f64>,
    pub page_hinkley_alpha: Option<f64>,
}

impl DriftDetectionUpdate {
    fn apply_to(&self, config: &mut DriftDetectionConfig) {
        if let Some(v) = self.method {
            config.method = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.confidence_level {
            config.confidence_level = v;
        }
        if let Some(v) = self.warning_threshold {
            config.warning_threshold = v;
        }
        if let Some(v) = self.drift_threshold {
            config.drift_threshold = v;
        }
        if let Some(v) = self.min_samples {
            config.min_samples = v;
        }
        if let Some(v) = self.adaptation_rate {
            config.adaptation_rate = v;
        }
        if let Some(v) = self.page_hinkley_threshold {
            config.page_hinkley_threshold = v;
        }
        if let Some(v) = self.page_hinkley_alpha {
            config.page_hinkley_alpha = v;
        }
    }
}

/// Partial configuration update.
///
/// Supplying `drift_detection` (even an empty one) rebuilds the drift
/// detector and discards its history. Changing `buffer_size` or
/// `buffer_strategy` rebuilds the buffer, re-offering the retained samples
/// under the new policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub learning_rate: Option<f64>,
    pub batch_size: Option<usize>,
    pub buffer_size: Option<usize>,
    pub buffer_strategy: Option<BufferStrategy>,
    pub drift_detection: Option<DriftDetectionUpdate>,
    pub adaptation: Option<AdaptationStrategy>,
    pub model_selection: Option<ModelSelection>,
}
