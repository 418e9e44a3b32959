//! Top-level incremental learning system.
//!
//! One system owns one drift detector, one buffer, one metrics struct and
//! one model updater. Each processed sample runs to completion:
//! validate -> buffer -> detect -> metrics -> triggers -> at most one
//! adaptation.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use driftlab_core::buffer::{BufferStatistics, IncrementalLearningBuffer};
use driftlab_core::domain::{
    FeatureSet, IncrementalDataPoint, InputError, Label, Prediction, SampleMetadata,
};
use driftlab_core::drift::{
    ConceptDriftDetector, DriftDetectionResult, DriftMethod, DriftStatistics,
};
use driftlab_core::rng::RngHierarchy;

use crate::adaptation::{
    fired_triggers, AdaptationAction, AdaptationError, AdaptationGate, AdaptationReport,
    AdaptationStatus, ModelUpdater, SimulatedModel, TriggerInputs, TriggerReason,
};
use crate::config::{
    AdaptationKind, ConfigError, ConfigUpdate, IncrementalLearningConfig, SelectionMetric,
};
use crate::metrics::PerformanceMetrics;

const BUFFER_STREAM: &str = "buffer";
const MODEL_STREAM: &str = "model";

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("rejected sample for {symbol}: {source}")]
    Processing {
        symbol: String,
        #[source]
        source: InputError,
    },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result of processing one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub drift_result: DriftDetectionResult,
    pub adaptation: AdaptationStatus,
    /// Metrics after this sample (and after any adaptation it triggered).
    pub performance: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub is_adapting: bool,
    pub total_samples: u64,
    pub buffer_size: usize,
    pub buffer_capacity: usize,
    pub last_adaptation_time: Option<DateTime<Utc>>,
    pub drift_method: DriftMethod,
    pub drift_count: u64,
    pub adaptation_kind: AdaptationKind,
    pub selection_metric: SelectionMetric,
    pub selection_score: f64,
    pub performance: PerformanceMetrics,
}

pub struct IncrementalLearningSystem {
    config: IncrementalLearningConfig,
    rng: RngHierarchy,
    detector: ConceptDriftDetector,
    buffer: IncrementalLearningBuffer,
    metrics: PerformanceMetrics,
    model: Box<dyn ModelUpdater>,
    gate: AdaptationGate,
    total_samples: u64,
    started_at: Option<DateTime<Utc>>,
    last_adaptation_time: Option<DateTime<Utc>>,
    /// Bumped on every buffer rebuild so each rebuild draws a fresh stream.
    buffer_generation: u64,
}

impl std::fmt::Debug for IncrementalLearningSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalLearningSystem")
            .field("config", &self.config)
            .field("total_samples", &self.total_samples)
            .field("buffer_len", &self.buffer.len())
            .field("is_adapting", &self.gate.is_adapting())
            .finish_non_exhaustive()
    }
}

/// Build a system from an optional config, falling back to defaults.
pub fn create_incremental_learning_system(
    config: Option<IncrementalLearningConfig>,
) -> Result<IncrementalLearningSystem, ConfigError> {
    IncrementalLearningSystem::new(config.unwrap_or_default())
}

impl IncrementalLearningSystem {
    /// Build a system driving a [`SimulatedModel`].
    pub fn new(config: IncrementalLearningConfig) -> Result<Self, ConfigError> {
        let rng = RngHierarchy::new(config.seed);
        let model = SimulatedModel::new(rng.rng_for(MODEL_STREAM, 0));
        Self::with_model(config, Box::new(model))
    }

    pub fn with_model(
        config: IncrementalLearningConfig,
        model: Box<dyn ModelUpdater>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = RngHierarchy::new(config.seed);
        let buffer = IncrementalLearningBuffer::new(
            config.buffer_size,
            config.buffer_strategy,
            rng.rng_for(BUFFER_STREAM, 0),
        );
        Ok(Self {
            detector: ConceptDriftDetector::new(config.drift_detection.clone()),
            buffer,
            metrics: PerformanceMetrics::default(),
            model,
            gate: AdaptationGate::new(),
            total_samples: 0,
            started_at: None,
            last_adaptation_time: None,
            buffer_generation: 0,
            rng,
            config,
        })
    }

    pub fn config(&self) -> &IncrementalLearningConfig {
        &self.config
    }

    /// Handle on the adaptation gate; clones observe the same state.
    pub fn adaptation_gate(&self) -> AdaptationGate {
        self.gate.clone()
    }

    /// Process one labelled sample stamped with the current wall-clock time.
    pub fn process_data_point(
        &mut self,
        features: FeatureSet,
        prediction: Prediction,
        actual_label: u8,
        metadata: SampleMetadata,
    ) -> Result<ProcessOutcome, SystemError> {
        self.process_data_point_at(features, prediction, actual_label, metadata, Utc::now())
    }

    /// Process one labelled sample at an explicit time. `now` stamps the
    /// buffered sample and drives drift typing and the time-interval trigger.
    pub fn process_data_point_at(
        &mut self,
        features: FeatureSet,
        prediction: Prediction,
        actual_label: u8,
        metadata: SampleMetadata,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, SystemError> {
        let clock = Instant::now();

        let actual = match validate_input(&features, &prediction, actual_label) {
            Ok(label) => label,
            Err(source) => {
                return Err(SystemError::Processing {
                    symbol: metadata.symbol,
                    source,
                })
            }
        };

        let started_at = *self.started_at.get_or_insert(now);
        self.total_samples += 1;
        let data_quality = features.completeness();

        let symbol = metadata.symbol.clone();
        self.buffer.add(IncrementalDataPoint::new(
            features.clone(),
            actual,
            now,
            prediction.confidence,
            metadata,
        ));

        let drift_result = self
            .detector
            .detect_drift_at(&prediction, actual, &features, now);
        if drift_result.is_drift {
            self.metrics.drift_detections += 1;
            info!(
                symbol = %symbol,
                method = drift_result.method.as_str(),
                score = drift_result.drift_score,
                drift_type = ?drift_result.drift_type,
                affected = ?drift_result.affected_features,
                "concept drift detected"
            );
        }

        self.metrics
            .observe(prediction.is_correct(actual), prediction.confidence);

        let reference = self.last_adaptation_time.unwrap_or(started_at);
        let inputs = TriggerInputs {
            is_drift: drift_result.is_drift,
            accuracy: self.metrics.accuracy,
            elapsed_ms: (now - reference).num_milliseconds(),
            buffer_len: self.buffer.len(),
        };
        let triggers = fired_triggers(&self.config.adaptation.triggers, &inputs);

        let adaptation = if triggers.is_empty() {
            AdaptationStatus::NotTriggered
        } else {
            let action = AdaptationAction::from_recommendation(drift_result.recommendation.action);
            self.adapt(action, triggers, now)
        };

        self.metrics.processing_time_ms = clock.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.memory_usage_bytes =
            self.buffer.len() * std::mem::size_of::<IncrementalDataPoint>();
        self.metrics.data_quality = data_quality;

        Ok(ProcessOutcome {
            drift_result,
            adaptation,
            performance: self.metrics.clone(),
        })
    }

    // ─── Adaptation ──────────────────────────────────────────────────

    fn adapt(
        &mut self,
        action: AdaptationAction,
        triggers: Vec<TriggerReason>,
        now: DateTime<Utc>,
    ) -> AdaptationStatus {
        let Some(_permit) = self.gate.try_acquire() else {
            debug!(action = action.as_str(), "adaptation already running, trigger ignored");
            return AdaptationStatus::AlreadyAdapting;
        };
        self.last_adaptation_time = Some(now);
        debug!(action = action.as_str(), ?triggers, "adaptation triggered");

        let status = match action {
            AdaptationAction::Retrain => self.retrain(triggers),
            AdaptationAction::GradualAdapt => self.gradual_adapt(triggers),
            AdaptationAction::Reset => self.reset_model(triggers),
        };

        match &status {
            AdaptationStatus::Completed(report) => info!(
                action = action.as_str(),
                samples = report.samples_used,
                iterations = report.iterations,
                converged = report.converged,
                "adaptation completed"
            ),
            AdaptationStatus::Skipped { reason, .. } => {
                warn!(action = action.as_str(), %reason, "adaptation skipped")
            }
            AdaptationStatus::Failed { reason, .. } => {
                warn!(action = action.as_str(), %reason, "adaptation failed")
            }
            AdaptationStatus::NotTriggered | AdaptationStatus::AlreadyAdapting => {}
        }
        status
    }

    fn retrain(&mut self, triggers: Vec<TriggerReason>) -> AdaptationStatus {
        let action = AdaptationAction::Retrain;
        let samples = self.buffer.all();
        if samples.len() < self.config.batch_size {
            return AdaptationStatus::Skipped {
                action,
                reason: format!(
                    "insufficient data for retraining: {} buffered < batch size {}",
                    samples.len(),
                    self.config.batch_size
                ),
            };
        }
        if let Err(e) = self.model.retrain(&samples, self.config.learning_rate) {
            return failed(action, e);
        }
        self.metrics.retrainings += 1;
        self.metrics.adaptations += 1;
        AdaptationStatus::Completed(AdaptationReport {
            action,
            triggers,
            samples_used: samples.len(),
            iterations: 1,
            converged: true,
        })
    }

    fn gradual_adapt(&mut self, triggers: Vec<TriggerReason>) -> AdaptationStatus {
        let action = AdaptationAction::GradualAdapt;
        let params = self.config.adaptation.parameters.clone();
        let batch = self.buffer.batch(params.batch_size);

        let mut iterations = 0;
        let mut converged = false;
        for iteration in 0..params.max_iterations {
            let improvement = match self.model.adapt_step(&batch, params.adaptation_rate, iteration)
            {
                Ok(v) => v,
                Err(e) => return failed(action, e),
            };
            iterations += 1;
            if improvement < params.convergence_threshold {
                converged = true;
                break;
            }
        }

        self.metrics.adaptations += 1;
        AdaptationStatus::Completed(AdaptationReport {
            action,
            triggers,
            samples_used: batch.len(),
            iterations,
            converged,
        })
    }

    /// Most destructive action: forget detector history, buffered samples
    /// and smoothed metrics. Lifetime counters survive.
    fn reset_model(&mut self, triggers: Vec<TriggerReason>) -> AdaptationStatus {
        let action = AdaptationAction::Reset;
        if let Err(e) = self.model.reset() {
            return failed(action, e);
        }
        let samples_used = self.buffer.len();
        self.detector.reset();
        self.buffer.clear();
        self.metrics.reset_smoothed();
        self.metrics.adaptations += 1;
        AdaptationStatus::Completed(AdaptationReport {
            action,
            triggers,
            samples_used,
            iterations: 0,
            converged: true,
        })
    }

    // ─── Config and lifecycle ────────────────────────────────────────

    /// Merge a partial config. A drift section rebuilds the detector from
    /// scratch; a buffer size or strategy change rebuilds the buffer and
    /// re-offers its current samples. On error nothing changes.
    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<(), ConfigError> {
        let next = self.config.merged(&update)?;

        if update.drift_detection.is_some() {
            info!(
                method = next.drift_detection.method.as_str(),
                window_size = next.drift_detection.window_size,
                "rebuilding drift detector, drift history discarded"
            );
            self.detector = ConceptDriftDetector::new(next.drift_detection.clone());
        }

        if next.buffer_size != self.config.buffer_size
            || next.buffer_strategy != self.config.buffer_strategy
        {
            self.buffer_generation += 1;
            let mut buffer = IncrementalLearningBuffer::new(
                next.buffer_size,
                next.buffer_strategy,
                self.rng.rng_for(BUFFER_STREAM, self.buffer_generation),
            );
            for point in self.buffer.all() {
                buffer.add(point);
            }
            info!(
                size = buffer.len(),
                capacity = next.buffer_size,
                strategy = ?next.buffer_strategy,
                "rebuilt learning buffer"
            );
            self.buffer = buffer;
        }

        self.config = next;
        Ok(())
    }

    /// Return to the freshly constructed state: detector, buffer, metrics
    /// and sample bookkeeping are all cleared and the gate is released. The
    /// buffer is rebuilt on its initial random stream and the model updater
    /// is asked to reset, so a [`SimulatedModel`] replays its first draws.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.buffer_generation = 0;
        self.buffer = IncrementalLearningBuffer::new(
            self.config.buffer_size,
            self.config.buffer_strategy,
            self.rng.rng_for(BUFFER_STREAM, 0),
        );
        self.metrics = PerformanceMetrics::default();
        self.total_samples = 0;
        self.started_at = None;
        self.last_adaptation_time = None;
        self.gate.force_release();
        if let Err(e) = self.model.reset() {
            warn!(error = %e, "model reset failed during system reset");
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.metrics.clone()
    }

    pub fn drift_statistics(&self) -> DriftStatistics {
        self.detector.statistics()
    }

    pub fn buffer_statistics(&self) -> BufferStatistics {
        self.buffer.statistics()
    }

    pub fn system_status(&self) -> SystemStatus {
        let metric = self.config.model_selection.metric;
        SystemStatus {
            is_adapting: self.gate.is_adapting(),
            total_samples: self.total_samples,
            buffer_size: self.buffer.len(),
            buffer_capacity: self.buffer.max_size(),
            last_adaptation_time: self.last_adaptation_time,
            drift_method: self.config.drift_detection.method,
            drift_count: self.detector.drift_count(),
            adaptation_kind: self.config.adaptation.kind,
            selection_metric: metric,
            selection_score: metric.extract(&self.metrics),
            performance: self.metrics.clone(),
        }
    }
}

fn validate_input(
    features: &FeatureSet,
    prediction: &Prediction,
    actual_label: u8,
) -> Result<Label, InputError> {
    let label = Label::try_from(actual_label)?;
    prediction.validate()?;
    features.validate()?;
    Ok(label)
}

fn failed(action: AdaptationAction, error: AdaptationError) -> AdaptationStatus {
    AdaptationStatus::Failed {
        action,
        reason: error.to_string(),
    }
}
