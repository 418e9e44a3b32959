//! Adaptation policy: trigger evaluation, action selection, the model
//! updater seam and the single-flight adaptation gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use driftlab_core::domain::IncrementalDataPoint;
use driftlab_core::drift::RecommendedAction;

use crate::config::AdaptationTriggers;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdaptationError {
    #[error("model update failed: {0}")]
    Model(String),
    #[error("no samples available for adaptation")]
    EmptyBatch,
}

// ─── Actions and outcomes ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationAction {
    Retrain,
    GradualAdapt,
    Reset,
}

impl AdaptationAction {
    /// Adapt and monitor recommendations both map to gradual adaptation.
    pub fn from_recommendation(action: RecommendedAction) -> Self {
        match action {
            RecommendedAction::Retrain => Self::Retrain,
            RecommendedAction::Reset => Self::Reset,
            RecommendedAction::Adapt | RecommendedAction::Monitor => Self::GradualAdapt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retrain => "retrain",
            Self::GradualAdapt => "gradual_adapt",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    Drift,
    PerformanceDrop,
    TimeInterval,
    DataVolume,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationReport {
    pub action: AdaptationAction,
    pub triggers: Vec<TriggerReason>,
    pub samples_used: usize,
    /// Updater steps taken (gradual adaptation only).
    pub iterations: usize,
    pub converged: bool,
}

/// What happened to adaptation on one processed sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdaptationStatus {
    NotTriggered,
    Completed(AdaptationReport),
    /// Triggered, but the chosen action could not run (e.g. too little data).
    Skipped {
        action: AdaptationAction,
        reason: String,
    },
    /// Triggered and attempted; the updater reported an error.
    Failed {
        action: AdaptationAction,
        reason: String,
    },
    /// Triggered while another adaptation held the gate.
    AlreadyAdapting,
}

impl AdaptationStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

// ─── Triggers ────────────────────────────────────────────────────────

/// Observations the trigger policy is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct TriggerInputs {
    pub is_drift: bool,
    pub accuracy: f64,
    /// Milliseconds since the last adaptation attempt, or since the first
    /// sample when none has happened yet.
    pub elapsed_ms: i64,
    pub buffer_len: usize,
}

/// Every trigger that fires; adaptation runs when the list is non-empty.
pub fn fired_triggers(triggers: &AdaptationTriggers, inputs: &TriggerInputs) -> Vec<TriggerReason> {
    let mut fired = Vec::new();
    if inputs.is_drift && triggers.drift_detection {
        fired.push(TriggerReason::Drift);
    }
    if inputs.accuracy < 1.0 - triggers.performance_drop {
        fired.push(TriggerReason::PerformanceDrop);
    }
    // A clock that moved backwards never counts as elapsed time.
    let elapsed_ms = u64::try_from(inputs.elapsed_ms).ok();
    if elapsed_ms.is_some_and(|elapsed| elapsed > triggers.time_interval_ms) {
        fired.push(TriggerReason::TimeInterval);
    }
    if inputs.buffer_len >= triggers.data_volume {
        fired.push(TriggerReason::DataVolume);
    }
    fired
}

// ─── Model updater seam ──────────────────────────────────────────────

/// The model being kept up to date. Implementations receive buffered
/// samples and report progress; they never see the buffer itself.
pub trait ModelUpdater: Send + Sync {
    /// Full retrain on `samples`.
    fn retrain(
        &mut self,
        samples: &[IncrementalDataPoint],
        learning_rate: f64,
    ) -> Result<(), AdaptationError>;

    /// One incremental step on `batch`; returns the improvement achieved.
    fn adapt_step(
        &mut self,
        batch: &[IncrementalDataPoint],
        rate: f64,
        iteration: usize,
    ) -> Result<f64, AdaptationError>;

    /// Discard learned state.
    fn reset(&mut self) -> Result<(), AdaptationError>;
}

/// Stand-in model with no parameters: retrains succeed immediately and
/// each gradual step reports a random improvement that decays with the
/// iteration count. `reset` rewinds the step stream to where it started.
#[derive(Debug, Clone)]
pub struct SimulatedModel {
    initial: StdRng,
    rng: StdRng,
    version: u64,
}

impl SimulatedModel {
    pub fn new(rng: StdRng) -> Self {
        Self {
            initial: rng.clone(),
            rng,
            version: 0,
        }
    }

    /// Bumped on every retrain or reset.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl ModelUpdater for SimulatedModel {
    fn retrain(
        &mut self,
        samples: &[IncrementalDataPoint],
        _learning_rate: f64,
    ) -> Result<(), AdaptationError> {
        if samples.is_empty() {
            return Err(AdaptationError::EmptyBatch);
        }
        self.version += 1;
        Ok(())
    }

    fn adapt_step(
        &mut self,
        batch: &[IncrementalDataPoint],
        rate: f64,
        iteration: usize,
    ) -> Result<f64, AdaptationError> {
        if batch.is_empty() {
            return Err(AdaptationError::EmptyBatch);
        }
        let draw: f64 = self.rng.gen();
        Ok(rate * draw / (iteration + 1) as f64)
    }

    fn reset(&mut self) -> Result<(), AdaptationError> {
        self.rng = self.initial.clone();
        self.version += 1;
        Ok(())
    }
}

// ─── Gate ────────────────────────────────────────────────────────────

/// `{idle, adapting}` flag shared between a system and anything observing
/// it. At most one [`AdaptationPermit`] exists at a time.
#[derive(Debug, Clone, Default)]
pub struct AdaptationGate {
    adapting: Arc<AtomicBool>,
}

impl AdaptationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move idle -> adapting. `None` when an adaptation is already running.
    pub fn try_acquire(&self) -> Option<AdaptationPermit> {
        self.adapting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AdaptationPermit {
                adapting: Arc::clone(&self.adapting),
            })
    }

    pub fn is_adapting(&self) -> bool {
        self.adapting.load(Ordering::Acquire)
    }

    /// Return to idle regardless of outstanding permits.
    pub fn force_release(&self) {
        self.adapting.store(false, Ordering::Release);
    }
}

/// Holds the gate in the adapting state; dropping it returns to idle.
#[derive(Debug)]
pub struct AdaptationPermit {
    adapting: Arc<AtomicBool>,
}

impl Drop for AdaptationPermit {
    fn drop(&mut self) {
        self.adapting.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn inputs() -> TriggerInputs {
        TriggerInputs {
            is_drift: false,
            accuracy: 0.95,
            elapsed_ms: 0,
            buffer_len: 0,
        }
    }

    #[test]
    fn quiet_inputs_fire_nothing() {
        assert!(fired_triggers(&AdaptationTriggers::default(), &inputs()).is_empty());
    }

    #[test]
    fn each_trigger_fires_independently() {
        let triggers = AdaptationTriggers::default();

        let drift = TriggerInputs { is_drift: true, ..inputs() };
        assert_eq!(fired_triggers(&triggers, &drift), vec![TriggerReason::Drift]);

        let drop = TriggerInputs { accuracy: 0.85, ..inputs() };
        assert_eq!(fired_triggers(&triggers, &drop), vec![TriggerReason::PerformanceDrop]);

        let stale = TriggerInputs { elapsed_ms: 3_600_001, ..inputs() };
        assert_eq!(fired_triggers(&triggers, &stale), vec![TriggerReason::TimeInterval]);

        let full = TriggerInputs { buffer_len: 1000, ..inputs() };
        assert_eq!(fired_triggers(&triggers, &full), vec![TriggerReason::DataVolume]);
    }

    #[test]
    fn max_time_interval_never_fires() {
        let triggers = AdaptationTriggers {
            time_interval_ms: u64::MAX,
            ..AdaptationTriggers::default()
        };
        for elapsed_ms in [0, 1_000, i64::MAX] {
            let stale = TriggerInputs { elapsed_ms, ..inputs() };
            assert!(fired_triggers(&triggers, &stale).is_empty());
        }
    }

    #[test]
    fn negative_elapsed_time_never_fires() {
        let triggers = AdaptationTriggers {
            time_interval_ms: 0,
            ..AdaptationTriggers::default()
        };
        let skewed = TriggerInputs { elapsed_ms: -5, ..inputs() };
        assert!(fired_triggers(&triggers, &skewed).is_empty());
    }

    #[test]
    fn drift_trigger_respects_gate_flag() {
        let triggers = AdaptationTriggers {
            drift_detection: false,
            ..AdaptationTriggers::default()
        };
        let drift = TriggerInputs { is_drift: true, ..inputs() };
        assert!(fired_triggers(&triggers, &drift).is_empty());
    }

    #[test]
    fn recommendation_mapping() {
        use AdaptationAction::*;
        assert_eq!(AdaptationAction::from_recommendation(RecommendedAction::Retrain), Retrain);
        assert_eq!(AdaptationAction::from_recommendation(RecommendedAction::Reset), Reset);
        assert_eq!(AdaptationAction::from_recommendation(RecommendedAction::Adapt), GradualAdapt);
        assert_eq!(AdaptationAction::from_recommendation(RecommendedAction::Monitor), GradualAdapt);
    }

    #[test]
    fn gate_is_single_flight() {
        let gate = AdaptationGate::new();
        let permit = gate.try_acquire().expect("idle gate must be acquirable");
        assert!(gate.is_adapting());
        assert!(gate.try_acquire().is_none());
        drop(permit);
        assert!(!gate.is_adapting());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn cloned_gate_shares_state() {
        let gate = AdaptationGate::new();
        let observer = gate.clone();
        let _permit = gate.try_acquire().unwrap();
        assert!(observer.is_adapting());
        observer.force_release();
        assert!(!gate.is_adapting());
    }

    #[test]
    fn simulated_steps_are_bounded_by_decay() {
        use chrono::Utc;
        use driftlab_core::domain::{FeatureSet, Label, SampleMetadata};

        let mut model = SimulatedModel::new(StdRng::seed_from_u64(1));
        let batch = vec![IncrementalDataPoint::new(
            FeatureSet::new(),
            Label::Buy,
            Utc::now(),
            0.7,
            SampleMetadata::new("SPY", "test"),
        )];
        for iteration in 0..10 {
            let step = model.adapt_step(&batch, 0.01, iteration).unwrap();
            assert!((0.0..=0.01 / (iteration + 1) as f64).contains(&step));
        }
    }

    #[test]
    fn simulated_model_rejects_empty_batches() {
        let mut model = SimulatedModel::new(StdRng::seed_from_u64(1));
        let batch: Vec<IncrementalDataPoint> = Vec::new();
        assert_eq!(
            model.adapt_step(&batch, 0.01, 0),
            Err(AdaptationError::EmptyBatch)
        );
        assert_eq!(model.retrain(&batch, 0.001), Err(AdaptationError::EmptyBatch));
        model.reset().unwrap();
        assert_eq!(model.version(), 1);
    }

    #[test]
    fn simulated_reset_rewinds_steps() {
        use chrono::Utc;
        use driftlab_core::domain::{FeatureSet, Label, SampleMetadata};

        let batch = vec![IncrementalDataPoint::new(
            FeatureSet::new(),
            Label::Hold,
            Utc::now(),
            0.5,
            SampleMetadata::new("SPY", "test"),
        )];
        let mut model = SimulatedModel::new(StdRng::seed_from_u64(9));
        let first: Vec<f64> = (0..5)
            .map(|i| model.adapt_step(&batch, 0.01, i).unwrap())
            .collect();
        model.reset().unwrap();
        let again: Vec<f64> = (0..5)
            .map(|i| model.adapt_step(&batch, 0.01, i).unwrap())
            .collect();
        assert_eq!(first, again);
    }
}
