//! End-to-end tests for the incremental learning system.

use chrono::{DateTime, Duration, Utc};

use driftlab_core::buffer::BufferStrategy;
use driftlab_core::domain::{
    FeatureSet, IncrementalDataPoint, Prediction, SampleMetadata, Signal, TrackedFeature,
};
use driftlab_core::drift::{DriftDetectionConfig, DriftMethod};
use driftlab_runner::{
    create_incremental_learning_system, AdaptationAction, AdaptationError, AdaptationStatus,
    ConfigUpdate, DriftDetectionUpdate, IncrementalLearningConfig, IncrementalLearningSystem,
    ModelUpdater, PerformanceMetrics, ProcessOutcome,
};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-04-01T13:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn features(i: usize) -> FeatureSet {
    FeatureSet::new()
        .with(TrackedFeature::Rsi, 50.0 + i as f64)
        .with(TrackedFeature::Volatility, 0.02)
}

fn small_adwin_config() -> IncrementalLearningConfig {
    IncrementalLearningConfig {
        drift_detection: DriftDetectionConfig {
            method: DriftMethod::Adwin,
            window_size: 10,
            min_samples: 5,
            drift_threshold: 0.2,
            ..DriftDetectionConfig::default()
        },
        ..IncrementalLearningConfig::default()
    }
}

/// Buy at 0.9 confidence; `correct` decides whether the label agrees.
/// Samples are one minute apart.
fn feed(system: &mut IncrementalLearningSystem, hits: &[bool]) -> Vec<ProcessOutcome> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let label = if *hit { 2 } else { 0 };
            system
                .process_data_point_at(
                    features(i),
                    Prediction::new(Signal::Buy, 0.9),
                    label,
                    SampleMetadata::new("SPY", "test"),
                    t0() + Duration::minutes(i as i64),
                )
                .unwrap()
        })
        .collect()
}

fn five_right_five_wrong() -> Vec<bool> {
    [true; 5].into_iter().chain([false; 5]).collect()
}

// ─── End-to-end scenarios ────────────────────────────────────────────

#[test]
fn accuracy_collapse_is_detected() {
    let mut system = IncrementalLearningSystem::new(small_adwin_config()).unwrap();
    let outcomes = feed(&mut system, &five_right_five_wrong());

    for pair in outcomes[4..].windows(2) {
        assert!(pair[1].performance.accuracy <= pair[0].performance.accuracy);
    }
    assert!(outcomes.iter().any(|o| o.drift_result.is_drift));
    assert!(outcomes[..5].iter().all(|o| !o.drift_result.is_drift));

    let drifts = outcomes.iter().filter(|o| o.drift_result.is_drift).count() as u64;
    assert_eq!(system.performance_metrics().drift_detections, drifts);
    assert_eq!(system.system_status().total_samples, 10);
}

#[test]
fn severe_drift_retrain_is_skipped_without_enough_data() {
    let mut system = IncrementalLearningSystem::new(small_adwin_config()).unwrap();
    let outcomes = feed(&mut system, &five_right_five_wrong());

    // Sample 8: the ADWIN window has collapsed to all errors (score 1).
    let severe = &outcomes[7];
    assert!(severe.drift_result.is_drift);
    assert_eq!(severe.drift_result.drift_score, 1.0);
    assert!(matches!(
        severe.adaptation,
        AdaptationStatus::Skipped {
            action: AdaptationAction::Retrain,
            ..
        }
    ));
    assert_eq!(system.performance_metrics().retrainings, 0);
}

#[test]
fn severe_drift_retrains_with_enough_data() {
    let config = IncrementalLearningConfig {
        batch_size: 4,
        ..small_adwin_config()
    };
    let mut system = IncrementalLearningSystem::new(config).unwrap();
    let outcomes = feed(&mut system, &five_right_five_wrong());

    match &outcomes[7].adaptation {
        AdaptationStatus::Completed(report) => {
            assert_eq!(report.action, AdaptationAction::Retrain);
            assert_eq!(report.samples_used, 8);
        }
        other => panic!("expected completed retrain, got {other:?}"),
    }
    let metrics = system.performance_metrics();
    assert_eq!(metrics.retrainings, 1);
    // Smoothed accuracy never reaches 0.9, so every sample adapts.
    assert_eq!(metrics.adaptations, 10);
}

#[test]
fn importance_weighted_buffer_keeps_most_confident() {
    let config = IncrementalLearningConfig {
        buffer_size: 50,
        buffer_strategy: BufferStrategy::ImportanceWeighted,
        ..IncrementalLearningConfig::default()
    };
    let mut system = IncrementalLearningSystem::new(config).unwrap();

    // Exactly buffer_size samples: everything is retained.
    for i in 0..50 {
        let confidence = (i + 1) as f64 / 100.0;
        system
            .process_data_point_at(
                features(i),
                Prediction::new(Signal::Hold, confidence),
                1,
                SampleMetadata::new("QQQ", "test"),
                t0() + Duration::minutes(i as i64),
            )
            .unwrap();
    }
    let stats = system.buffer_statistics();
    assert_eq!(stats.size, 50);
    assert!((stats.avg_confidence - 0.255).abs() < 1e-9);

    // Another 50 with higher confidence displace all of them.
    for i in 50..100 {
        let confidence = (i + 1) as f64 / 100.0;
        system
            .process_data_point_at(
                features(i),
                Prediction::new(Signal::Hold, confidence),
                1,
                SampleMetadata::new("QQQ", "test"),
                t0() + Duration::minutes(i as i64),
            )
            .unwrap();
    }
    let stats = system.buffer_statistics();
    assert_eq!(stats.size, 50);
    assert!((stats.avg_confidence - 0.755).abs() < 1e-9);
}

#[test]
fn sudden_moderate_drift_resets_state() {
    let config = IncrementalLearningConfig {
        drift_detection: DriftDetectionConfig {
            method: DriftMethod::Kswin,
            window_size: 10,
            min_samples: 4,
            drift_threshold: 0.2,
            ..DriftDetectionConfig::default()
        },
        ..IncrementalLearningConfig::default()
    };
    let mut system = IncrementalLearningSystem::new(config).unwrap();

    // All samples share one timestamp so the second drift is sudden.
    let mut outcomes = Vec::new();
    for (i, hit) in five_right_five_wrong().into_iter().enumerate() {
        outcomes.push(
            system
                .process_data_point_at(
                    features(i),
                    Prediction::new(Signal::Buy, 0.9),
                    if hit { 2 } else { 0 },
                    SampleMetadata::new("IWM", "test"),
                    t0(),
                )
                .unwrap(),
        );
    }

    let reset = &outcomes[6];
    assert!(reset.drift_result.is_drift);
    match &reset.adaptation {
        AdaptationStatus::Completed(report) => assert_eq!(report.action, AdaptationAction::Reset),
        other => panic!("expected reset, got {other:?}"),
    }
    assert_eq!(reset.performance.accuracy, 0.0);
    assert_eq!(reset.performance.samples, 0);
    // Counters survive the reset action.
    assert_eq!(reset.performance.drift_detections, 2);
    // Buffer was cleared at sample 7; samples 8..10 refill it.
    assert_eq!(system.buffer_statistics().size, 3);
}

// ─── Config updates ──────────────────────────────────────────────────

#[test]
fn drift_config_update_resets_drift_history() {
    let mut system = IncrementalLearningSystem::new(small_adwin_config()).unwrap();
    feed(&mut system, &five_right_five_wrong());
    assert!(system.drift_statistics().drift_count >= 1);
    let buffered = system.buffer_statistics().size;

    system
        .update_config(ConfigUpdate {
            drift_detection: Some(DriftDetectionUpdate {
                window_size: Some(20),
                ..DriftDetectionUpdate::default()
            }),
            ..ConfigUpdate::default()
        })
        .unwrap();

    let stats = system.drift_statistics();
    assert_eq!(stats.drift_count, 0);
    assert_eq!(stats.samples_seen, 0);
    assert_eq!(system.config().drift_detection.window_size, 20);
    assert_eq!(system.config().drift_detection.min_samples, 5);
    // Buffer untouched by a drift-only update.
    assert_eq!(system.buffer_statistics().size, buffered);
}

#[test]
fn non_drift_update_keeps_drift_history() {
    let mut system = IncrementalLearningSystem::new(small_adwin_config()).unwrap();
    feed(&mut system, &five_right_five_wrong());
    let before = system.drift_statistics();

    system
        .update_config(ConfigUpdate {
            learning_rate: Some(0.05),
            ..ConfigUpdate::default()
        })
        .unwrap();
    assert_eq!(system.drift_statistics(), before);
    assert_eq!(system.config().learning_rate, 0.05);
}

#[test]
fn buffer_update_rebuilds_and_keeps_samples() {
    let mut system = IncrementalLearningSystem::new(small_adwin_config()).unwrap();
    feed(&mut system, &[true; 8]);
    system
        .update_config(ConfigUpdate {
            buffer_size: Some(5),
            buffer_strategy: Some(BufferStrategy::Fifo),
            ..ConfigUpdate::default()
        })
        .unwrap();
    let stats = system.buffer_statistics();
    assert_eq!(stats.size, 5);
    assert_eq!(stats.max_size, 5);
    assert_eq!(stats.strategy, BufferStrategy::Fifo);
    assert_eq!(stats.newest, Some(t0() + Duration::minutes(7)));
}

#[test]
fn invalid_update_changes_nothing() {
    let mut system = IncrementalLearningSystem::new(small_adwin_config()).unwrap();
    let before = system.config().clone();
    let result = system.update_config(ConfigUpdate {
        drift_detection: Some(DriftDetectionUpdate {
            confidence_level: Some(1.5),
            ..DriftDetectionUpdate::default()
        }),
        ..ConfigUpdate::default()
    });
    assert!(result.is_err());
    assert_eq!(system.config(), &before);
}

// ─── Accessors and lifecycle ─────────────────────────────────────────

#[test]
fn accessor_copies_are_independent() {
    let mut system = create_incremental_learning_system(None).unwrap();
    feed(&mut system, &[true, false, true]);

    let mut first = system.performance_metrics();
    let second = system.performance_metrics();
    assert_eq!(first, second);

    first.accuracy = 42.0;
    first.adaptations = 999;
    assert_ne!(first, second);
    assert_eq!(system.performance_metrics(), second);
}

#[test]
fn reset_returns_to_fresh_state() {
    let mut system = IncrementalLearningSystem::new(small_adwin_config()).unwrap();
    feed(&mut system, &five_right_five_wrong());
    system.reset();

    let status = system.system_status();
    assert_eq!(status.total_samples, 0);
    assert_eq!(status.buffer_size, 0);
    assert_eq!(status.drift_count, 0);
    assert_eq!(status.last_adaptation_time, None);
    assert!(!status.is_adapting);
    assert_eq!(system.performance_metrics(), PerformanceMetrics::default());

    let fresh = IncrementalLearningSystem::new(small_adwin_config()).unwrap();
    assert_eq!(system.drift_statistics(), fresh.drift_statistics());
}

#[test]
fn reset_replays_the_same_random_draws() {
    let config = IncrementalLearningConfig {
        buffer_size: 4,
        buffer_strategy: BufferStrategy::Reservoir,
        ..small_adwin_config()
    };
    let stream: Vec<bool> = (0..12).map(|i| i % 3 != 0).collect();

    let mut fresh = IncrementalLearningSystem::new(config.clone()).unwrap();
    let expected = feed(&mut fresh, &stream);

    let mut reused = IncrementalLearningSystem::new(config).unwrap();
    feed(&mut reused, &five_right_five_wrong());
    reused.reset();
    let replayed = feed(&mut reused, &stream);

    let statuses = |outcomes: &[ProcessOutcome]| -> Vec<AdaptationStatus> {
        outcomes.iter().map(|o| o.adaptation.clone()).collect()
    };
    assert_eq!(statuses(&replayed), statuses(&expected));
    assert!(expected.iter().any(|o| o.adaptation.is_completed()));
    assert_eq!(reused.buffer_statistics(), fresh.buffer_statistics());
}

#[test]
fn unbounded_time_interval_never_triggers() {
    let mut config = IncrementalLearningConfig::default();
    config.adaptation.triggers.performance_drop = 1.0;
    config.adaptation.triggers.time_interval_ms = u64::MAX;
    let mut system = IncrementalLearningSystem::new(config).unwrap();

    for offset in [0, 1, 86_400] {
        let outcome = system
            .process_data_point_at(
                features(0),
                Prediction::new(Signal::Buy, 0.9),
                2,
                SampleMetadata::new("SPY", "test"),
                t0() + Duration::seconds(offset),
            )
            .unwrap();
        assert_eq!(outcome.adaptation, AdaptationStatus::NotTriggered);
    }
}

#[test]
fn status_reports_selection_score() {
    let mut system = create_incremental_learning_system(None).unwrap();
    feed(&mut system, &[true; 4]);
    let status = system.system_status();
    assert_eq!(status.selection_score, status.performance.f1_score);
    assert_eq!(status.drift_method, DriftMethod::Adwin);
    assert_eq!(status.buffer_capacity, 1000);
}

// ─── Adaptation gate and failures ────────────────────────────────────

#[test]
fn busy_gate_blocks_adaptation() {
    let mut system = create_incremental_learning_system(None).unwrap();
    let gate = system.adaptation_gate();
    let permit = gate.try_acquire().unwrap();

    // Smoothed accuracy starts at 0, so the performance trigger fires.
    let blocked = feed(&mut system, &[true]);
    assert_eq!(blocked[0].adaptation, AdaptationStatus::AlreadyAdapting);
    assert!(system.system_status().is_adapting);
    assert_eq!(system.system_status().last_adaptation_time, None);

    drop(permit);
    let resumed = feed(&mut system, &[true]);
    assert!(resumed[0].adaptation.is_completed());
    assert!(!system.system_status().is_adapting);
}

struct FailingModel;

impl ModelUpdater for FailingModel {
    fn retrain(&mut self, _: &[IncrementalDataPoint], _: f64) -> Result<(), AdaptationError> {
        Err(AdaptationError::Model("device unavailable".into()))
    }

    fn adapt_step(
        &mut self,
        _: &[IncrementalDataPoint],
        _: f64,
        _: usize,
    ) -> Result<f64, AdaptationError> {
        Err(AdaptationError::Model("device unavailable".into()))
    }

    fn reset(&mut self) -> Result<(), AdaptationError> {
        Ok(())
    }
}

#[test]
fn updater_failure_is_reported_and_gate_released() {
    let mut system = IncrementalLearningSystem::with_model(
        IncrementalLearningConfig::default(),
        Box::new(FailingModel),
    )
    .unwrap();

    let outcomes = feed(&mut system, &[true, true]);
    for outcome in &outcomes {
        match &outcome.adaptation {
            AdaptationStatus::Failed { action, reason } => {
                assert_eq!(*action, AdaptationAction::GradualAdapt);
                assert!(reason.contains("device unavailable"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
    assert!(!system.system_status().is_adapting);
    assert_eq!(system.performance_metrics().adaptations, 0);
}
