//! DriftLab Runner — the incremental learning system built on `driftlab-core`.
//!
//! This crate provides:
//! - Serializable configuration with partial runtime updates
//! - EMA-smoothed performance metrics
//! - Adaptation trigger policy, model updater seam and single-flight gate
//! - `IncrementalLearningSystem`, the per-sample orchestrator
//! - CSV / JSONL sample replay, parallel across symbols
//! - Synthetic regime-shift simulator

pub mod adaptation;
pub mod config;
pub mod metrics;
pub mod replay;
pub mod simulate;
pub mod system;

pub use adaptation::{
    AdaptationAction, AdaptationError, AdaptationGate, AdaptationPermit, AdaptationReport,
    AdaptationStatus, ModelUpdater, SimulatedModel, TriggerReason,
};
pub use config::{
    AdaptationKind, AdaptationParameters, AdaptationStrategy, AdaptationTriggers, ConfigError,
    ConfigUpdate, DriftDetectionUpdate, IncrementalLearningConfig, ModelSelection,
    SelectionMetric,
};
pub use metrics::PerformanceMetrics;
pub use replay::{
    load_csv, load_jsonl, load_samples, replay_by_symbol, replay_symbol, AdaptationTally,
    ReplayError, ReplayReport, SampleRecord,
};
pub use simulate::{Regime, RegimeShiftSimulator, SimulationConfig, SimulationError};
pub use system::{
    create_incremental_learning_system, IncrementalLearningSystem, ProcessOutcome, SystemError,
    SystemStatus,
};
