//! Domain types for DriftLab

pub mod features;
pub mod label;
pub mod sample;

use thiserror::Error;

pub use features::{FeatureSet, MarketFeatures, StatisticalFeatures, TechnicalFeatures, TrackedFeature};
pub use label::{Label, Prediction, Signal};
pub use sample::{IncrementalDataPoint, SampleMetadata};

/// Malformed caller input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("label {0} out of range (expected 0 = sell, 1 = hold, 2 = buy)")]
    LabelOutOfRange(u8),
    #[error("confidence {0} must be a finite value in [0, 1]")]
    InvalidConfidence(f64),
    #[error("feature '{feature}' is not finite: {value}")]
    NonFiniteFeature { feature: String, value: f64 },
    #[error("unknown signal '{0}' (expected buy, sell or hold)")]
    UnknownSignal(String),
}
