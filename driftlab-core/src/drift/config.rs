//! Drift detection configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detection algorithm selector.
///
/// Only `Adwin`, `PageHinkley` and `Ddm` have dedicated implementations.
/// `Eddm` and `Kswin` are accepted for compatibility with stored configs and
/// fall back to the two-halves accuracy comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftMethod {
    Adwin,
    Ddm,
    Eddm,
    PageHinkley,
    Kswin,
}

impl DriftMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DriftMethod::Adwin => "adwin",
            DriftMethod::Ddm => "ddm",
            DriftMethod::Eddm => "eddm",
            DriftMethod::PageHinkley => "page_hinkley",
            DriftMethod::Kswin => "kswin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriftConfigError {
    #[error("window_size must be at least 2, got {0}")]
    WindowTooSmall(usize),
    #[error("confidence_level must be in (0, 1), got {0}")]
    ConfidenceLevel(f64),
    #[error("{name} must be a finite non-negative number, got {value}")]
    Threshold { name: &'static str, value: f64 },
    #[error("page_hinkley_alpha must be in [0, 1], got {0}")]
    Alpha(f64),
}

/// Configuration for [`ConceptDriftDetector`](super::ConceptDriftDetector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftDetectionConfig {
    pub method: DriftMethod,
    /// Cap on the rolling performance and feature histories.
    pub window_size: usize,
    /// ADWIN uses `delta = 1 - confidence_level`.
    pub confidence_level: f64,
    /// Warning cut-off for the two-halves fallback method.
    pub warning_threshold: f64,
    /// Drift cut-off for the two-halves fallback method.
    pub drift_threshold: f64,
    /// Samples required before any method may alarm.
    pub min_samples: usize,
    /// Reported to adaptation consumers; not used by the detectors.
    pub adaptation_rate: f64,
    pub page_hinkley_threshold: f64,
    /// Weight of the previous running mean, and twice the per-sample
    /// allowance subtracted from the cumulative sum. On a stationary stream
    /// the allowance alone crosses the threshold every
    /// `threshold / (alpha / 2)` samples.
    pub page_hinkley_alpha: f64,
}

impl Default for DriftDetectionConfig {
    fn default() -> Self {
        Self {
            method: DriftMethod::Adwin,
            window_size: 100,
            confidence_level: 0.95,
            warning_threshold: 0.1,
            drift_threshold: 0.2,
            min_samples: 30,
            adaptation_rate: 0.01,
            page_hinkley_threshold: 100.0,
            page_hinkley_alpha: 0.999,
        }
    }
}

impl DriftDetectionConfig {
    pub fn adwin_delta(&self) -> f64 {
        1.0 - self.confidence_level
    }

    pub fn validate(&self) -> Result<(), DriftConfigError> {
        if self.window_size < 2 {
            return Err(DriftConfigError::WindowTooSmall(self.window_size));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(DriftConfigError::ConfidenceLevel(self.confidence_level));
        }
        for (name, value) in [
            ("warning_threshold", self.warning_threshold),
            ("drift_threshold", self.drift_threshold),
            ("adaptation_rate", self.adaptation_rate),
            ("page_hinkley_threshold", self.page_hinkley_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DriftConfigError::Threshold { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.page_hinkley_alpha) {
            return Err(DriftConfigError::Alpha(self.page_hinkley_alpha));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = DriftDetectionConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.adwin_delta() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn rejects_degenerate_values() {
        let mut config = DriftDetectionConfig::default();
        config.confidence_level = 1.0;
        assert!(matches!(
            config.validate(),
            Err(DriftConfigError::ConfidenceLevel(_))
        ));

        let mut config = DriftDetectionConfig::default();
        config.window_size = 1;
        assert!(config.validate().is_err());

        let mut config = DriftDetectionConfig::default();
        config.drift_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn method_uses_snake_case() {
        let json = serde_json::to_string(&DriftMethod::PageHinkley).unwrap();
        assert_eq!(json, "\"page_hinkley\"");
        let method: DriftMethod = serde_json::from_str("\"kswin\"").unwrap();
        assert_eq!(method, DriftMethod::Kswin);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: DriftDetectionConfig =
            serde_json::from_str(r#"{"method":"ddm","window_size":50}"#).unwrap();
        assert_eq!(config.method, DriftMethod::Ddm);
        assert_eq!(config.window_size, 50);
        assert_eq!(config.min_samples, 30);
    }
}
