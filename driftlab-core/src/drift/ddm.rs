//! DDM (Drift Detection Method), evaluated over the rolling correctness
//! history rather than as a standalone stateful detector.
//!
//! Gama et al. (2004): with error rate `p` over `n` samples and standard
//! error `s = sqrt(p(1 - p) / n)`, the warning level is `p + 2s` and the
//! drift level is `p + 3s`. The latest sample's error (0 or 1) is compared
//! against both levels.

use serde::{Deserialize, Serialize};

const WARNING_SIGMAS: f64 = 2.0;
const DRIFT_SIGMAS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DdmOutcome {
    pub is_drift: bool,
    pub is_warning: bool,
    /// Empirical error rate over the history (0 while inactive).
    pub error_rate: f64,
    pub std_error: f64,
    pub warning_level: f64,
    pub drift_level: f64,
}

impl DdmOutcome {
    fn inactive() -> Self {
        Self {
            is_drift: false,
            is_warning: false,
            error_rate: 0.0,
            std_error: 0.0,
            warning_level: 0.0,
            drift_level: 0.0,
        }
    }
}

/// Evaluate DDM over a correctness history (1.0 = correct, 0.0 = wrong),
/// oldest first. Inactive until `min_samples` values are present.
pub fn evaluate(correctness: &[f64], min_samples: usize) -> DdmOutcome {
    let n = correctness.len();
    if n == 0 || n < min_samples {
        return DdmOutcome::inactive();
    }

    let errors = correctness.iter().map(|c| 1.0 - c).sum::<f64>();
    let p = errors / n as f64;
    let s = (p * (1.0 - p) / n as f64).sqrt();
    let warning_level = p + WARNING_SIGMAS * s;
    let drift_level = p + DRIFT_SIGMAS * s;

    let latest_error = correctness.last().map_or(0.0, |c| 1.0 - c);
    let is_drift = latest_error > drift_level;
    let is_warning = !is_drift && latest_error > warning_level;

    DdmOutcome {
        is_drift,
        is_warning,
        error_rate: p,
        std_error: s,
        warning_level,
        drift_level,
    }
}
