//! Concept drift detection.
//!
//! - `adwin` — adaptive windowing over the correctness stream
//! - `page_hinkley` — cumulative-deviation test
//! - `ddm` — error rate vs. standard error, evaluated over the rolling history
//! - `concept` — the orchestrator that selects a method, attributes drifted
//!   features and recommends an action

pub mod adwin;
pub mod concept;
pub mod config;
pub mod ddm;
pub mod history;
pub mod page_hinkley;
pub mod result;

pub use adwin::{Adwin, AdwinStatistics};
pub use concept::{ConceptDriftDetector, DriftStatistics};
pub use config::{DriftConfigError, DriftDetectionConfig, DriftMethod};
pub use ddm::DdmOutcome;
pub use history::RollingWindow;
pub use page_hinkley::{PageHinkley, PageHinkleyStatistics};
pub use result::{DriftDetectionResult, DriftType, Recommendation, RecommendedAction, Urgency};

/// A stateful detector over a scalar stream.
pub trait StreamDetector {
    /// Feed one value; true iff a change was detected on this call.
    fn add_element(&mut self, value: f64) -> bool;

    fn reset(&mut self);

    /// Values currently held (window width or samples since restart).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Feed a whole stream, returning the indices at which changes were detected.
pub fn detection_points<D: StreamDetector + ?Sized>(detector: &mut D, values: &[f64]) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| detector.add_element(v).then_some(i))
        .collect()
}
