//! DriftLab Core — streaming drift detectors, sample buffer, domain types.
//!
//! This crate contains the statistical heart of the incremental learning engine:
//! - Domain types (labels, signals, predictions, feature sets, data points)
//! - ADWIN and Page-Hinkley detectors over a correctness stream
//! - Inline DDM and two-halves checks
//! - Concept drift orchestrator with drift typing, feature attribution and
//!   recommendations
//! - Bounded learning buffer with FIFO, reservoir and importance-weighted
//!   admission
//! - Deterministic RNG hierarchy

pub mod buffer;
pub mod domain;
pub mod drift;
pub mod rng;

pub use buffer::{BufferStatistics, BufferStrategy, IncrementalLearningBuffer, LabelDistribution};
pub use domain::{
    FeatureSet, IncrementalDataPoint, InputError, Label, Prediction, SampleMetadata, Signal,
    TrackedFeature,
};
pub use drift::{
    ConceptDriftDetector, DriftDetectionConfig, DriftDetectionResult, DriftMethod,
    DriftStatistics, DriftType, RecommendedAction, Urgency,
};
pub use rng::RngHierarchy;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: detector and buffer types can move across threads,
    /// so independent per-symbol systems can run on a thread pool.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<Label>();
        require_sync::<Label>();
        require_send::<Prediction>();
        require_sync::<Prediction>();
        require_send::<FeatureSet>();
        require_sync::<FeatureSet>();
        require_send::<IncrementalDataPoint>();
        require_sync::<IncrementalDataPoint>();

        // Detectors
        require_send::<drift::Adwin>();
        require_sync::<drift::Adwin>();
        require_send::<drift::PageHinkley>();
        require_sync::<drift::PageHinkley>();
        require_send::<ConceptDriftDetector>();
        require_sync::<ConceptDriftDetector>();
        require_send::<DriftDetectionResult>();
        require_sync::<DriftDetectionResult>();

        // Buffer
        require_send::<IncrementalLearningBuffer>();
        require_sync::<IncrementalLearningBuffer>();

        // RNG
        require_send::<RngHierarchy>();
        require_sync::<RngHierarchy>();
    }

    /// Architecture contract: the orchestrator consumes typed predictions
    /// and labels, never raw integers.
    #[test]
    fn detector_takes_typed_inputs() {
        fn _check(
            detector: &mut ConceptDriftDetector,
            prediction: &Prediction,
            features: &FeatureSet,
        ) -> DriftDetectionResult {
            detector.detect_drift(prediction, Label::Hold, features)
        }
    }
}
