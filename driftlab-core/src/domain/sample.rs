//! One labeled observation held by the learning buffer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FeatureSet, Label};

/// Where a sample came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub symbol: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub market_condition: Option<String>,
}

impl SampleMetadata {
    pub fn new(symbol: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            source: source.into(),
            market_condition: None,
        }
    }
}

/// Labeled observation: the features seen, the true label, and the model's
/// confidence in the prediction that was paired with this label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalDataPoint {
    pub features: FeatureSet,
    pub label: Label,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub metadata: SampleMetadata,
}

impl IncrementalDataPoint {
    pub fn new(
        features: FeatureSet,
        label: Label,
        timestamp: DateTime<Utc>,
        confidence: f64,
        metadata: SampleMetadata,
    ) -> Self {
        Self {
            features,
            label,
            timestamp,
            confidence,
            metadata,
        }
    }
}
