//! Feature bag attached to every sample.
//!
//! Five scalar features are tracked by the drift detector for attribution:
//! RSI, MACD, volatility, volume and market cap. Anything else rides along in
//! `extra` and is stored with the sample but never inspected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::InputError;

/// The scalar features whose distributions are monitored for shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedFeature {
    Rsi,
    Macd,
    Volatility,
    Volume,
    MarketCap,
}

impl TrackedFeature {
    pub const ALL: [TrackedFeature; 5] = [
        TrackedFeature::Rsi,
        TrackedFeature::Macd,
        TrackedFeature::Volatility,
        TrackedFeature::Volume,
        TrackedFeature::MarketCap,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TrackedFeature::Rsi => "rsi",
            TrackedFeature::Macd => "macd",
            TrackedFeature::Volatility => "volatility",
            TrackedFeature::Volume => "volume",
            TrackedFeature::MarketCap => "market_cap",
        }
    }
}

impl fmt::Display for TrackedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalFeatures {
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub macd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFeatures {
    #[serde(default)]
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketFeatures {
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

/// Features observed alongside one prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(default)]
    pub technical: TechnicalFeatures,
    #[serde(default)]
    pub statistical: StatisticalFeatures,
    #[serde(default)]
    pub market: MarketFeatures,
    /// Untracked features, kept with the sample.
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for a tracked feature.
    pub fn with(mut self, feature: TrackedFeature, value: f64) -> Self {
        self.set(feature, Some(value));
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    pub fn get(&self, feature: TrackedFeature) -> Option<f64> {
        match feature {
            TrackedFeature::Rsi => self.technical.rsi,
            TrackedFeature::Macd => self.technical.macd,
            TrackedFeature::Volatility => self.statistical.volatility,
            TrackedFeature::Volume => self.market.volume,
            TrackedFeature::MarketCap => self.market.market_cap,
        }
    }

    pub fn set(&mut self, feature: TrackedFeature, value: Option<f64>) {
        match feature {
            TrackedFeature::Rsi => self.technical.rsi = value,
            TrackedFeature::Macd => self.technical.macd = value,
            TrackedFeature::Volatility => self.statistical.volatility = value,
            TrackedFeature::Volume => self.market.volume = value,
            TrackedFeature::MarketCap => self.market.market_cap = value,
        }
    }

    /// Tracked features present in this set, in `TrackedFeature::ALL` order.
    pub fn tracked(&self) -> impl Iterator<Item = (TrackedFeature, f64)> + '_ {
        TrackedFeature::ALL
            .into_iter()
            .filter_map(move |f| self.get(f).map(|v| (f, v)))
    }

    /// Rejects NaN or infinite values in tracked and extra features.
    pub fn validate(&self) -> Result<(), InputError> {
        for (feature, value) in self.tracked() {
            if !value.is_finite() {
                return Err(InputError::NonFiniteFeature {
                    feature: feature.name().to_string(),
                    value,
                });
            }
        }
        for (name, &value) in &self.extra {
            if !value.is_finite() {
                return Err(InputError::NonFiniteFeature {
                    feature: name.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Fraction of tracked features that are present and finite.
    pub fn completeness(&self) -> f64 {
        let present = self.tracked().filter(|(_, v)| v.is_finite()).count();
        present as f64 / TrackedFeature::ALL.len() as f64
    }
}
