//! Synthetic sample stream with abrupt regime shifts.
//!
//! Each regime fixes the model's hit rate, its typical confidence and the
//! feature distribution. Crossing a regime boundary changes all three at
//! once, which is what the drift detectors are meant to notice.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use driftlab_core::domain::{FeatureSet, Label, Signal, TrackedFeature};

use crate::replay::SampleRecord;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("simulation needs at least one regime")]
    NoRegimes,
    #[error("regime {index}: {field} must be in [0, 1], got {value}")]
    OutOfRange {
        index: usize,
        field: &'static str,
        value: f64,
    },
    #[error("step_seconds must be positive, got {0}")]
    Step(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    pub name: String,
    pub samples: usize,
    /// Probability that the model's signal matches the label.
    pub accuracy: f64,
    /// Centre of the reported confidence.
    pub confidence: f64,
    pub rsi: f64,
    pub volatility: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub step_seconds: i64,
    pub seed: u64,
    pub regimes: Vec<Regime>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            symbol: "SIM".to_string(),
            // 2024-01-02 14:30 UTC
            start: DateTime::<Utc>::default() + Duration::seconds(1_704_205_800),
            step_seconds: 60,
            seed: 42,
            regimes: vec![
                Regime {
                    name: "calm".to_string(),
                    samples: 300,
                    accuracy: 0.8,
                    confidence: 0.75,
                    rsi: 45.0,
                    volatility: 0.015,
                    volume: 1_000_000.0,
                },
                Regime {
                    name: "volatile".to_string(),
                    samples: 300,
                    accuracy: 0.45,
                    confidence: 0.6,
                    rsi: 70.0,
                    volatility: 0.045,
                    volume: 2_500_000.0,
                },
            ],
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.regimes.is_empty() {
            return Err(SimulationError::NoRegimes);
        }
        if self.step_seconds <= 0 {
            return Err(SimulationError::Step(self.step_seconds));
        }
        for (index, regime) in self.regimes.iter().enumerate() {
            for (field, value) in [("accuracy", regime.accuracy), ("confidence", regime.confidence)] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(SimulationError::OutOfRange {
                        index,
                        field,
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn total_samples(&self) -> usize {
        self.regimes.iter().map(|r| r.samples).sum()
    }

    /// Sample index at which each regime after the first begins.
    pub fn boundaries(&self) -> Vec<usize> {
        self.regimes
            .iter()
            .scan(0, |start, r| {
                *start += r.samples;
                Some(*start)
            })
            .take(self.regimes.len().saturating_sub(1))
            .collect()
    }
}

/// Iterator over simulated samples, regime by regime.
#[derive(Debug, Clone)]
pub struct RegimeShiftSimulator {
    config: SimulationConfig,
    rng: StdRng,
    regime: usize,
    in_regime: usize,
    emitted: usize,
}

impl RegimeShiftSimulator {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            rng,
            regime: 0,
            in_regime: 0,
            emitted: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn draw(&mut self, regime: &Regime) -> SampleRecord {
        let actual = *Label::ALL.choose(&mut self.rng).unwrap_or(&Label::Hold);
        let signal = if self.rng.gen_bool(regime.accuracy) {
            Signal::from_label(actual)
        } else {
            let wrong: Vec<Label> = Label::ALL.into_iter().filter(|l| *l != actual).collect();
            Signal::from_label(*wrong.choose(&mut self.rng).unwrap_or(&actual))
        };
        let confidence = (regime.confidence + self.rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0);

        let features = FeatureSet::new()
            .with(TrackedFeature::Rsi, regime.rsi + self.rng.gen_range(-5.0..5.0))
            .with(
                TrackedFeature::Macd,
                self.rng.gen_range(-1.0..1.0) * regime.volatility * 10.0,
            )
            .with(
                TrackedFeature::Volatility,
                regime.volatility * self.rng.gen_range(0.8..1.2),
            )
            .with(
                TrackedFeature::Volume,
                regime.volume * self.rng.gen_range(0.7..1.3),
            )
            .with(TrackedFeature::MarketCap, 5.0e10);

        let timestamp =
            self.config.start + Duration::seconds(self.config.step_seconds * self.emitted as i64);

        SampleRecord {
            timestamp,
            symbol: self.config.symbol.clone(),
            source: "simulator".to_string(),
            market_condition: Some(regime.name.clone()),
            signal,
            confidence,
            actual_label: actual.as_u8(),
            features,
        }
    }
}

impl Iterator for RegimeShiftSimulator {
    type Item = SampleRecord;

    fn next(&mut self) -> Option<SampleRecord> {
        while self.in_regime >= self.config.regimes.get(self.regime)?.samples {
            self.regime += 1;
            self.in_regime = 0;
        }
        let regime = self.config.regimes[self.regime].clone();
        let record = self.draw(&regime);
        self.in_regime += 1;
        self.emitted += 1;
        Some(record)
    }
}
