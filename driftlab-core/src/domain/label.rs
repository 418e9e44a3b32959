//! Trading labels, model signals, and the prediction a model emits for one decision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::InputError;

/// Ground-truth label for one decision: sell = 0, hold = 1, buy = 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Sell = 0,
    Hold = 1,
    Buy = 2,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Sell, Label::Hold, Label::Buy];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Label {
    type Error = InputError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Sell),
            1 => Ok(Label::Hold),
            2 => Ok(Label::Buy),
            other => Err(InputError::LabelOutOfRange(other)),
        }
    }
}

/// Categorical trading signal produced by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Map the signal into the same 0/1/2 space as ground-truth labels.
    pub fn label(self) -> Label {
        match self {
            Signal::Sell => Label::Sell,
            Signal::Hold => Label::Hold,
            Signal::Buy => Label::Buy,
        }
    }

    pub fn from_label(label: Label) -> Self {
        match label {
            Label::Sell => Signal::Sell,
            Label::Hold => Signal::Hold,
            Label::Buy => Signal::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Signal::Buy),
            "sell" => Ok(Signal::Sell),
            "hold" => Ok(Signal::Hold),
            _ => Err(InputError::UnknownSignal(s.to_string())),
        }
    }
}

/// A model's output for one decision: the signal and its confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub signal: Signal,
    pub confidence: f64,
}

impl Prediction {
    pub fn new(signal: Signal, confidence: f64) -> Self {
        Self { signal, confidence }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(InputError::InvalidConfidence(self.confidence));
        }
        Ok(())
    }

    /// Whether this prediction matches the ground-truth label.
    pub fn is_correct(&self, actual: Label) -> bool {
        self.signal.label() == actual
    }
}
