//! ADWIN (ADaptive WINdowing) change detector.
//!
//! Keeps every value since the last detected change, bisects the window at
//! its midpoint on each update and compares the two halves' means against a
//! Hoeffding-style bound. Mean and variance are recomputed over the whole
//! window on every call, trading the bucketed O(log n) structure of
//! Bifet & Gavalda (2007) for an O(n) scan.

use serde::{Deserialize, Serialize};

use super::history::{mean, variance};
use super::StreamDetector;

/// Relative slack added to the cut threshold so that rounding in the half
/// means of a constant stream never reads as a change.
const CUT_EPSILON: f64 = 1e-9;

/// Window snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdwinStatistics {
    pub mean: f64,
    pub variance: f64,
    pub width: usize,
}

#[derive(Debug, Clone)]
pub struct Adwin {
    /// Confidence parameter (smaller = fewer false alarms).
    delta: f64,
    min_window_length: usize,
    window: Vec<f64>,
    total: f64,
    variance: f64,
}

impl Adwin {
    pub fn new(delta: f64, min_window_length: usize) -> Self {
        Self {
            delta,
            min_window_length,
            window: Vec::new(),
            total: 0.0,
            variance: 0.0,
        }
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn width(&self) -> usize {
        self.window.len()
    }

    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.total / self.window.len() as f64
        }
    }

    /// Append a value; true iff a change was detected on this call. On a
    /// change the older half of the window is discarded.
    pub fn add_element(&mut self, value: f64) -> bool {
        self.window.push(value);
        self.recompute();

        let width = self.window.len();
        if width < 2 || width < self.min_window_length {
            return false;
        }

        let mid = width / 2;
        let left_mean = mean(&self.window[..mid]);
        let right_mean = mean(&self.window[mid..]);

        let slack = CUT_EPSILON * left_mean.abs().max(right_mean.abs()).max(1.0);
        if (left_mean - right_mean).abs() > self.cut_threshold() + slack {
            self.window.drain(..mid);
            self.recompute();
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.total = 0.0;
        self.variance = 0.0;
    }

    pub fn statistics(&self) -> AdwinStatistics {
        AdwinStatistics {
            mean: self.mean(),
            variance: self.variance,
            width: self.window.len(),
        }
    }

    /// `sqrt(2 ln(2/delta) / width) * sqrt(variance)`.
    fn cut_threshold(&self) -> f64 {
        let width = self.window.len() as f64;
        ((2.0 * (2.0 / self.delta).ln()) / width).sqrt() * self.variance.sqrt()
    }

    fn recompute(&mut self) {
        self.total = self.window.iter().sum();
        self.variance = variance(&self.window);
    }
}

impl StreamDetector for Adwin {
    fn add_element(&mut self, value: f64) -> bool {
        Adwin::add_element(self, value)
    }

    fn reset(&mut self) {
        Adwin::reset(self)
    }

    fn len(&self) -> usize {
        self.width()
    }
}
