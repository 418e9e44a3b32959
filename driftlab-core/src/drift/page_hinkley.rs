//! Page-Hinkley sequential change detector.
//!
//! Tracks the cumulative deviation of each value from an exponentially
//! updated running mean, corrected by a bias term of `alpha / 2`. A change is
//! declared once `|sum|` exceeds `threshold` after `min_instances` samples,
//! and the detector restarts from scratch.

use serde::{Deserialize, Serialize};

use super::StreamDetector;

/// Detector snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageHinkleyStatistics {
    pub sum: f64,
    pub x_mean: f64,
    pub sample_count: u64,
}

#[derive(Debug, Clone)]
pub struct PageHinkley {
    threshold: f64,
    alpha: f64,
    min_instances: u64,
    sum: f64,
    x_mean: f64,
    sample_count: u64,
    /// Cumulative sum on the latest call, kept across the restart that
    /// follows a detection.
    last_sum: f64,
}

impl PageHinkley {
    pub fn new(threshold: f64, alpha: f64, min_instances: u64) -> Self {
        Self {
            threshold,
            alpha,
            min_instances,
            sum: 0.0,
            x_mean: 0.0,
            sample_count: 0,
            last_sum: 0.0,
        }
    }

    pub fn add_element(&mut self, value: f64) -> bool {
        self.sample_count += 1;

        // Bootstrap: the first value seeds the mean.
        if self.sample_count == 1 {
            self.x_mean = value;
            self.last_sum = 0.0;
            return false;
        }

        self.x_mean = self.alpha * self.x_mean + (1.0 - self.alpha) * value;
        self.sum += value - self.x_mean - self.alpha / 2.0;
        self.last_sum = self.sum;

        if self.sample_count >= self.min_instances && self.sum.abs() > self.threshold {
            self.restart();
            return true;
        }
        false
    }

    /// Cumulative sum observed on the most recent `add_element` call.
    pub fn last_sum(&self) -> f64 {
        self.last_sum
    }

    pub fn reset(&mut self) {
        self.restart();
        self.last_sum = 0.0;
    }

    pub fn statistics(&self) -> PageHinkleyStatistics {
        PageHinkleyStatistics {
            sum: self.sum,
            x_mean: self.x_mean,
            sample_count: self.sample_count,
        }
    }

    fn restart(&mut self) {
        self.sum = 0.0;
        self.x_mean = 0.0;
        self.sample_count = 0;
    }
}

impl StreamDetector for PageHinkley {
    fn add_element(&mut self, value: f64) -> bool {
        PageHinkley::add_element(self, value)
    }

    fn reset(&mut self) {
        PageHinkley::reset(self)
    }

    fn len(&self) -> usize {
        self.sample_count as usize
    }
}
