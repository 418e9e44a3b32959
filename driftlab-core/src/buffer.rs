//! Bounded sample store for incremental learning.
//!
//! The admission policy is fixed when the buffer is built:
//! - `Fifo` appends and evicts the oldest sample on overflow.
//! - `Reservoir` appends below capacity; at capacity it draws `j` uniformly
//!   from `[0, len]` and overwrites slot `j` only when `j < len`. The draw
//!   range is the buffer length, not the number of samples seen, so this is
//!   an approximation of uniform reservoir sampling that favours recent data.
//! - `ImportanceWeighted` appends below capacity; at capacity it replaces the
//!   lowest-confidence sample when the newcomer's confidence is strictly
//!   greater.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::{IncrementalDataPoint, Label};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStrategy {
    Fifo,
    Reservoir,
    ImportanceWeighted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub sell: usize,
    pub hold: usize,
    pub buy: usize,
}

impl LabelDistribution {
    fn record(&mut self, label: Label) {
        match label {
            Label::Sell => self.sell += 1,
            Label::Hold => self.hold += 1,
            Label::Buy => self.buy += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferStatistics {
    pub size: usize,
    pub max_size: usize,
    pub strategy: BufferStrategy,
    /// Samples offered over the buffer's lifetime, admitted or not.
    pub total_seen: u64,
    pub avg_confidence: f64,
    pub label_distribution: LabelDistribution,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct IncrementalLearningBuffer {
    points: VecDeque<IncrementalDataPoint>,
    max_size: usize,
    strategy: BufferStrategy,
    rng: StdRng,
    total_seen: u64,
}

impl IncrementalLearningBuffer {
    pub fn new(max_size: usize, strategy: BufferStrategy, rng: StdRng) -> Self {
        Self {
            points: VecDeque::with_capacity(max_size),
            max_size,
            strategy,
            rng,
            total_seen: 0,
        }
    }

    pub fn with_seed(max_size: usize, strategy: BufferStrategy, seed: u64) -> Self {
        Self::new(max_size, strategy, StdRng::seed_from_u64(seed))
    }

    pub fn strategy(&self) -> BufferStrategy {
        self.strategy
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Offer a sample; the admission policy decides whether and where it lands.
    pub fn add(&mut self, point: IncrementalDataPoint) {
        self.total_seen += 1;
        match self.strategy {
            BufferStrategy::Fifo => {
                self.points.push_back(point);
                while self.points.len() > self.max_size {
                    self.points.pop_front();
                }
            }
            BufferStrategy::Reservoir => {
                if self.points.len() < self.max_size {
                    self.points.push_back(point);
                } else {
                    let len = self.points.len();
                    let j = self.rng.gen_range(0..=len);
                    if j < len {
                        self.points[j] = point;
                    }
                }
            }
            BufferStrategy::ImportanceWeighted => {
                if self.points.len() < self.max_size {
                    self.points.push_back(point);
                } else if let Some((idx, min_conf)) = self.lowest_confidence() {
                    if point.confidence > min_conf {
                        self.points[idx] = point;
                    }
                }
            }
        }
    }

    /// Random subset of up to `n` samples. The buffer itself is untouched.
    pub fn batch(&mut self, n: usize) -> Vec<IncrementalDataPoint> {
        let mut copy: Vec<IncrementalDataPoint> = self.points.iter().cloned().collect();
        copy.shuffle(&mut self.rng);
        copy.truncate(n);
        copy
    }

    /// All samples in slot order.
    pub fn all(&self) -> Vec<IncrementalDataPoint> {
        self.points.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn statistics(&self) -> BufferStatistics {
        let mut label_distribution = LabelDistribution::default();
        for point in &self.points {
            label_distribution.record(point.label);
        }
        let avg_confidence = if self.points.is_empty() {
            0.0
        } else {
            self.points.iter().map(|p| p.confidence).sum::<f64>() / self.points.len() as f64
        };
        BufferStatistics {
            size: self.points.len(),
            max_size: self.max_size,
            strategy: self.strategy,
            total_seen: self.total_seen,
            avg_confidence,
            label_distribution,
            oldest: self.points.iter().map(|p| p.timestamp).min(),
            newest: self.points.iter().map(|p| p.timestamp).max(),
        }
    }

    fn lowest_confidence(&self) -> Option<(usize, f64)> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.confidence))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}
