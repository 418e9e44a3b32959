//! Replay recorded samples through incremental learning systems.
//!
//! Samples are read from CSV (flat columns) or JSON Lines, grouped by
//! symbol, and each symbol is replayed through its own system on the rayon
//! pool. Systems share nothing, so the per-symbol reports are identical to
//! a sequential run.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use driftlab_core::buffer::BufferStatistics;
use driftlab_core::domain::{FeatureSet, Prediction, SampleMetadata, Signal, TrackedFeature};
use driftlab_core::rng::RngHierarchy;

use crate::adaptation::AdaptationStatus;
use crate::config::{ConfigError, IncrementalLearningConfig};
use crate::metrics::PerformanceMetrics;
use crate::system::{IncrementalLearningSystem, SystemStatus};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path}:{line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: unknown signal '{value}' on row {row}")]
    Signal {
        path: PathBuf,
        row: usize,
        value: String,
    },
    #[error("unsupported sample file extension: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

// ─── Records ─────────────────────────────────────────────────────────

/// One recorded prediction with its eventual outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub market_condition: Option<String>,
    pub signal: Signal,
    pub confidence: f64,
    pub actual_label: u8,
    #[serde(default)]
    pub features: FeatureSet,
}

impl SampleRecord {
    pub fn prediction(&self) -> Prediction {
        Prediction::new(self.signal, self.confidence)
    }

    pub fn metadata(&self) -> SampleMetadata {
        SampleMetadata {
            symbol: self.symbol.clone(),
            source: self.source.clone(),
            market_condition: self.market_condition.clone(),
        }
    }
}

/// Flat CSV layout; empty feature cells mean the feature is absent.
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: DateTime<Utc>,
    symbol: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    market_condition: Option<String>,
    signal: String,
    confidence: f64,
    actual_label: u8,
    rsi: Option<f64>,
    macd: Option<f64>,
    volatility: Option<f64>,
    volume: Option<f64>,
    market_cap: Option<f64>,
}

impl CsvRow {
    fn into_record(self, path: &Path, row: usize) -> Result<SampleRecord, ReplayError> {
        let signal = self.signal.parse::<Signal>().map_err(|_| ReplayError::Signal {
            path: path.to_path_buf(),
            row,
            value: self.signal.clone(),
        })?;
        let mut features = FeatureSet::new();
        features.set(TrackedFeature::Rsi, self.rsi);
        features.set(TrackedFeature::Macd, self.macd);
        features.set(TrackedFeature::Volatility, self.volatility);
        features.set(TrackedFeature::Volume, self.volume);
        features.set(TrackedFeature::MarketCap, self.market_cap);
        Ok(SampleRecord {
            timestamp: self.timestamp,
            symbol: self.symbol,
            source: self.source.unwrap_or_default(),
            market_condition: self.market_condition,
            signal,
            confidence: self.confidence,
            actual_label: self.actual_label,
            features,
        })
    }
}

// ─── Loading ─────────────────────────────────────────────────────────

pub fn load_csv(path: &Path) -> Result<Vec<SampleRecord>, ReplayError> {
    let csv_err = |source| ReplayError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(csv_err)?;
        // Header is line 1.
        records.push(row.into_record(path, i + 2)?);
    }
    Ok(records)
}

pub fn load_jsonl(path: &Path) -> Result<Vec<SampleRecord>, ReplayError> {
    let file = File::open(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| ReplayError::Json {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Load by extension: `.csv`, or `.jsonl` / `.ndjson`.
pub fn load_samples(path: &Path) -> Result<Vec<SampleRecord>, ReplayError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("csv") => load_csv(path),
        Some("jsonl") | Some("ndjson") => load_jsonl(path),
        _ => Err(ReplayError::UnsupportedFormat(path.to_path_buf())),
    }
}

// ─── Replay ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationTally {
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub already_adapting: u64,
}

impl AdaptationTally {
    fn record(&mut self, status: &AdaptationStatus) {
        match status {
            AdaptationStatus::NotTriggered => {}
            AdaptationStatus::Completed(_) => self.completed += 1,
            AdaptationStatus::Skipped { .. } => self.skipped += 1,
            AdaptationStatus::Failed { .. } => self.failed += 1,
            AdaptationStatus::AlreadyAdapting => self.already_adapting += 1,
        }
    }
}

/// Outcome of replaying one symbol's samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub symbol: String,
    pub samples: u64,
    /// Records the system refused (bad label, confidence or features).
    pub rejected: u64,
    pub drifts: u64,
    pub adaptations: AdaptationTally,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub metrics: PerformanceMetrics,
    pub buffer: BufferStatistics,
    pub status: SystemStatus,
}

/// Replay every symbol through its own system, in parallel. Each symbol's
/// seed is derived from `config.seed` and the symbol name; records are
/// replayed in timestamp order. Reports come back sorted by symbol.
pub fn replay_by_symbol(
    records: Vec<SampleRecord>,
    config: &IncrementalLearningConfig,
) -> Result<Vec<ReplayReport>, ReplayError> {
    config.validate()?;

    let mut groups: BTreeMap<String, Vec<SampleRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.symbol.clone()).or_default().push(record);
    }
    info!(symbols = groups.len(), "replaying samples");

    let seeds = RngHierarchy::new(config.seed);
    let reports: Result<Vec<ReplayReport>, ConfigError> = groups
        .into_par_iter()
        .map(|(symbol, records)| {
            let mut symbol_config = config.clone();
            symbol_config.seed = seeds.sub_seed(&symbol, 0);
            replay_symbol(symbol, records, symbol_config)
        })
        .collect();
    Ok(reports?)
}

/// Replay one symbol's records in timestamp order.
pub fn replay_symbol(
    symbol: String,
    mut records: Vec<SampleRecord>,
    config: IncrementalLearningConfig,
) -> Result<ReplayReport, ConfigError> {
    records.sort_by_key(|r| r.timestamp);
    let mut system = IncrementalLearningSystem::new(config)?;

    let mut samples = 0;
    let mut rejected = 0;
    let mut drifts = 0;
    let mut adaptations = AdaptationTally::default();

    for record in &records {
        let outcome = system.process_data_point_at(
            record.features.clone(),
            record.prediction(),
            record.actual_label,
            record.metadata(),
            record.timestamp,
        );
        match outcome {
            Ok(outcome) => {
                samples += 1;
                if outcome.drift_result.is_drift {
                    drifts += 1;
                }
                adaptations.record(&outcome.adaptation);
            }
            Err(e) => {
                rejected += 1;
                debug!(error = %e, "record rejected");
            }
        }
    }

    Ok(ReplayReport {
        symbol,
        samples,
        rejected,
        drifts,
        adaptations,
        first_timestamp: records.first().map(|r| r.timestamp),
        last_timestamp: records.last().map(|r| r.timestamp),
        metrics: system.performance_metrics(),
        buffer: system.buffer_statistics(),
        status: system.system_status(),
    })
}
