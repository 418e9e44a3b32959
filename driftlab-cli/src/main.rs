use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use driftlab_core::drift::DriftMethod;
use driftlab_runner::{
    load_samples, replay_by_symbol, IncrementalLearningConfig, IncrementalLearningSystem,
    RegimeShiftSimulator, ReplayReport, SimulationConfig,
};

#[derive(Parser)]
#[command(name = "driftlab", about = "Concept drift detection and incremental adaptation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the regime-shift simulator through a learning system
    Simulate {
        /// Samples per regime (calm, then volatile)
        #[arg(long, default_value_t = 300)]
        samples: usize,

        /// Simulator seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Drift detection method (overrides the config file)
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        /// Learning system config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write one JSON line per processed sample to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a CSV or JSONL sample file, one system per symbol
    Replay {
        /// Sample file (.csv, .jsonl or .ndjson)
        path: PathBuf,

        /// Learning system config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the full reports as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Print the default configuration as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Adwin,
    Ddm,
    Eddm,
    PageHinkley,
    Kswin,
}

impl From<MethodArg> for DriftMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Adwin => DriftMethod::Adwin,
            MethodArg::Ddm => DriftMethod::Ddm,
            MethodArg::Eddm => DriftMethod::Eddm,
            MethodArg::PageHinkley => DriftMethod::PageHinkley,
            MethodArg::Kswin => DriftMethod::Kswin,
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            samples,
            seed,
            method,
            config,
            output,
        } => run_simulate(samples, seed, method, config, output),
        Commands::Replay { path, config, json } => run_replay(&path, config, json),
        Commands::Config => run_config(),
    }
}

fn load_config(path: Option<&Path>) -> Result<IncrementalLearningConfig> {
    match path {
        Some(p) => IncrementalLearningConfig::from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(IncrementalLearningConfig::default()),
    }
}

fn run_simulate(
    samples: usize,
    seed: u64,
    method: Option<MethodArg>,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    if samples == 0 {
        bail!("--samples must be at least 1");
    }

    let mut config = load_config(config_path.as_deref())?;
    if let Some(m) = method {
        config.drift_detection.method = m.into();
    }

    let mut sim_config = SimulationConfig {
        seed,
        ..SimulationConfig::default()
    };
    for regime in &mut sim_config.regimes {
        regime.samples = samples;
    }
    let boundaries = sim_config.boundaries();
    let symbol = sim_config.symbol.clone();

    let simulator = RegimeShiftSimulator::new(sim_config)?;
    let mut system = IncrementalLearningSystem::new(config)?;

    let mut writer = match &output {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => None,
    };

    let mut drift_indices = Vec::new();
    let mut completed = 0u64;
    for (index, record) in simulator.enumerate() {
        let outcome = system.process_data_point_at(
            record.features.clone(),
            record.prediction(),
            record.actual_label,
            record.metadata(),
            record.timestamp,
        )?;

        if outcome.drift_result.is_drift {
            drift_indices.push(index);
        }
        if outcome.adaptation.is_completed() {
            completed += 1;
        }

        if let Some(w) = writer.as_mut() {
            let line = serde_json::json!({
                "index": index,
                "timestamp": record.timestamp,
                "regime": record.market_condition,
                "outcome": outcome,
            });
            serde_json::to_writer(&mut *w, &line)?;
            w.write_all(b"\n")?;
        }
    }
    if let Some(mut w) = writer {
        w.flush()?;
    }

    let status = system.system_status();
    let perf = &status.performance;
    println!("=== Simulation: {symbol} ===");
    println!("Method:          {}", status.drift_method.as_str());
    println!("Samples:         {}", status.total_samples);
    println!("Regime starts:   {boundaries:?}");
    println!("Drifts:          {} at {:?}", drift_indices.len(), drift_indices);
    if let Some(&boundary) = boundaries.first() {
        if let Some(first_after) = drift_indices.iter().find(|&&i| i >= boundary) {
            println!("Detection delay: {} samples", first_after - boundary);
        }
    }
    println!("Adaptations:     {completed} completed, {} retrains", perf.retrainings);
    println!("Accuracy (EMA):  {:.4}", perf.accuracy);
    println!("Loss (EMA):      {:.4}", perf.loss);
    println!(
        "Buffer:          {}/{}",
        status.buffer_size, status.buffer_capacity
    );
    println!(
        "Selection:       {:?} = {:.4}",
        status.selection_metric, status.selection_score
    );
    if let Some(path) = output {
        println!("Outcomes written to: {}", path.display());
    }

    Ok(())
}

fn run_replay(path: &Path, config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let records = load_samples(path)?;
    if records.is_empty() {
        bail!("no samples in {}", path.display());
    }

    let reports = replay_by_symbol(records, &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }
    Ok(())
}

fn print_report(report: &ReplayReport) {
    println!("=== {} ===", report.symbol);
    if let (Some(first), Some(last)) = (report.first_timestamp, report.last_timestamp) {
        println!("Period:      {} .. {}", first.to_rfc3339(), last.to_rfc3339());
    }
    println!(
        "Samples:     {} ({} rejected)",
        report.samples, report.rejected
    );
    println!("Drifts:      {}", report.drifts);
    let a = &report.adaptations;
    println!(
        "Adaptations: {} completed, {} skipped, {} failed, {} busy",
        a.completed, a.skipped, a.failed, a.already_adapting
    );
    println!(
        "Accuracy:    {:.4}  F1: {:.4}  Loss: {:.4}",
        report.metrics.accuracy, report.metrics.f1_score, report.metrics.loss
    );
    println!(
        "Buffer:      {}/{}",
        report.status.buffer_size, report.status.buffer_capacity
    );
    println!();
}

fn run_config() -> Result<()> {
    print!("{}", IncrementalLearningConfig::default().to_toml()?);
    Ok(())
}
