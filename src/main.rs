//! CLI Entry Point for qlab
//!
//! Provides command-line access to:
//! - Sweep files (inspect metadata, load and reshape a data column)
//! - SSB mixer calibration against the simulated bench
//! - The calibration results log
//!
//! # Usage
//!
//! ```bash
//! qlab inspect data/2024-05-01/resonator_scan
//! qlab column data/2024-05-01/resonator_scan 0 --csv column0.csv
//! qlab calibrate --config config/qlab.toml --history dc_history.csv
//! qlab latest
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qlab::config::{LabConfig, DEFAULT_CONFIG_PATH};
use qlab::data::{OuterAxisOrder, SweepTable};
use qlab::hardware::simulated_bench;
use qlab::logging::{self, OutputFormat, TracingConfig};
use qlab::procedures::{CalibrationLog, CalibrationRecord, SsbCalibration};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "qlab")]
#[command(about = "Sweep-file and mixer calibration tooling", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Compact)]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the geometry of the sweep stored in a directory
    Inspect {
        /// Directory holding one .dat and one .meta.txt file
        dir: PathBuf,

        /// Field order of the outer-axis block
        #[arg(long, value_enum, default_value_t = OuterAxisOrder::LastFirst)]
        outer_order: OuterAxisOrder,
    },

    /// Load one data column, reshaped to (outer, inner)
    Column {
        /// Sweep directory
        dir: PathBuf,

        /// Zero-based data column (file column index + 2)
        index: usize,

        /// Field order of the outer-axis block
        #[arg(long, value_enum, default_value_t = OuterAxisOrder::LastFirst)]
        outer_order: OuterAxisOrder,

        /// Write the reshaped column as CSV instead of printing it
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Run SSB calibration on the simulated bench and log the result
    Calibrate {
        /// Write the final DC stage samples to this CSV file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Do not append to the calibration log
        #[arg(long)]
        no_log: bool,
    },

    /// Print the most recent logged calibration
    Latest,

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LabConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let level = logging::parse_log_level(&config.application.log_level)?;
    logging::init(TracingConfig::new(level).with_format(cli.log_format))?;
    config.validate()?;

    match cli.command {
        Commands::Inspect { dir, outer_order } => inspect(&dir, outer_order),
        Commands::Column {
            dir,
            index,
            outer_order,
            csv,
        } => column(&dir, index, outer_order, csv.as_deref()),
        Commands::Calibrate { history, no_log } => calibrate(&config, history.as_deref(), no_log),
        Commands::Latest => latest(&config),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn inspect(dir: &Path, order: OuterAxisOrder) -> Result<()> {
    let table = SweepTable::open_with(dir, order)?;
    let meta = table.metadata();

    println!("table:        {}", table.table_path().display());
    println!("metadata:     {}", table.meta_path().display());
    println!("dimensions:   {}", meta.dimensionality());
    let inner = meta.inner();
    println!(
        "inner axis:   {} ({} points, {} .. {})",
        inner.name(),
        inner.point_count(),
        inner.first_value(),
        inner.last_value()
    );
    if let Some(outer) = meta.outer() {
        println!(
            "outer axis:   {} ({} points, {} .. {})",
            outer.name(),
            outer.point_count(),
            outer.first_value(),
            outer.last_value()
        );
    }
    println!("data columns: {}", table.num_data_columns());
    Ok(())
}

fn column(dir: &Path, index: usize, order: OuterAxisOrder, output: Option<&Path>) -> Result<()> {
    let table = SweepTable::open_with(dir, order)?;
    let data = table.read_column(index)?;

    match output {
        Some(path) => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("creating {}", path.display()))?;
            for row in data.rows() {
                writer.write_record(row.iter().map(f64::to_string))?;
            }
            writer.flush()?;
            tracing::info!(
                path = %path.display(),
                rows = data.nrows(),
                columns = data.ncols(),
                "Column written"
            );
        }
        None => println!("{data}"),
    }
    Ok(())
}

fn calibrate(config: &LabConfig, history: Option<&Path>, no_log: bool) -> Result<()> {
    let (mut modulator, mut analyzer) = simulated_bench(config.simulation.clone());
    let calibration = SsbCalibration::new(config.calibration.clone());
    let outcome = calibration.run(&mut modulator, &mut analyzer)?;

    println!(
        "dc offsets:  I = {:.6} V, Q = {:.6} V",
        outcome.dc_offsets.0, outcome.dc_offsets.1
    );
    println!("phase:       {:.6} rad", outcome.phase);
    println!(
        "amplitudes:  I = {:.6}, Q = {:.6}",
        outcome.amplitudes.0, outcome.amplitudes.1
    );
    println!("carrier:     {:.2} dBm", outcome.carrier_dbm);
    println!(
        "sidebands:   lower {:.2} dBm, upper {:.2} dBm ({:.2} dB rejection)",
        outcome.powers.lower_dbm,
        outcome.powers.upper_dbm,
        outcome.rejection_db()
    );
    println!("evaluations: {}", outcome.evaluations);

    if let Some(path) = history {
        outcome.dc_search.save_history_csv(path, &["dc_i", "dc_q"])?;
        tracing::info!(path = %path.display(), "DC history written");
    }

    if !no_log {
        let record = CalibrationRecord::from_outcome(
            &outcome,
            config.calibration.lo_frequency_hz,
            config.calibration.if_frequency_hz,
        );
        CalibrationLog::new(&config.storage.calibration_log).append(&record)?;
    }
    Ok(())
}

fn latest(config: &LabConfig) -> Result<()> {
    let log = CalibrationLog::new(&config.storage.calibration_log);
    match log.latest()? {
        Some(record) => {
            println!("{}", record.timestamp.to_rfc3339());
            println!(
                "LO {} Hz, IF {} Hz, {} sideband",
                record.lo_frequency_hz, record.if_frequency_hz, record.sideband
            );
            println!("dc offsets:  I = {}, Q = {}", record.dc_i, record.dc_q);
            println!("phase:       {}", record.phase);
            println!(
                "amplitudes:  I = {}, Q = {}",
                record.amplitude_i, record.amplitude_q
            );
            println!("rejection:   {:.2} dB", record.rejection_db());
        }
        None => println!("no calibrations logged in {}", log.path().display()),
    }
    Ok(())
}
