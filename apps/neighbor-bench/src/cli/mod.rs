//! # neighbor-bench CLI Module
//!
//! Positional arguments in fixed order:
//!
//! ```text
//! neighbor-bench <mode> <store> <warmup_file> <query_file> <output_file> [warmup_n] [measure_n]
//! ```
//!
//! ## Modes
//!
//! - `latency` - per-query latency, adjacency scan
//! - `latency-index` - per-query latency, attribute index
//! - `throughput` - time-bounded throughput, adjacency scan
//! - `throughput-index` - time-bounded throughput, attribute index
//! - `verify` - check that both strategies agree on the query file
//!
//! Any other mode prints a diagnostic and exits normally.

mod commands;

use clap::{Parser, ValueEnum};
use neighbor_bench_core::{
    BenchError, HarnessConfig, QuerySource, Strategy, ThroughputConfig,
    primitives::DEFAULT_INDEX_TIMEOUT_SECS,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Neighbor-node query latency benchmark
///
/// Times "neighbors of N with name<k> = value" against a persistent graph
/// store, by adjacency scan or by attribute index.
#[derive(Parser, Debug)]
#[command(name = "neighbor-bench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Benchmark mode (latency, latency-index, throughput, throughput-index, verify)
    pub mode: String,

    /// Path to the graph store
    pub store_path: PathBuf,

    /// Warmup query file
    pub warmup_file: PathBuf,

    /// Measurement query file
    pub query_file: PathBuf,

    /// Output file for measurement records
    pub output_file: PathBuf,

    /// Number of warmup queries
    pub warmup_count: Option<u64>,

    /// Number of measured queries
    pub measure_count: Option<u64>,

    /// Number of cooldown queries
    #[arg(long)]
    pub cooldown: Option<u64>,

    /// Measured queries per storage transaction
    #[arg(long)]
    pub window_size: Option<u64>,

    /// Sequence whose queries are resolved while measuring
    #[arg(long, value_enum)]
    pub measure_source: Option<MeasureSourceArg>,

    /// Also write `<output_file>.results` with each recorded answer
    #[arg(long)]
    pub dump_results: bool,

    /// RNG seed for throughput modes
    #[arg(long)]
    pub seed: Option<u64>,

    /// Throughput warmup duration in seconds
    #[arg(long)]
    pub warmup_secs: Option<u64>,

    /// Throughput measurement duration in seconds
    #[arg(long)]
    pub measure_secs: Option<u64>,

    /// Throughput cooldown duration in seconds
    #[arg(long)]
    pub cooldown_secs: Option<u64>,

    /// Seconds to wait for indexes to come online
    #[arg(long)]
    pub index_timeout_secs: Option<u64>,

    /// TOML file with harness and throughput settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output the run report in JSON format
    #[arg(long)]
    pub json_mode: bool,

    /// Suppress banner output
    #[arg(short, long)]
    pub quiet: bool,
}

/// `--measure-source` values.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasureSourceArg {
    Warmup,
    Measurement,
}

impl From<MeasureSourceArg> for QuerySource {
    fn from(arg: MeasureSourceArg) -> Self {
        match arg {
            MeasureSourceArg::Warmup => Self::Warmup,
            MeasureSourceArg::Measurement => Self::Measurement,
        }
    }
}

/// What a mode string selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Latency(Strategy),
    Throughput(Strategy),
    Verify,
}

impl Mode {
    /// `None` for an unsupported mode.
    #[must_use]
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "latency" => Some(Self::Latency(Strategy::Scan)),
            "latency-index" => Some(Self::Latency(Strategy::Indexed)),
            "throughput" => Some(Self::Throughput(Strategy::Scan)),
            "throughput-index" => Some(Self::Throughput(Strategy::Indexed)),
            "verify" => Some(Self::Verify),
            _ => None,
        }
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Contents of the `--config` TOML file. Every section is optional.
///
/// ```toml
/// index_timeout_secs = 30
///
/// [harness]
/// warmup_n = 5000
/// window_size = 1000
/// measure_source = "measurement"
///
/// [throughput]
/// measure_secs = 30
/// seed = 7
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub harness: HarnessConfig,
    pub throughput: ThroughputConfig,
    pub index_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BenchError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| BenchError::Config(format!("'{}': {}", path.display(), e)))
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub harness: HarnessConfig,
    pub throughput: ThroughputConfig,
    pub index_timeout_secs: u64,
}

impl Cli {
    /// Merge command line, config file and defaults, in that order of
    /// precedence.
    pub fn settings(&self) -> Result<RunSettings, BenchError> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let mut harness = file.harness;
        if let Some(n) = self.warmup_count {
            harness.warmup_n = n;
        }
        if let Some(n) = self.measure_count {
            harness.measure_n = n;
        }
        if let Some(n) = self.cooldown {
            harness.cooldown_n = n;
        }
        if let Some(n) = self.window_size {
            harness.window_size = n;
        }
        if let Some(source) = self.measure_source {
            harness.measure_source = source.into();
        }
        harness.validate()?;

        let mut throughput = file.throughput;
        if let Some(secs) = self.warmup_secs {
            throughput.warmup_secs = secs;
        }
        if let Some(secs) = self.measure_secs {
            throughput.measure_secs = secs;
        }
        if let Some(secs) = self.cooldown_secs {
            throughput.cooldown_secs = secs;
        }
        if let Some(seed) = self.seed {
            throughput.seed = seed;
        }

        let index_timeout_secs = self
            .index_timeout_secs
            .or(file.index_timeout_secs)
            .unwrap_or(DEFAULT_INDEX_TIMEOUT_SECS);

        Ok(RunSettings {
            harness,
            throughput,
            index_timeout_secs,
        })
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), BenchError> {
    let Some(mode) = Mode::parse(&cli.mode) else {
        println!("No type {} is supported!", cli.mode);
        return Ok(());
    };

    let settings = cli.settings()?;
    match mode {
        Mode::Latency(strategy) => cmd_latency(&cli, &settings, strategy),
        Mode::Throughput(strategy) => cmd_throughput(&cli, &settings, strategy),
        Mode::Verify => cmd_verify(&cli, &settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["neighbor-bench"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).expect("parse")
    }

    #[test]
    fn positional_order() {
        let cli = parse(&["latency-index", "db", "w.txt", "q.txt", "out.csv", "10", "20"]);
        assert_eq!(cli.mode, "latency-index");
        assert_eq!(cli.store_path, PathBuf::from("db"));
        assert_eq!(cli.output_file, PathBuf::from("out.csv"));
        assert_eq!(cli.warmup_count, Some(10));
        assert_eq!(cli.measure_count, Some(20));
    }

    #[test]
    fn counts_are_optional() {
        let cli = parse(&["latency", "db", "w", "q", "o"]);
        let settings = cli.settings().expect("settings");
        assert_eq!(settings.harness, HarnessConfig::default());
        assert_eq!(settings.index_timeout_secs, DEFAULT_INDEX_TIMEOUT_SECS);
    }

    #[test]
    fn modes() {
        assert_eq!(Mode::parse("latency"), Some(Mode::Latency(Strategy::Scan)));
        assert_eq!(
            Mode::parse("latency-index"),
            Some(Mode::Latency(Strategy::Indexed))
        );
        assert_eq!(
            Mode::parse("throughput-index"),
            Some(Mode::Throughput(Strategy::Indexed))
        );
        assert_eq!(Mode::parse("verify"), Some(Mode::Verify));
        assert_eq!(Mode::parse("LATENCY"), None);
    }

    #[test]
    fn command_line_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        std::io::Write::write_all(
            &mut file,
            b"index_timeout_secs = 3\n\n[harness]\nwarmup_n = 5\nmeasure_n = 6\nwindow_size = 2\n\n[throughput]\nseed = 9\n",
        )
        .expect("write");

        let path = file.path().to_string_lossy().to_string();
        let cli = parse(&[
            "latency",
            "db",
            "w",
            "q",
            "o",
            "50",
            "--config",
            path.as_str(),
            "--seed",
            "11",
            "--measure-source",
            "measurement",
        ]);
        let settings = cli.settings().expect("settings");

        assert_eq!(settings.harness.warmup_n, 50);
        assert_eq!(settings.harness.measure_n, 6);
        assert_eq!(settings.harness.window_size, 2);
        assert_eq!(settings.harness.measure_source, QuerySource::Measurement);
        assert_eq!(settings.harness.cooldown_n, HarnessConfig::default().cooldown_n);
        assert_eq!(settings.throughput.seed, 11);
        assert_eq!(settings.index_timeout_secs, 3);
    }

    #[test]
    fn zero_window_rejected() {
        let cli = parse(&["latency", "db", "w", "q", "o", "--window-size", "0"]);
        assert!(matches!(cli.settings(), Err(BenchError::Config(_))));
    }

    #[test]
    fn unknown_config_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        std::io::Write::write_all(&mut file, b"[harness]\nwarmup = 5\n").expect("write");

        let path = file.path().to_string_lossy().to_string();
        let cli = parse(&["latency", "db", "w", "q", "o", "--config", path.as_str()]);
        assert!(matches!(cli.settings(), Err(BenchError::Config(_))));
    }
}
