//! # neighbor-bench
//!
//! Benchmark driver for neighbor-node queries on a persistent graph store.
//!
//! ## Usage
//!
//! ```bash
//! # Per-query latency, adjacency scan, 20k warmup / 100k measured
//! neighbor-bench latency graph.redb warmup.txt queries.txt latency.csv
//!
//! # Same with the attribute index and explicit counts
//! neighbor-bench latency-index graph.redb warmup.txt queries.txt latency.csv 1000 5000
//!
//! # Time-bounded throughput
//! neighbor-bench throughput graph.redb warmup.txt queries.txt thput.txt --measure-secs 30
//!
//! # Cross-check both strategies
//! neighbor-bench verify graph.redb warmup.txt queries.txt unused
//! ```

use clap::Parser;
use neighbor_bench::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // NEIGHBOR_BENCH_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("NEIGHBOR_BENCH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "neighbor_bench=info,neighbor_bench_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        "neighbor-bench v{} - scan vs index neighbor lookups",
        env!("CARGO_PKG_VERSION")
    );
}
