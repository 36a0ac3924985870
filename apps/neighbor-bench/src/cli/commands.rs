//! CLI command implementations.

use super::{Cli, RunSettings};
use neighbor_bench_core::{
    BenchError, GraphStore, HarnessReport, LatencyHarness, QuerySequence, RedbStore, ResultDump,
    ResultSink, RunOutput, Strategy, ThroughputHarness, ThroughputReport, VerifyReport, load,
    verify_strategies,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// HELPERS
// =============================================================================

/// Load both query files. Any malformed line aborts before the store opens.
fn load_queries(cli: &Cli) -> Result<(QuerySequence, QuerySequence), BenchError> {
    let warmup = load(&cli.warmup_file)?;
    let measurement = load(&cli.query_file)?;
    tracing::info!(
        warmup = warmup.len(),
        measurement = measurement.len(),
        "Loaded query files"
    );
    Ok((warmup, measurement))
}

/// Open the store and wait for its indexes.
fn open_store(path: &Path, index_timeout_secs: u64) -> Result<RedbStore, BenchError> {
    let store = RedbStore::open(path)?;
    store.await_indexes(Duration::from_secs(index_timeout_secs))?;
    Ok(store)
}

/// Path of the `--dump-results` file next to the output file.
#[must_use]
pub fn results_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".results");
    PathBuf::from(name)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, BenchError> {
    serde_json::to_string_pretty(value).map_err(|e| BenchError::Serialization(e.to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), BenchError> {
    println!("{}", to_json(value)?);
    Ok(())
}

// =============================================================================
// LATENCY COMMAND
// =============================================================================

/// Run the count-bounded latency harness and write `<count>,<micros>` lines.
pub fn cmd_latency(
    cli: &Cli,
    settings: &RunSettings,
    strategy: Strategy,
) -> Result<(), BenchError> {
    let (warmup, measurement) = load_queries(cli)?;
    let harness = LatencyHarness::new(settings.harness.clone(), strategy)?;
    let store = open_store(&cli.store_path, settings.index_timeout_secs)?;

    let dump_path = cli.dump_results.then(|| results_path(&cli.output_file));
    let result = harness.run(&store, &warmup, &measurement, || {
        let sink = ResultSink::create(&cli.output_file)?;
        let dump = match &dump_path {
            Some(path) => Some(ResultDump::create(path)?),
            None => None,
        };
        Ok(RunOutput { sink, dump })
    });

    // Released on both paths before the outcome is reported.
    store.shutdown();
    let report = result?;

    if cli.json_mode {
        print_json(&report)?;
    } else {
        print_latency_report(&report, &cli.output_file);
    }
    Ok(())
}

fn print_latency_report(report: &HarnessReport, output: &Path) {
    println!("Latency Report ({})", report.strategy);
    println!("==============");
    println!("Output:      {}", output.display());
    println!("Warmup:      {} queries", report.warmup_queries);
    println!("Measured:    {} queries", report.measured_queries);
    println!("Recorded:    {}", report.recorded);
    println!("Skipped:     {}", report.skipped);
    println!("Cooldown:    {} queries", report.cooldown_queries);
    println!("Windows:     {}", report.windows.len());
    println!();
    println!("Latency:     {}", report.latency);
}

// =============================================================================
// THROUGHPUT COMMAND
// =============================================================================

/// Run the time-bounded throughput harness and append its result line.
pub fn cmd_throughput(
    cli: &Cli,
    settings: &RunSettings,
    strategy: Strategy,
) -> Result<(), BenchError> {
    let (warmup, measurement) = load_queries(cli)?;
    let harness = ThroughputHarness::new(settings.throughput.clone(), strategy);
    let store = open_store(&cli.store_path, settings.index_timeout_secs)?;

    let result = harness.run(&store, &warmup, &measurement);
    store.shutdown();
    let report = result?;
    report.append_to(&cli.output_file)?;

    if cli.json_mode {
        print_json(&report)?;
    } else {
        print_throughput_report(&report);
    }
    Ok(())
}

fn print_throughput_report(report: &ThroughputReport) {
    println!("Throughput Report ({})", report.strategy);
    println!("=================");
    println!("Queries:       {}", report.queries);
    println!("Empty results: {}", report.empty_results);
    println!("Queries/sec:   {}", report.queries_per_sec);
    println!("Neighbors/sec: {}", report.neighbors_per_sec);
}

// =============================================================================
// VERIFY COMMAND
// =============================================================================

/// Check both strategies against each other on the measurement file.
pub fn cmd_verify(cli: &Cli, settings: &RunSettings) -> Result<(), BenchError> {
    let (_, measurement) = load_queries(cli)?;
    let store = open_store(&cli.store_path, settings.index_timeout_secs)?;

    let result = verify_strategies(&store, &measurement);
    store.shutdown();
    let report = result?;

    if cli.json_mode {
        print_json(&report)?;
    } else {
        print_verify_report(&report);
    }

    if !report.is_consistent() {
        return Err(BenchError::StrategyMismatch(report.mismatches.len()));
    }
    Ok(())
}

fn print_verify_report(report: &VerifyReport) {
    println!("Verify Report");
    println!("=============");
    println!("Checked:    {}", report.checked);
    println!("Empty:      {}", report.empty);
    println!("Mismatches: {}", report.mismatches.len());
    for mismatch in &report.mismatches {
        println!(
            "  #{} {}: scan {} vs indexed {}",
            mismatch.index,
            mismatch.query,
            mismatch.scan.len(),
            mismatch.indexed.len()
        );
    }
}
