//! # Throughput Harness
//!
//! Time-bounded variant of the latency run for the `throughput` and
//! `throughput-index` modes. Phases run for a fixed number of seconds
//! instead of a fixed number of queries:
//!
//! - warmup: random queries from the warmup sequence
//! - measurement: random queries from the measurement sequence, counting
//!   queries and returned neighbors over the phase's wall-clock length
//! - cooldown: sequential queries starting at the last measured index
//!
//! Random picks come from a seeded `ChaCha8Rng`, so two runs with the same
//! seed issue the same query order. Empty results are counted, not fatal.

use crate::graph::GraphStore;
use crate::harness::TransactionWindow;
use crate::loader::QuerySequence;
use crate::primitives::{
    DEFAULT_COOLDOWN_SECS, DEFAULT_MEASURE_SECS, DEFAULT_SEED, DEFAULT_WARMUP_SECS,
};
use crate::resolver::{NeighborResolver, Strategy};
use crate::{BenchError, QuerySpec};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Phase durations and RNG seed for a throughput run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThroughputConfig {
    pub warmup_secs: u64,
    pub measure_secs: u64,
    pub cooldown_secs: u64,
    pub seed: u64,
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            warmup_secs: DEFAULT_WARMUP_SECS,
            measure_secs: DEFAULT_MEASURE_SECS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            seed: DEFAULT_SEED,
        }
    }
}

/// Outcome of a throughput run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughputReport {
    pub strategy: Strategy,
    pub warmup_queries: u64,
    /// Queries completed during measurement.
    pub queries: u64,
    /// Neighbors returned across all measured queries.
    pub neighbors: u64,
    /// Measured queries that returned nothing.
    pub empty_results: u64,
    /// Wall-clock length of the measurement phase.
    pub elapsed_micros: u64,
    pub queries_per_sec: u64,
    pub neighbors_per_sec: u64,
    pub cooldown_queries: u64,
}

impl ThroughputReport {
    /// Append `"<queries_per_sec> <neighbors_per_sec>"` to `path`.
    pub fn append_to(&self, path: impl AsRef<Path>) -> Result<(), BenchError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| BenchError::Io(format!("Open '{}': {}", path.display(), e)))?;
        writeln!(file, "{} {}", self.queries_per_sec, self.neighbors_per_sec)?;
        Ok(())
    }
}

/// Integer rate of `count` events over `micros`. Zero when nothing was timed.
fn per_second(count: u64, micros: u64) -> u64 {
    if micros == 0 {
        return 0;
    }
    ((count as u128 * 1_000_000) / micros as u128) as u64
}

/// Uniform random query selection that remembers the last pick.
#[derive(Debug)]
struct QueryPicker {
    rng: ChaCha8Rng,
    last: usize,
}

impl QueryPicker {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            last: 0,
        }
    }

    fn pick<'q>(&mut self, sequence: &'q QuerySequence) -> Option<&'q QuerySpec> {
        if sequence.is_empty() {
            return None;
        }
        self.last = self.rng.gen_range(0..sequence.len());
        sequence.as_slice().get(self.last)
    }
}

/// Time-bounded warmup / measurement / cooldown driver.
pub struct ThroughputHarness {
    config: ThroughputConfig,
    strategy: Strategy,
    resolver: Box<dyn NeighborResolver>,
}

impl std::fmt::Debug for ThroughputHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThroughputHarness")
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl ThroughputHarness {
    #[must_use]
    pub fn new(config: ThroughputConfig, strategy: Strategy) -> Self {
        Self {
            config,
            strategy,
            resolver: strategy.resolver(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ThroughputConfig {
        &self.config
    }

    /// Run all three phases against `store`.
    pub fn run<S: GraphStore>(
        &self,
        store: &S,
        warmup: &QuerySequence,
        measurement: &QuerySequence,
    ) -> Result<ThroughputReport, BenchError> {
        if self.config.warmup_secs > 0 && warmup.is_empty() {
            return Err(BenchError::EmptyQuerySequence("warmup"));
        }
        if measurement.is_empty() {
            return Err(BenchError::EmptyQuerySequence("measurement"));
        }

        let mut picker = QueryPicker::new(self.config.seed);

        tracing::info!(strategy = %self.strategy, "Warming up for {}s", self.config.warmup_secs);
        let mut window = TransactionWindow::new(store.begin()?, 0);
        let deadline = Duration::from_secs(self.config.warmup_secs);
        let started = Instant::now();
        while started.elapsed() < deadline {
            let query = picker
                .pick(warmup)
                .ok_or(BenchError::EmptyQuerySequence("warmup"))?;
            self.resolver.resolve(window.view()?, query)?;
            window.note_query();
        }
        let warmup_queries = window.commit()?.queries;

        tracing::info!("Measuring throughput for {}s", self.config.measure_secs);
        let mut window = TransactionWindow::new(store.begin()?, 0);
        let mut neighbors = 0u64;
        let mut empty_results = 0u64;
        let deadline = Duration::from_secs(self.config.measure_secs);
        let started = Instant::now();
        while started.elapsed() < deadline {
            let query = picker
                .pick(measurement)
                .ok_or(BenchError::EmptyQuerySequence("measurement"))?;
            let result = self.resolver.resolve(window.view()?, query)?;
            window.note_query();

            if result.is_empty() {
                empty_results += 1;
            }
            neighbors = neighbors.saturating_add(result.len() as u64);
        }
        let elapsed_micros = started.elapsed().as_micros() as u64;
        let queries = window.commit()?.queries;

        let cooldown_queries = self.cooldown(store, measurement, picker.last)?;

        let report = ThroughputReport {
            strategy: self.strategy,
            warmup_queries,
            queries,
            neighbors,
            empty_results,
            elapsed_micros,
            queries_per_sec: per_second(queries, elapsed_micros),
            neighbors_per_sec: per_second(neighbors, elapsed_micros),
            cooldown_queries,
        };
        tracing::info!(
            queries = report.queries,
            queries_per_sec = report.queries_per_sec,
            neighbors_per_sec = report.neighbors_per_sec,
            "Throughput measured"
        );
        Ok(report)
    }

    /// Sequential queries from `last` onwards, wrapping through `measurement`.
    fn cooldown<S: GraphStore>(
        &self,
        store: &S,
        measurement: &QuerySequence,
        last: usize,
    ) -> Result<u64, BenchError> {
        if self.config.cooldown_secs == 0 {
            return Ok(0);
        }

        tracing::info!("Cooling down for {}s", self.config.cooldown_secs);
        let mut window = TransactionWindow::new(store.begin()?, 0);
        let deadline = Duration::from_secs(self.config.cooldown_secs);
        let started = Instant::now();
        let mut next = last as u64;
        while started.elapsed() < deadline {
            let query = measurement
                .cyclic(next)
                .ok_or(BenchError::EmptyQuerySequence("measurement"))?;
            self.resolver.resolve(window.view()?, query)?;
            window.note_query();
            next = next.wrapping_add(1);
        }
        Ok(window.commit()?.queries)
    }
}
