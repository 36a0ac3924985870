//! # Latency Harness
//!
//! Drives one resolver through three sequential phases, never re-entered:
//!
//! 1. **Warmup**: `warmup_n` untimed queries. An empty result here is fatal;
//!    it means the query set is unusable, and the run stops before any
//!    output file exists.
//! 2. **Measurement**: `measure_n` timed queries, grouped into transaction
//!    windows of `window_size`. Each non-empty result is streamed to the
//!    `ResultSink` at once; an empty result is logged and skipped.
//! 3. **Cooldown**: `cooldown_n` untimed, unchecked queries continuing the
//!    measurement index in a window of their own.
//!
//! Query `i` of a phase is `sequence[i mod len]`.
//!
//! ## Measurement query content
//!
//! By default the measurement phase resolves the *warmup* sequence's query
//! at index `i`, and only the measurement sequence's entry is named in the
//! skip diagnostic. This reproduces the historical harness so latency files
//! stay comparable. `QuerySource::Measurement` resolves the measurement
//! sequence instead.

use crate::graph::{GraphStore, GraphView};
use crate::loader::QuerySequence;
use crate::primitives::{
    DEFAULT_COOLDOWN_N, DEFAULT_MEASURE_N, DEFAULT_WARMUP_N, DEFAULT_WINDOW_SIZE,
};
use crate::report::LatencySummary;
use crate::resolver::{NeighborResolver, Strategy};
use crate::sink::{ResultDump, ResultSink};
use crate::{BenchError, MeasurementRecord};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Instant;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Which sequence supplies the query content of the measurement phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    /// Resolve `warmup[i mod len]` (historical behaviour).
    #[default]
    Warmup,
    /// Resolve `measurement[i mod len]`.
    Measurement,
}

/// Phase lengths and window size for a latency run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Untimed warmup queries.
    pub warmup_n: u64,
    /// Timed measurement queries.
    pub measure_n: u64,
    /// Untimed cooldown queries.
    pub cooldown_n: u64,
    /// Measured queries per storage transaction. Must be > 0.
    pub window_size: u64,
    /// Query content used while measuring.
    pub measure_source: QuerySource,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            warmup_n: DEFAULT_WARMUP_N,
            measure_n: DEFAULT_MEASURE_N,
            cooldown_n: DEFAULT_COOLDOWN_N,
            window_size: DEFAULT_WINDOW_SIZE,
            measure_source: QuerySource::default(),
        }
    }
}

impl HarnessConfig {
    /// Reject configurations the harness cannot run.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.window_size == 0 {
            return Err(BenchError::Config(
                "window_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TRANSACTION WINDOW
// =============================================================================

/// A bounded batch of queries sharing one storage transaction.
///
/// `commit` closes the transaction. A window dropped without `commit` (any
/// `?` exit out of a phase) rolls its transaction back, so every exit path
/// releases it.
#[derive(Debug)]
pub struct TransactionWindow<V: GraphView> {
    view: Option<V>,
    opened_at: u64,
    queries: u64,
}

/// What a committed window covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    /// Phase iteration at which the window opened.
    pub opened_at: u64,
    /// Queries executed inside it.
    pub queries: u64,
}

impl<V: GraphView> TransactionWindow<V> {
    /// Wrap a freshly opened transaction.
    pub fn new(view: V, opened_at: u64) -> Self {
        tracing::debug!(opened_at, "Opened transaction window");
        Self {
            view: Some(view),
            opened_at,
            queries: 0,
        }
    }

    /// The transaction queries run against.
    pub fn view(&self) -> Result<&V, BenchError> {
        self.view
            .as_ref()
            .ok_or_else(|| BenchError::Storage("transaction window already closed".to_string()))
    }

    /// Count one query against this window.
    pub fn note_query(&mut self) {
        self.queries = self.queries.saturating_add(1);
    }

    /// Queries executed so far.
    #[must_use]
    pub fn queries(&self) -> u64 {
        self.queries
    }

    /// Commit the transaction and close the window.
    pub fn commit(mut self) -> Result<WindowStats, BenchError> {
        let view = self
            .view
            .take()
            .ok_or_else(|| BenchError::Storage("transaction window already closed".to_string()))?;
        view.commit()?;
        tracing::debug!(
            opened_at = self.opened_at,
            queries = self.queries,
            "Committed transaction window"
        );
        Ok(WindowStats {
            opened_at: self.opened_at,
            queries: self.queries,
        })
    }
}

impl<V: GraphView> Drop for TransactionWindow<V> {
    fn drop(&mut self) {
        if self.view.take().is_some() {
            tracing::debug!(
                opened_at = self.opened_at,
                queries = self.queries,
                "Rolled back uncommitted transaction window"
            );
        }
    }
}

// =============================================================================
// OUTPUTS & REPORT
// =============================================================================

/// Durable outputs of the measurement phase.
#[derive(Debug)]
pub struct RunOutput<W: Write> {
    /// Measurement records.
    pub sink: ResultSink<W>,
    /// Optional per-query answer dump.
    pub dump: Option<ResultDump<W>>,
}

impl<W: Write> RunOutput<W> {
    /// Outputs with no result dump.
    pub fn new(sink: ResultSink<W>) -> Self {
        Self { sink, dump: None }
    }

    fn close(self) -> Result<(), BenchError> {
        self.sink.close()?;
        if let Some(dump) = self.dump {
            dump.close()?;
        }
        Ok(())
    }
}

/// Outcome of a completed latency run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessReport {
    pub strategy: Strategy,
    pub measure_source: QuerySource,
    pub warmup_queries: u64,
    pub measured_queries: u64,
    /// Measurement queries that produced an output line.
    pub recorded: u64,
    /// Measurement queries skipped for an empty result.
    pub skipped: u64,
    pub cooldown_queries: u64,
    /// Measurement windows in the order they were committed.
    pub windows: Vec<WindowStats>,
    pub latency: LatencySummary,
}

impl HarnessReport {
    /// Measurement iterations at which a window opened.
    #[must_use]
    pub fn window_boundaries(&self) -> Vec<u64> {
        self.windows.iter().map(|w| w.opened_at).collect()
    }
}

/// Iteration state threaded through the phases of one run.
#[derive(Debug, Default)]
struct RunState {
    warmed: u64,
    measured: u64,
    skipped: u64,
    cooled: u64,
    windows: Vec<WindowStats>,
    latencies: Vec<u64>,
}

// =============================================================================
// HARNESS
// =============================================================================

/// Warmup / measurement / cooldown driver for one strategy.
///
/// The resolver is fixed at construction, so the timed section is the same
/// code for every strategy.
pub struct LatencyHarness {
    config: HarnessConfig,
    strategy: Strategy,
    resolver: Box<dyn NeighborResolver>,
}

impl std::fmt::Debug for LatencyHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyHarness")
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl LatencyHarness {
    /// Build a harness for `strategy`.
    pub fn new(config: HarnessConfig, strategy: Strategy) -> Result<Self, BenchError> {
        config.validate()?;
        Ok(Self {
            config,
            strategy,
            resolver: strategy.resolver(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run all three phases.
    ///
    /// `open_output` is called only once warmup has succeeded, so a fatal
    /// warmup leaves no output behind. The outputs are closed on success and
    /// flushed on any later abort.
    pub fn run<S, W, F>(
        &self,
        store: &S,
        warmup: &QuerySequence,
        measurement: &QuerySequence,
        open_output: F,
    ) -> Result<HarnessReport, BenchError>
    where
        S: GraphStore,
        W: Write,
        F: FnOnce() -> Result<RunOutput<W>, BenchError>,
    {
        let source = self.measurement_source(warmup, measurement);
        if self.config.warmup_n > 0 && warmup.is_empty() {
            return Err(BenchError::EmptyQuerySequence("warmup"));
        }
        if self.config.measure_n > 0 && source.is_empty() {
            return Err(BenchError::EmptyQuerySequence("measurement"));
        }

        tracing::info!(strategy = %self.strategy, "Benchmarking neighbor-node queries");

        // The first transaction covers warmup; measurement iteration 0
        // commits it and opens the first measurement window.
        let mut state = RunState::default();
        let mut window = TransactionWindow::new(store.begin()?, 0);
        self.warmup(&mut state, &mut window, warmup)?;

        let mut output = open_output()?;
        // On error the outputs drop on return, which flushes what was written.
        self.measure(&mut state, store, window, source, measurement, &mut output)?;
        output.close()?;

        self.cooldown(&mut state, store, source)?;

        Ok(HarnessReport {
            strategy: self.strategy,
            measure_source: self.config.measure_source,
            warmup_queries: state.warmed,
            measured_queries: state.measured,
            recorded: state.latencies.len() as u64,
            skipped: state.skipped,
            cooldown_queries: state.cooled,
            latency: LatencySummary::from_samples(&state.latencies),
            windows: state.windows,
        })
    }

    fn measurement_source<'q>(
        &self,
        warmup: &'q QuerySequence,
        measurement: &'q QuerySequence,
    ) -> &'q QuerySequence {
        match self.config.measure_source {
            QuerySource::Warmup => warmup,
            QuerySource::Measurement => measurement,
        }
    }

    /// Warmup phase.
    fn warmup<V: GraphView>(
        &self,
        state: &mut RunState,
        window: &mut TransactionWindow<V>,
        warmup: &QuerySequence,
    ) -> Result<(), BenchError> {
        tracing::info!("Warming up for {} queries", self.config.warmup_n);

        for i in 0..self.config.warmup_n {
            let query = warmup
                .cyclic(i)
                .ok_or(BenchError::EmptyQuerySequence("warmup"))?;
            let result = self.resolver.resolve(window.view()?, query)?;
            window.note_query();

            if result.is_empty() {
                tracing::error!("Error: no neighbor nodes for {}", query);
                return Err(BenchError::EmptyWarmupResult {
                    iteration: i,
                    query: query.clone(),
                });
            }
            state.warmed += 1;
        }

        Ok(())
    }

    /// Measurement phase. Consumes the warmup window.
    fn measure<'s, S, W>(
        &self,
        state: &mut RunState,
        store: &'s S,
        warmup_window: TransactionWindow<S::View<'s>>,
        source: &QuerySequence,
        measurement: &QuerySequence,
        output: &mut RunOutput<W>,
    ) -> Result<(), BenchError>
    where
        S: GraphStore,
        W: Write,
    {
        tracing::info!("Measuring for {} queries", self.config.measure_n);

        let measure_n = self.config.measure_n;
        let window_size = self.config.window_size;
        state.latencies.reserve(measure_n.min(1 << 20) as usize);

        warmup_window.commit()?;

        let mut start = 0u64;
        while start < measure_n {
            let mut window = TransactionWindow::new(store.begin()?, start);
            let end = start.saturating_add(window_size).min(measure_n);

            for i in start..end {
                let query = source
                    .cyclic(i)
                    .ok_or(BenchError::EmptyQuerySequence("measurement"))?;

                let view = window.view()?;
                let started = Instant::now();
                let result = self.resolver.resolve(view, query)?;
                // as_micros truncates; the cast keeps it integral.
                let latency = started.elapsed().as_micros() as u64;
                window.note_query();
                state.measured += 1;

                if result.is_empty() {
                    let listed = measurement.cyclic(i).unwrap_or(query);
                    tracing::warn!(iteration = i, "Error: no neighbor nodes for {}", listed);
                    state.skipped += 1;
                    continue;
                }

                output
                    .sink
                    .write_record(MeasurementRecord::new(result.len() as u64, latency))?;
                if let Some(dump) = output.dump.as_mut() {
                    dump.write_result(query, &result)?;
                }
                state.latencies.push(latency);
            }

            state.windows.push(window.commit()?);
            start = end;
        }

        Ok(())
    }

    /// Cooldown phase, continuing the measurement index.
    fn cooldown<S: GraphStore>(
        &self,
        state: &mut RunState,
        store: &S,
        source: &QuerySequence,
    ) -> Result<(), BenchError> {
        if self.config.cooldown_n == 0 || source.is_empty() {
            return Ok(());
        }
        let offset = self.config.measure_n;

        tracing::info!("Cooling down for {} queries", self.config.cooldown_n);

        let mut window = TransactionWindow::new(store.begin()?, offset);
        for k in 0..self.config.cooldown_n {
            let query = source
                .cyclic(offset.saturating_add(k))
                .ok_or(BenchError::EmptyQuerySequence("cooldown"))?;
            let _ = self.resolver.resolve(window.view()?, query)?;
            window.note_query();
        }
        state.cooled = window.commit()?.queries;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBatch, MemoryGraph, MemoryView};
    use crate::{NodeId, QuerySpec};
    use std::cell::Cell;

    /// Hub 0 -> 1..=3 with name0 = "a", "b", "c".
    fn hub_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        let mut batch = GraphBatch::new();
        batch.add_node(NodeId(0), [("name0", "hub")]);
        for (id, value) in [(1, "a"), (2, "b"), (3, "c")] {
            batch.add_node(NodeId(id), [("name0", value)]);
            batch.add_relationship(NodeId(0), NodeId(id));
        }
        graph.apply(&batch).expect("apply");
        graph.create_index("name0").expect("index");
        graph
    }

    fn seq(values: &[&str]) -> QuerySequence {
        QuerySequence::new(
            values
                .iter()
                .map(|v| QuerySpec::new(NodeId(0), 0, *v))
                .collect(),
        )
    }

    fn config(warmup_n: u64, measure_n: u64, window_size: u64) -> HarnessConfig {
        HarnessConfig {
            warmup_n,
            measure_n,
            cooldown_n: 0,
            window_size,
            measure_source: QuerySource::Warmup,
        }
    }

    fn lines(bytes: Vec<u8>) -> Vec<String> {
        String::from_utf8(bytes)
            .expect("utf8")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn zero_window_size_rejected() {
        let err = LatencyHarness::new(config(1, 1, 0), Strategy::Scan).expect_err("invalid");
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn window_boundaries_for_partial_final_window() {
        let graph = hub_graph();
        let harness = LatencyHarness::new(config(3, 25_000, 10_000), Strategy::Indexed)
            .expect("harness");

        let report = harness
            .run(&graph, &seq(&["a"]), &seq(&["a"]), || {
                Ok(RunOutput::new(ResultSink::new(std::io::sink())))
            })
            .expect("run");

        assert_eq!(report.window_boundaries(), vec![0, 10_000, 20_000]);
        let sizes: Vec<u64> = report.windows.iter().map(|w| w.queries).collect();
        assert_eq!(sizes, vec![10_000, 10_000, 5_000]);
        assert_eq!(report.recorded, 25_000);
    }

    #[test]
    fn empty_measurement_result_is_skipped() {
        let graph = hub_graph();
        let mut cfg = config(0, 6, 4);
        cfg.measure_source = QuerySource::Measurement;
        let harness = LatencyHarness::new(cfg, Strategy::Scan).expect("harness");

        let mut captured = Vec::new();
        let report = harness
            .run(&graph, &seq(&[]), &seq(&["a", "missing", "c"]), || {
                Ok(RunOutput::new(ResultSink::new(&mut captured)))
            })
            .expect("run");

        assert_eq!(report.measured_queries, 6);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.recorded, 4);

        let out = lines(captured);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|l| l.starts_with("1,")));
    }

    #[test]
    fn empty_warmup_result_never_opens_output() {
        let graph = hub_graph();
        let harness = LatencyHarness::new(config(5, 10, 10), Strategy::Scan).expect("harness");
        let opened = Cell::new(false);

        let err = harness
            .run(&graph, &seq(&["a", "nothing"]), &seq(&["a"]), || {
                opened.set(true);
                Ok(RunOutput::new(ResultSink::new(std::io::sink())))
            })
            .expect_err("fatal");

        assert!(matches!(
            err,
            BenchError::EmptyWarmupResult { iteration: 1, .. }
        ));
        assert!(!opened.get());
    }

    #[test]
    fn measurement_resolves_warmup_content_by_default() {
        // The measurement sequence only names queries in diagnostics; with the
        // default source the warmup sequence's content is what gets timed.
        let graph = hub_graph();
        let harness = LatencyHarness::new(config(1, 4, 10), Strategy::Scan).expect("harness");

        let mut records = Vec::new();
        let mut dumped = Vec::new();
        let report = harness
            .run(&graph, &seq(&["b"]), &seq(&["never-matches"]), || {
                Ok(RunOutput {
                    sink: ResultSink::new(&mut records),
                    dump: Some(ResultDump::new(&mut dumped)),
                })
            })
            .expect("run");

        assert_eq!(report.recorded, 4);
        assert_eq!(report.skipped, 0);
        let dump = lines(dumped);
        assert_eq!(dump[0], "id 0 attr 0 query b");
        assert_eq!(dump[1], "2");
    }

    #[test]
    fn measurement_source_switch_uses_measurement_content() {
        let graph = hub_graph();
        let mut cfg = config(1, 4, 10);
        cfg.measure_source = QuerySource::Measurement;
        let harness = LatencyHarness::new(cfg, Strategy::Scan).expect("harness");

        let report = harness
            .run(&graph, &seq(&["b"]), &seq(&["never-matches"]), || {
                Ok(RunOutput::new(ResultSink::new(std::io::sink())))
            })
            .expect("run");

        assert_eq!(report.recorded, 0);
        assert_eq!(report.skipped, 4);
    }

    #[test]
    fn cyclic_replay_through_measurement() {
        let graph = hub_graph();
        let mut cfg = config(0, 30, 7);
        cfg.measure_source = QuerySource::Measurement;
        let harness = LatencyHarness::new(cfg, Strategy::Indexed).expect("harness");

        let mut records = Vec::new();
        let mut dumped = Vec::new();
        harness
            .run(&graph, &seq(&[]), &seq(&["a", "b", "c"]), || {
                Ok(RunOutput {
                    sink: ResultSink::new(&mut records),
                    dump: Some(ResultDump::new(&mut dumped)),
                })
            })
            .expect("run");

        let headers: Vec<String> = lines(dumped).into_iter().step_by(2).collect();
        assert_eq!(headers.len(), 30);
        for (i, header) in headers.iter().enumerate() {
            let expected = ["a", "b", "c"][i % 3];
            assert_eq!(header, &format!("id 0 attr 0 query {}", expected));
        }
    }

    #[test]
    fn cooldown_runs_configured_queries() {
        let graph = hub_graph();
        let mut cfg = config(2, 2, 10);
        cfg.cooldown_n = 5;
        let harness = LatencyHarness::new(cfg, Strategy::Scan).expect("harness");

        let report = harness
            .run(&graph, &seq(&["a"]), &seq(&["a"]), || {
                Ok(RunOutput::new(ResultSink::new(std::io::sink())))
            })
            .expect("run");

        assert_eq!(report.warmup_queries, 2);
        assert_eq!(report.cooldown_queries, 5);
    }

    #[test]
    fn empty_sequences_rejected_up_front() {
        let graph = hub_graph();
        let harness = LatencyHarness::new(config(1, 1, 1), Strategy::Scan).expect("harness");

        let err = harness
            .run(&graph, &seq(&[]), &seq(&["a"]), || {
                Ok(RunOutput::new(ResultSink::new(std::io::sink())))
            })
            .expect_err("empty warmup");
        assert!(matches!(err, BenchError::EmptyQuerySequence("warmup")));
    }

    /// Wraps a `MemoryGraph` and fails the commit of the `fail_on`-th
    /// transaction (1-based, counting every `begin`).
    struct FailingCommitStore {
        graph: MemoryGraph,
        begins: Cell<u32>,
        fail_on: u32,
    }

    struct FailingCommitView<'a> {
        inner: MemoryView<'a>,
        fails: bool,
    }

    impl GraphView for FailingCommitView<'_> {
        fn contains_node(&self, id: NodeId) -> Result<bool, BenchError> {
            self.inner.contains_node(id)
        }
        fn outgoing(&self, node: NodeId) -> Result<Vec<crate::Relationship>, BenchError> {
            self.inner.outgoing(node)
        }
        fn property(&self, node: NodeId, key: &str) -> Result<Option<String>, BenchError> {
            self.inner.property(node, key)
        }
        fn find_nodes(&self, key: &str, value: &str) -> Result<Vec<NodeId>, BenchError> {
            self.inner.find_nodes(key, value)
        }
        fn commit(self) -> Result<(), BenchError> {
            if self.fails {
                return Err(BenchError::Storage("commit rejected".to_string()));
            }
            self.inner.commit()
        }
    }

    impl GraphStore for FailingCommitStore {
        type View<'a> = FailingCommitView<'a>;

        fn begin(&self) -> Result<Self::View<'_>, BenchError> {
            let ordinal = self.begins.get() + 1;
            self.begins.set(ordinal);
            Ok(FailingCommitView {
                inner: self.graph.begin()?,
                fails: ordinal == self.fail_on,
            })
        }
        fn await_indexes(&self, timeout: std::time::Duration) -> Result<(), BenchError> {
            self.graph.await_indexes(timeout)
        }
        fn create_index(&mut self, key: &str) -> Result<(), BenchError> {
            self.graph.create_index(key)
        }
        fn apply(&mut self, batch: &GraphBatch) -> Result<(), BenchError> {
            self.graph.apply(batch)
        }
    }

    #[test]
    fn failed_window_commit_is_fatal_and_not_retried() {
        // begin #1 is the warmup window, #2 and #3 the first two
        // measurement windows.
        let store = FailingCommitStore {
            graph: hub_graph(),
            begins: Cell::new(0),
            fail_on: 3,
        };
        let mut cfg = config(1, 6, 2);
        cfg.cooldown_n = 4;
        let harness = LatencyHarness::new(cfg, Strategy::Scan).expect("harness");

        let mut captured = Vec::new();
        let err = harness
            .run(&store, &seq(&["a"]), &seq(&["a"]), || {
                Ok(RunOutput::new(ResultSink::new(&mut captured)))
            })
            .expect_err("commit failure");

        assert!(matches!(err, BenchError::Storage(ref msg) if msg == "commit rejected"));
        // No further window (measurement or cooldown) was opened.
        assert_eq!(store.begins.get(), 3);

        // Records stream before the commit, so both windows' records were
        // flushed when the sink dropped.
        let out = lines(captured);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|l| l.starts_with("1,")));
    }

    #[test]
    fn window_rolls_back_on_drop() {
        let graph = hub_graph();
        let mut window = TransactionWindow::new(graph.begin().expect("begin"), 0);
        window.note_query();
        assert_eq!(window.queries(), 1);
        drop(window);

        let window = TransactionWindow::new(graph.begin().expect("begin"), 1);
        let stats = window.commit().expect("commit");
        assert_eq!(stats, WindowStats { opened_at: 1, queries: 0 });
    }
}
