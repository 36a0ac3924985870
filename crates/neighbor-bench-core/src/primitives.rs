//! # Harness Primitives
//!
//! Compiled-in defaults for the benchmark protocol.
//!
//! Every value here can be overridden at run time through `HarnessConfig`
//! or `ThroughputConfig`; these are what applies when nothing else does.

/// Default number of untimed warmup queries.
pub const DEFAULT_WARMUP_N: u64 = 20_000;

/// Default number of timed measurement queries.
pub const DEFAULT_MEASURE_N: u64 = 100_000;

/// Default number of untimed, unchecked cooldown queries.
pub const DEFAULT_COOLDOWN_N: u64 = 500;

/// Number of measured queries sharing one storage transaction.
///
/// A window is committed before the next one opens; the last partial
/// window is committed when the measurement phase ends.
pub const DEFAULT_WINDOW_SIZE: u64 = 10_000;

/// Prefix of the dynamically named attribute property.
///
/// Attribute index `k` maps to the property key `"name{k}"`. Externally
/// generated query files depend on this exact spelling.
pub const ATTRIBUTE_KEY_PREFIX: &str = "name";

/// Field separator in query files and measurement output.
pub const FIELD_DELIMITER: char = ',';

// =============================================================================
// THROUGHPUT MODE
// =============================================================================

/// Default warmup duration of the throughput mode (1 min).
pub const DEFAULT_WARMUP_SECS: u64 = 60;

/// Default measurement duration of the throughput mode (2 min).
pub const DEFAULT_MEASURE_SECS: u64 = 120;

/// Default cooldown duration of the throughput mode (5 sec).
pub const DEFAULT_COOLDOWN_SECS: u64 = 5;

/// Seed for the throughput mode's query selection.
pub const DEFAULT_SEED: u64 = 1618;

// =============================================================================
// STORE BRING-UP
// =============================================================================

/// How long to wait for property indexes to come online after open.
pub const DEFAULT_INDEX_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for indexes.
pub const INDEX_POLL_INTERVAL_MILLIS: u64 = 50;
