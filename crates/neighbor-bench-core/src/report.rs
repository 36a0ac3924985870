//! # Latency Summary
//!
//! Integer summary statistics over recorded latencies. Percentiles use the
//! nearest-rank method, so every reported value is an actual sample.

use serde::Serialize;
use std::fmt;

/// Summary of a set of latency samples, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
    /// Arithmetic mean, truncated.
    pub mean: u64,
}

impl LatencySummary {
    /// Summarize `samples`. An empty slice yields all zeros.
    #[must_use]
    pub fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let count = sorted.len() as u64;
        let total: u128 = sorted.iter().map(|&s| s as u128).sum();

        Self {
            count,
            min: sorted[0],
            p50: nearest_rank(&sorted, 500),
            p90: nearest_rank(&sorted, 900),
            p99: nearest_rank(&sorted, 990),
            p999: nearest_rank(&sorted, 999),
            max: sorted[sorted.len() - 1],
            mean: (total / count as u128) as u64,
        }
    }
}

/// Nearest-rank percentile over a sorted, non-empty slice.
fn nearest_rank(sorted: &[u64], per_mille: u64) -> u64 {
    let n = sorted.len() as u64;
    let rank = (per_mille * n).div_ceil(1000).max(1);
    sorted[(rank - 1) as usize]
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} min={}us p50={}us p90={}us p99={}us p99.9={}us max={}us mean={}us",
            self.count, self.min, self.p50, self.p90, self.p99, self.p999, self.max, self.mean
        )
    }
}
