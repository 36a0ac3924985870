//! # Strategy Verification
//!
//! Resolves every query of a sequence with both strategies inside one
//! transaction and reports where the answers differ. The two strategies must
//! agree on every snapshot, so any mismatch points at the store or its index.

use crate::graph::GraphStore;
use crate::harness::TransactionWindow;
use crate::loader::QuerySequence;
use crate::resolver::{IndexedResolver, NeighborResolver, ScanResolver};
use crate::{BenchError, NeighborSet, QuerySpec};
use serde::Serialize;

/// One query on which the strategies disagreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Position in the sequence.
    pub index: usize,
    pub query: QuerySpec,
    pub scan: NeighborSet,
    pub indexed: NeighborSet,
}

/// Outcome of a verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Queries resolved by both strategies.
    pub checked: u64,
    /// Queries where both strategies returned nothing.
    pub empty: u64,
    #[serde(skip)]
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Check `ScanResolver` against `IndexedResolver` for every query.
pub fn verify_strategies<S: GraphStore>(
    store: &S,
    queries: &QuerySequence,
) -> Result<VerifyReport, BenchError> {
    tracing::info!(queries = queries.len(), "Verifying scan against indexed resolution");

    let mut window = TransactionWindow::new(store.begin()?, 0);
    let mut report = VerifyReport::default();

    for (index, query) in queries.as_slice().iter().enumerate() {
        let view = window.view()?;
        let scan = ScanResolver.resolve(view, query)?;
        let indexed = IndexedResolver.resolve(view, query)?;
        window.note_query();
        report.checked += 1;

        if scan != indexed {
            tracing::warn!(
                index,
                scan = scan.len(),
                indexed = indexed.len(),
                "Strategies disagree for {}",
                query
            );
            report.mismatches.push(Mismatch {
                index,
                query: query.clone(),
                scan,
                indexed,
            });
        } else if scan.is_empty() {
            report.empty += 1;
        }
    }

    window.commit()?;
    Ok(report)
}
