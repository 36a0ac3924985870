//! # neighbor-bench-core
//!
//! The latency harness for neighbor-node queries - THE HARNESS.
//!
//! This crate measures one graph operation: "find the neighbors of node N,
//! reached over an outgoing relationship, whose `name<k>` property equals a
//! search value". It is answered two ways and timed identically:
//!
//! - **Scan**: walk the node's outgoing relationships and compare the
//!   property on every endpoint.
//! - **Indexed**: look the value up in a property index and intersect the
//!   hits with the node's adjacency set.
//!
//! ## Pipeline
//!
//! ```text
//! loader ──► QuerySequence (warmup) ──┐
//!        └─► QuerySequence (measure) ─┼─► LatencyHarness ──► ResultSink
//!                                     │        │
//!                        NeighborResolver ◄────┘
//!                                     │
//!                          GraphStore / GraphView
//!                         (RedbStore | MemoryGraph)
//! ```
//!
//! ## Architectural Constraints
//!
//! - Single-threaded and synchronous; the harness is the sole client of
//!   the store
//! - Measurement records are written in strict iteration order
//! - NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod graph;
pub mod harness;
pub mod loader;
pub mod primitives;
pub mod report;
pub mod resolver;
pub mod sink;
pub mod storage;
pub mod throughput;
pub mod types;
pub mod verify;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BenchError, MeasurementRecord, NeighborSet, NodeId, QuerySpec, Relationship, RelationshipId,
};

// =============================================================================
// RE-EXPORTS: Storage Engines
// =============================================================================

pub use graph::{GraphBatch, GraphStore, GraphView, MemoryGraph};
pub use storage::RedbStore;

// =============================================================================
// RE-EXPORTS: Harness Components
// =============================================================================

pub use harness::{
    HarnessConfig, HarnessReport, LatencyHarness, QuerySource, RunOutput, TransactionWindow,
    WindowStats,
};
pub use loader::{QuerySequence, load, parse_line};
pub use report::LatencySummary;
pub use resolver::{IndexedResolver, NeighborResolver, ScanResolver, Strategy, attribute_key};
pub use sink::{ResultDump, ResultSink};
pub use throughput::{ThroughputConfig, ThroughputHarness, ThroughputReport};
pub use verify::{Mismatch, VerifyReport, verify_strategies};
