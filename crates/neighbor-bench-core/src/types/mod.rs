//! # Core Type Definitions
//!
//! This module contains all core types shared by the harness components:
//! - Graph identifiers (`NodeId`, `RelationshipId`) and `Relationship`
//! - Query input (`QuerySpec`)
//! - Query output (`NeighborSet`, `MeasurementRecord`)
//! - Error types (`BenchError`)
//!
//! Identifiers implement `Ord` so result sets iterate in a stable order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Identifier of a node in the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a relationship in the graph store.
///
/// Two relationships may connect the same pair of nodes; they differ by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipId(pub u64);

// =============================================================================
// RELATIONSHIP
// =============================================================================

/// A directed relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The relationship identifier.
    pub id: RelationshipId,
    /// The node the relationship originates at.
    pub start: NodeId,
    /// The node the relationship points to.
    pub end: NodeId,
}

impl Relationship {
    /// Create a new relationship.
    #[must_use]
    pub const fn new(id: RelationshipId, start: NodeId, end: NodeId) -> Self {
        Self { id, start, end }
    }

    /// The endpoint that is not `node`.
    ///
    /// For a self-loop both endpoints are `node`, so `node` is returned.
    #[must_use]
    pub const fn other_node(&self, node: NodeId) -> NodeId {
        if self.start.0 == node.0 {
            self.end
        } else {
            self.start
        }
    }
}

// =============================================================================
// QUERY SPEC
// =============================================================================

/// One neighbor-node query, as read from a query file line
/// `nodeId,attributeIndex,searchValue`.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Node whose outgoing neighbors are searched.
    pub node_id: NodeId,
    /// Selects the `name<k>` property compared on each neighbor.
    pub attribute_index: u32,
    /// Exact value the property must equal.
    pub search_value: String,
}

impl QuerySpec {
    /// Create a new query spec.
    #[must_use]
    pub fn new(node_id: NodeId, attribute_index: u32, search_value: impl Into<String>) -> Self {
        Self {
            node_id,
            attribute_index,
            search_value: search_value.into(),
        }
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node id: {}, attr {}, search {}",
            self.node_id, self.attribute_index, self.search_value
        )
    }
}

// =============================================================================
// NEIGHBOR SET
// =============================================================================

/// Distinct neighbor identifiers produced by one resolution call.
///
/// Parallel relationships to the same neighbor count once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NeighborSet(BTreeSet<NodeId>);

impl NeighborSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a neighbor. Returns `false` if it was already present.
    pub fn insert(&mut self, node: NodeId) -> bool {
        self.0.insert(node)
    }

    /// Number of distinct neighbors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no neighbor matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.0.contains(&node)
    }

    /// Neighbors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<NodeId> for NeighborSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// MEASUREMENT RECORD
// =============================================================================

/// One measured query: how many neighbors came back and how long it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Cardinality of the returned `NeighborSet`.
    pub result_count: u64,
    /// Resolution time, truncated to whole microseconds.
    pub latency_micros: u64,
}

impl MeasurementRecord {
    #[must_use]
    pub const fn new(result_count: u64, latency_micros: u64) -> Self {
        Self {
            result_count,
            latency_micros,
        }
    }
}

impl fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.result_count, self.latency_micros)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while running a benchmark.
///
/// - Input errors abort before any phase starts
/// - Engine errors are fatal; nothing is retried
/// - An empty warmup result is fatal; an empty measurement result is not an
///   error at all (it is logged and skipped by the harness)
#[derive(Debug, Error)]
pub enum BenchError {
    /// An I/O error occurred on a query, output, or config file.
    #[error("I/O error: {0}")]
    Io(String),

    /// The storage engine failed (open, transaction, table access).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A query file line could not be parsed.
    #[error("Malformed query at line {line}: {reason}")]
    MalformedQuery {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A phase needed queries but its sequence is empty.
    #[error("Query sequence is empty: {0}")]
    EmptyQuerySequence(&'static str),

    /// The queried node does not exist in the store.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// An index lookup was requested on a property with no index.
    #[error("No index on property: {0}")]
    IndexMissing(String),

    /// Indexes did not come online in time.
    #[error("Index not ready: {0}")]
    IndexNotReady(String),

    /// A warmup query returned no neighbors; the query set is unusable.
    #[error("Error: no neighbor nodes for {query} (warmup iteration {iteration})")]
    EmptyWarmupResult {
        /// Warmup iteration that failed.
        iteration: u64,
        /// The query that produced nothing.
        query: QuerySpec,
    },

    /// Scan and indexed resolution returned different sets.
    #[error("Strategies disagree on {0} queries")]
    StrategyMismatch(usize),

    /// Invalid harness configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
