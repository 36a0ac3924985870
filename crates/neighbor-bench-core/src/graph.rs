//! # Graph Store Contract
//!
//! The narrow storage-engine contract the harness consumes, and an
//! in-memory engine implementing it.
//!
//! The contract is split in two:
//! - `GraphStore`: store-level operations (begin a transaction, index
//!   management, batch writes).
//! - `GraphView`: a read transaction. Every query of a transaction window
//!   runs against the same view; `commit` closes it, dropping it rolls back.
//!
//! Any engine offering these operations is substitutable. `RedbStore` is the
//! persistent engine; `MemoryGraph` is used for fixtures and benches.

use crate::{BenchError, NodeId, Relationship, RelationshipId};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

// =============================================================================
// GRAPHVIEW TRAIT
// =============================================================================

/// A read transaction over a graph snapshot.
///
/// All fallible operations return `Result<T, BenchError>` so in-memory and
/// persistent engines are used uniformly.
pub trait GraphView {
    /// Check if a node exists.
    fn contains_node(&self, id: NodeId) -> Result<bool, BenchError>;

    /// All relationships originating at `node`, in relationship-id order.
    ///
    /// Returns `BenchError::NodeNotFound` if the node does not exist.
    fn outgoing(&self, node: NodeId) -> Result<Vec<Relationship>, BenchError>;

    /// Read a named property. `None` if the node has no such property.
    fn property(&self, node: NodeId, key: &str) -> Result<Option<String>, BenchError>;

    /// Nodes whose indexed property `key` equals `value` exactly.
    ///
    /// Returns `BenchError::IndexMissing` if `key` is not indexed.
    fn find_nodes(&self, key: &str, value: &str) -> Result<Vec<NodeId>, BenchError>;

    /// Close the transaction successfully.
    fn commit(self) -> Result<(), BenchError>
    where
        Self: Sized;
}

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// Store-level operations of a graph engine.
pub trait GraphStore {
    /// The read transaction type handed out by `begin`.
    type View<'a>: GraphView
    where
        Self: 'a;

    /// Open a new read transaction.
    fn begin(&self) -> Result<Self::View<'_>, BenchError>;

    /// Block until every registered property index is online.
    fn await_indexes(&self, timeout: Duration) -> Result<(), BenchError>;

    /// Register an index on property `key` and populate it from existing nodes.
    /// Creating an index that already exists is a no-op.
    fn create_index(&mut self, key: &str) -> Result<(), BenchError>;

    /// Apply a batch of node and relationship writes atomically.
    ///
    /// Nodes are upserted and their listed properties overwritten. Every
    /// relationship endpoint must exist once the batch's nodes are applied.
    fn apply(&mut self, batch: &GraphBatch) -> Result<(), BenchError>;
}

// =============================================================================
// GRAPH BATCH
// =============================================================================

/// A set of writes applied in one `GraphStore::apply` call.
#[derive(Debug, Clone, Default)]
pub struct GraphBatch {
    /// Nodes with the properties to set on them.
    pub nodes: Vec<(NodeId, Vec<(String, String)>)>,
    /// Relationships as `(start, end)` pairs, created in order.
    pub relationships: Vec<(NodeId, NodeId)>,
}

impl GraphBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or update) a node with the given properties.
    pub fn add_node<K, V>(&mut self, id: NodeId, properties: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let properties = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.nodes.push((id, properties));
    }

    /// Add a relationship from `start` to `end`.
    pub fn add_relationship(&mut self, start: NodeId, end: NodeId) {
        self.relationships.push((start, end));
    }

    /// True if the batch contains no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

// =============================================================================
// MEMORY GRAPH
// =============================================================================

/// In-memory graph engine.
///
/// Uses `BTreeMap` exclusively so iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    /// Node storage: NodeId -> property key -> value
    nodes: BTreeMap<NodeId, BTreeMap<String, String>>,

    /// Adjacency list: start node -> outgoing relationships
    outgoing: BTreeMap<NodeId, Vec<Relationship>>,

    /// Property indexes: key -> value -> nodes
    indexes: BTreeMap<String, BTreeMap<String, BTreeSet<NodeId>>>,

    /// Next available RelationshipId
    next_relationship_id: u64,
}

impl MemoryGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of relationships.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    fn set_property(&mut self, node: NodeId, key: &str, value: &str) {
        let props = self.nodes.entry(node).or_default();
        let previous = props.insert(key.to_string(), value.to_string());

        if let Some(index) = self.indexes.get_mut(key) {
            if let Some(old) = previous {
                if let Some(holders) = index.get_mut(&old) {
                    holders.remove(&node);
                }
            }
            index.entry(value.to_string()).or_default().insert(node);
        }
    }
}

/// Read view over a `MemoryGraph`.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a> {
    graph: &'a MemoryGraph,
}

impl GraphView for MemoryView<'_> {
    fn contains_node(&self, id: NodeId) -> Result<bool, BenchError> {
        Ok(self.graph.nodes.contains_key(&id))
    }

    fn outgoing(&self, node: NodeId) -> Result<Vec<Relationship>, BenchError> {
        if !self.graph.nodes.contains_key(&node) {
            return Err(BenchError::NodeNotFound(node));
        }
        Ok(self.graph.outgoing.get(&node).cloned().unwrap_or_default())
    }

    fn property(&self, node: NodeId, key: &str) -> Result<Option<String>, BenchError> {
        Ok(self
            .graph
            .nodes
            .get(&node)
            .and_then(|props| props.get(key))
            .cloned())
    }

    fn find_nodes(&self, key: &str, value: &str) -> Result<Vec<NodeId>, BenchError> {
        let index = self
            .graph
            .indexes
            .get(key)
            .ok_or_else(|| BenchError::IndexMissing(key.to_string()))?;
        Ok(index
            .get(value)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default())
    }

    fn commit(self) -> Result<(), BenchError> {
        Ok(())
    }
}

impl GraphStore for MemoryGraph {
    type View<'a> = MemoryView<'a>;

    fn begin(&self) -> Result<Self::View<'_>, BenchError> {
        Ok(MemoryView { graph: self })
    }

    fn await_indexes(&self, _timeout: Duration) -> Result<(), BenchError> {
        // Indexes are populated synchronously in create_index.
        Ok(())
    }

    fn create_index(&mut self, key: &str) -> Result<(), BenchError> {
        if self.indexes.contains_key(key) {
            return Ok(());
        }

        let mut index: BTreeMap<String, BTreeSet<NodeId>> = BTreeMap::new();
        for (node, props) in &self.nodes {
            if let Some(value) = props.get(key) {
                index.entry(value.clone()).or_default().insert(*node);
            }
        }
        self.indexes.insert(key.to_string(), index);
        Ok(())
    }

    fn apply(&mut self, batch: &GraphBatch) -> Result<(), BenchError> {
        // Validate endpoints before mutating so a bad batch leaves no trace.
        for (start, end) in &batch.relationships {
            for endpoint in [start, end] {
                let known = self.nodes.contains_key(endpoint)
                    || batch.nodes.iter().any(|(id, _)| id == endpoint);
                if !known {
                    return Err(BenchError::NodeNotFound(*endpoint));
                }
            }
        }

        for (id, properties) in &batch.nodes {
            self.nodes.entry(*id).or_default();
            for (key, value) in properties {
                self.set_property(*id, key, value);
            }
        }

        for (start, end) in &batch.relationships {
            let rel = Relationship::new(RelationshipId(self.next_relationship_id), *start, *end);
            self.next_relationship_id = self.next_relationship_id.saturating_add(1);
            self.outgoing.entry(*start).or_default().push(rel);
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
