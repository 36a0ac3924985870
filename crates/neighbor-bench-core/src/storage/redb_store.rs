//! # redb-backed Graph Store
//!
//! A persistent graph store using the redb embedded database, providing:
//! - ACID write batches
//! - Snapshot read transactions (one per transaction window)
//! - Property indexes maintained alongside property writes
//!
//! ## Layout
//!
//! | table            | key                     | value                       |
//! |------------------|-------------------------|-----------------------------|
//! | `nodes`          | node id                 | out-degree                  |
//! | `relationships`  | (start, relationship id)| postcard `Relationship`     |
//! | `properties`     | (node, key)             | value                       |
//! | `property_index` | (key, value, node)      | node                        |
//! | `indexes`        | key                     | index state                 |
//! | `metadata`       | name                    | u64                         |
//!
//! Relationships are keyed by their start node so a node's outgoing set is a
//! single range scan.

use crate::graph::{GraphBatch, GraphStore, GraphView};
use crate::primitives::INDEX_POLL_INTERVAL_MILLIS;
use crate::{BenchError, NodeId, Relationship, RelationshipId};
use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable,
    ReadableTableMetadata, TableDefinition,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Table for nodes: NodeId(u64) -> out-degree
const NODES: TableDefinition<u64, u64> = TableDefinition::new("nodes");

/// Table for relationships: (start_id, relationship_id) -> serialized Relationship
const RELATIONSHIPS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("relationships");

/// Table for properties: (node_id, key) -> value
const PROPERTIES: TableDefinition<(u64, &str), &str> = TableDefinition::new("properties");

/// Table for the property index: (key, value, node_id) -> node_id
const PROPERTY_INDEX: TableDefinition<(&str, &str, u64), u64> =
    TableDefinition::new("property_index");

/// Table for index registry: key -> state
const INDEXES: TableDefinition<&str, u8> = TableDefinition::new("indexes");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Index registered, entries still being written.
const INDEX_POPULATING: u8 = 0;

/// Index complete and usable by `find_nodes`.
const INDEX_ONLINE: u8 = 1;

const NEXT_RELATIONSHIP_ID: &str = "next_relationship_id";

fn storage_err(e: impl ToString) -> BenchError {
    BenchError::Storage(e.to_string())
}

/// A disk-backed graph store using redb.
///
/// The database handle is released when the store is dropped; that drop is
/// the store's shutdown hook and runs on every exit path, including a
/// fail-fast abort that never reaches `shutdown`.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Where the database lives, for diagnostics.
    path: PathBuf,
    /// Next available relationship ID.
    next_relationship_id: u64,
    /// Set by `shutdown` so the drop hook knows the exit was orderly.
    shut_down: bool,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .field("next_relationship_id", &self.next_relationship_id)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a graph store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(NODES).map_err(storage_err)?;
            let _ = write_txn.open_table(RELATIONSHIPS).map_err(storage_err)?;
            let _ = write_txn.open_table(PROPERTIES).map_err(storage_err)?;
            let _ = write_txn.open_table(PROPERTY_INDEX).map_err(storage_err)?;
            let _ = write_txn.open_table(INDEXES).map_err(storage_err)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        let next_relationship_id = {
            let read_txn = db.begin_read().map_err(storage_err)?;
            let table = read_txn.open_table(METADATA).map_err(storage_err)?;
            table
                .get(NEXT_RELATIONSHIP_ID)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        tracing::debug!(path = %path.display(), "Opened graph store");

        Ok(Self {
            db,
            path,
            next_relationship_id,
            shut_down: false,
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> Result<u64, BenchError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(NODES).map_err(storage_err)?;
        table.len().map_err(storage_err)
    }

    /// Total number of relationships.
    pub fn relationship_count(&self) -> Result<u64, BenchError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(RELATIONSHIPS).map_err(storage_err)?;
        table.len().map_err(storage_err)
    }

    /// Property keys that have an index, in key order.
    pub fn indexed_keys(&self) -> Result<Vec<String>, BenchError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(INDEXES).map_err(storage_err)?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    /// Shut the store down in an orderly way.
    pub fn shutdown(mut self) {
        self.shut_down = true;
        tracing::info!("Shutting down database ...");
    }

    fn index_state(&self, key: &str) -> Result<Option<u8>, BenchError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(INDEXES).map_err(storage_err)?;
        let state = table.get(key).map_err(storage_err)?.map(|v| v.value());
        Ok(state)
    }

    /// Commit `key` to the registry as populating. Until `populate_index`
    /// commits, readers see the index as pending, also across a reopen.
    fn register_index(&self, key: &str) -> Result<(), BenchError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut indexes = write_txn.open_table(INDEXES).map_err(storage_err)?;
            indexes.insert(key, INDEX_POPULATING).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        tracing::debug!(key, "Registered property index");
        Ok(())
    }

    /// Backfill the index from existing properties and mark it online.
    fn populate_index(&self, key: &str) -> Result<(), BenchError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let props = write_txn.open_table(PROPERTIES).map_err(storage_err)?;
            let mut entries = Vec::new();
            for entry in props.iter().map_err(storage_err)? {
                let (k, v) = entry.map_err(storage_err)?;
                let (node, prop_key) = k.value();
                if prop_key == key {
                    entries.push((node, v.value().to_string()));
                }
            }

            let mut index = write_txn.open_table(PROPERTY_INDEX).map_err(storage_err)?;
            for (node, value) in &entries {
                index
                    .insert((key, value.as_str(), *node), *node)
                    .map_err(storage_err)?;
            }

            let mut indexes = write_txn.open_table(INDEXES).map_err(storage_err)?;
            indexes.insert(key, INDEX_ONLINE).map_err(storage_err)?;
            tracing::debug!(key, entries = entries.len(), "Populated property index");
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn pending_indexes(&self) -> Result<Vec<String>, BenchError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(INDEXES).map_err(storage_err)?;
        let mut pending = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, state) = entry.map_err(storage_err)?;
            if state.value() != INDEX_ONLINE {
                pending.push(key.value().to_string());
            }
        }
        Ok(pending)
    }
}

impl Drop for RedbStore {
    fn drop(&mut self) {
        if !self.shut_down {
            tracing::debug!(path = %self.path.display(), "Shutdown hook releasing graph store");
        }
    }
}

// =============================================================================
// READ VIEW
// =============================================================================

/// A redb read transaction with every table opened once up front.
///
/// Queries inside a transaction window reuse these handles, so per-query cost
/// is the lookups themselves.
pub struct RedbView {
    txn: ReadTransaction,
    nodes: ReadOnlyTable<u64, u64>,
    relationships: ReadOnlyTable<(u64, u64), &'static [u8]>,
    properties: ReadOnlyTable<(u64, &'static str), &'static str>,
    property_index: ReadOnlyTable<(&'static str, &'static str, u64), u64>,
    indexes: ReadOnlyTable<&'static str, u8>,
}

impl std::fmt::Debug for RedbView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbView").finish_non_exhaustive()
    }
}

impl GraphView for RedbView {
    fn contains_node(&self, id: NodeId) -> Result<bool, BenchError> {
        Ok(self.nodes.get(id.0).map_err(storage_err)?.is_some())
    }

    fn outgoing(&self, node: NodeId) -> Result<Vec<Relationship>, BenchError> {
        if !self.contains_node(node)? {
            return Err(BenchError::NodeNotFound(node));
        }

        let mut rels = Vec::new();
        for entry in self
            .relationships
            .range((node.0, 0u64)..=(node.0, u64::MAX))
            .map_err(storage_err)?
        {
            let (_, data) = entry.map_err(storage_err)?;
            let rel: Relationship = postcard::from_bytes(data.value())
                .map_err(|e| BenchError::Serialization(e.to_string()))?;
            rels.push(rel);
        }
        Ok(rels)
    }

    fn property(&self, node: NodeId, key: &str) -> Result<Option<String>, BenchError> {
        Ok(self
            .properties
            .get((node.0, key))
            .map_err(storage_err)?
            .map(|v| v.value().to_string()))
    }

    fn find_nodes(&self, key: &str, value: &str) -> Result<Vec<NodeId>, BenchError> {
        let state = self.indexes.get(key).map_err(storage_err)?.map(|v| v.value());
        if state != Some(INDEX_ONLINE) {
            return Err(BenchError::IndexMissing(key.to_string()));
        }

        let mut hits = Vec::new();
        for entry in self
            .property_index
            .range((key, value, 0u64)..=(key, value, u64::MAX))
            .map_err(storage_err)?
        {
            let (_, node) = entry.map_err(storage_err)?;
            hits.push(NodeId(node.value()));
        }
        Ok(hits)
    }

    fn commit(self) -> Result<(), BenchError> {
        let Self {
            txn,
            nodes,
            relationships,
            properties,
            property_index,
            indexes,
        } = self;
        // close() refuses while tables still reference the transaction.
        drop((nodes, relationships, properties, property_index, indexes));
        txn.close().map_err(storage_err)
    }
}

// =============================================================================
// GRAPHSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl GraphStore for RedbStore {
    type View<'a> = RedbView;

    fn begin(&self) -> Result<Self::View<'_>, BenchError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let nodes = txn.open_table(NODES).map_err(storage_err)?;
        let relationships = txn.open_table(RELATIONSHIPS).map_err(storage_err)?;
        let properties = txn.open_table(PROPERTIES).map_err(storage_err)?;
        let property_index = txn.open_table(PROPERTY_INDEX).map_err(storage_err)?;
        let indexes = txn.open_table(INDEXES).map_err(storage_err)?;
        Ok(RedbView {
            txn,
            nodes,
            relationships,
            properties,
            property_index,
            indexes,
        })
    }

    fn await_indexes(&self, timeout: Duration) -> Result<(), BenchError> {
        let started = Instant::now();
        loop {
            let pending = self.pending_indexes()?;
            if pending.is_empty() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(BenchError::IndexNotReady(pending.join(", ")));
            }
            std::thread::sleep(Duration::from_millis(INDEX_POLL_INTERVAL_MILLIS));
        }
    }

    fn create_index(&mut self, key: &str) -> Result<(), BenchError> {
        match self.index_state(key)? {
            Some(INDEX_ONLINE) => return Ok(()),
            Some(_) => tracing::info!(key, "Resuming interrupted index population"),
            None => self.register_index(key)?,
        }
        self.populate_index(key)
    }

    fn apply(&mut self, batch: &GraphBatch) -> Result<(), BenchError> {
        if batch.is_empty() {
            return Ok(());
        }

        let batch_nodes: BTreeSet<NodeId> = batch.nodes.iter().map(|(id, _)| *id).collect();
        let mut current_next_id = self.next_relationship_id;

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(storage_err)?;
            let mut rels = write_txn.open_table(RELATIONSHIPS).map_err(storage_err)?;
            let mut props = write_txn.open_table(PROPERTIES).map_err(storage_err)?;
            let mut index = write_txn.open_table(PROPERTY_INDEX).map_err(storage_err)?;
            let indexes = write_txn.open_table(INDEXES).map_err(storage_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;

            // Validate every endpoint before touching the database.
            // Dropping the write transaction uncommitted discards the batch.
            for (start, end) in &batch.relationships {
                for endpoint in [*start, *end] {
                    let known = batch_nodes.contains(&endpoint)
                        || nodes.get(endpoint.0).map_err(storage_err)?.is_some();
                    if !known {
                        return Err(BenchError::NodeNotFound(endpoint));
                    }
                }
            }

            // Pass 1: nodes and properties.
            for (id, properties) in &batch.nodes {
                if nodes.get(id.0).map_err(storage_err)?.is_none() {
                    nodes.insert(id.0, 0u64).map_err(storage_err)?;
                }

                for (key, value) in properties {
                    let previous = props
                        .get((id.0, key.as_str()))
                        .map_err(storage_err)?
                        .map(|v| v.value().to_string());
                    props
                        .insert((id.0, key.as_str()), value.as_str())
                        .map_err(storage_err)?;

                    if indexes.get(key.as_str()).map_err(storage_err)?.is_some() {
                        if let Some(old) = previous {
                            index
                                .remove((key.as_str(), old.as_str(), id.0))
                                .map_err(storage_err)?;
                        }
                        index
                            .insert((key.as_str(), value.as_str(), id.0), id.0)
                            .map_err(storage_err)?;
                    }
                }
            }

            // Pass 2: relationships.
            for (start, end) in &batch.relationships {
                let rel = Relationship::new(RelationshipId(current_next_id), *start, *end);
                current_next_id = current_next_id.saturating_add(1);

                let bytes = postcard::to_allocvec(&rel)
                    .map_err(|e| BenchError::Serialization(e.to_string()))?;
                rels.insert((start.0, rel.id.0), bytes.as_slice())
                    .map_err(storage_err)?;

                let degree = nodes
                    .get(start.0)
                    .map_err(storage_err)?
                    .map(|v| v.value())
                    .unwrap_or(0);
                nodes
                    .insert(start.0, degree.saturating_add(1))
                    .map_err(storage_err)?;
            }

            meta.insert(NEXT_RELATIONSHIP_ID, current_next_id)
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        // Update in-memory state only after successful commit.
        self.next_relationship_id = current_next_id;
        Ok(())
    }
}
