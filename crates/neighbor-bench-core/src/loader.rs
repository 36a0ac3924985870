//! # Query Spec Loader
//!
//! Parses query files into ordered `QuerySequence`s.
//!
//! Format: one query per line, `nodeId,attributeIndex,searchValue`, no
//! header and no quoting. Parsing is strict:
//! - exactly three fields (a comma inside the value is a format error)
//! - integer fields are not trimmed or defaulted
//! - the search value must be non-empty
//! - a bad line aborts the load; lines are never skipped

use crate::primitives::FIELD_DELIMITER;
use crate::{BenchError, NodeId, QuerySpec};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

// =============================================================================
// QUERY SEQUENCE
// =============================================================================

/// An ordered, replayable list of queries.
///
/// Logical query `i` is `queries[i mod len]`, so a phase longer than the
/// file replays it from the top.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuerySequence {
    queries: Vec<QuerySpec>,
}

impl QuerySequence {
    /// Wrap an already parsed list of queries.
    #[must_use]
    pub fn new(queries: Vec<QuerySpec>) -> Self {
        Self { queries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// The query at logical index `i`, wrapping around the sequence.
    ///
    /// `None` only when the sequence is empty.
    #[must_use]
    pub fn cyclic(&self, i: u64) -> Option<&QuerySpec> {
        if self.queries.is_empty() {
            return None;
        }
        let idx = (i % self.queries.len() as u64) as usize;
        self.queries.get(idx)
    }

    /// Queries in file order.
    #[must_use]
    pub fn as_slice(&self) -> &[QuerySpec] {
        &self.queries
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse one query line. `line_no` is 1-based and only used in errors.
pub fn parse_line(line: &str, line_no: usize) -> Result<QuerySpec, BenchError> {
    let malformed = |reason: String| BenchError::MalformedQuery {
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() != 3 {
        return Err(malformed(format!(
            "expected 3 comma-separated fields, found {}",
            fields.len()
        )));
    }

    let node_id: u64 = fields[0]
        .parse()
        .map_err(|e| malformed(format!("node id '{}': {}", fields[0], e)))?;
    let attribute_index: u32 = fields[1]
        .parse()
        .map_err(|e| malformed(format!("attribute index '{}': {}", fields[1], e)))?;
    let search_value = fields[2];
    if search_value.is_empty() {
        return Err(malformed("empty search value".to_string()));
    }

    Ok(QuerySpec::new(NodeId(node_id), attribute_index, search_value))
}

/// Load a query file.
///
/// Reads the whole file; the first malformed line fails the load.
pub fn load(path: impl AsRef<Path>) -> Result<QuerySequence, BenchError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| BenchError::Io(format!("Cannot open '{}': {}", path.display(), e)))?;

    let mut queries = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line
            .map_err(|e| BenchError::Io(format!("Read '{}': {}", path.display(), e)))?;
        queries.push(parse_line(&line, idx + 1)?);
    }

    tracing::debug!(path = %path.display(), queries = queries.len(), "Loaded query file");
    Ok(QuerySequence::new(queries))
}
