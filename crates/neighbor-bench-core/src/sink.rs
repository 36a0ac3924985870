//! # Result Sink
//!
//! Streams measurement records to durable output in append order.
//!
//! Each record becomes one line `<resultCount>,<latencyMicros>`, written as
//! soon as the query finishes. `close` flushes and releases the handle; if a
//! sink is dropped without `close` (an abort path) the drop flushes instead,
//! so the handle is released exactly once either way.

use crate::{BenchError, MeasurementRecord, NeighborSet, QuerySpec};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn closed() -> BenchError {
    BenchError::Io("sink already closed".to_string())
}

// =============================================================================
// RESULT SINK
// =============================================================================

/// Writer for `<count>,<micros>` measurement lines.
#[derive(Debug)]
pub struct ResultSink<W: Write> {
    writer: Option<BufWriter<W>>,
    records: u64,
}

impl ResultSink<File> {
    /// Create (truncate) the output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| BenchError::Io(format!("Create '{}': {}", path.display(), e)))?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ResultSink<W> {
    /// Wrap any writer.
    pub fn new(inner: W) -> Self {
        Self {
            writer: Some(BufWriter::new(inner)),
            records: 0,
        }
    }

    /// Append one record.
    pub fn write_record(&mut self, record: MeasurementRecord) -> Result<(), BenchError> {
        let writer = self.writer.as_mut().ok_or_else(closed)?;
        writeln!(writer, "{}", record)?;
        self.records = self.records.saturating_add(1);
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush and release the underlying writer.
    pub fn close(mut self) -> Result<W, BenchError> {
        let writer = self.writer.take().ok_or_else(closed)?;
        writer
            .into_inner()
            .map_err(|e| BenchError::Io(e.error().to_string()))
    }
}

impl<W: Write> Drop for ResultSink<W> {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                tracing::error!("Flushing result sink on abort failed: {}", e);
            }
        }
    }
}

// =============================================================================
// RESULT DUMP
// =============================================================================

/// Per-query answer dump for checking correctness across strategies.
///
/// Two lines per recorded query:
///
/// ```text
/// id 0 attr 0 query x
/// 1 7 12
/// ```
#[derive(Debug)]
pub struct ResultDump<W: Write> {
    writer: Option<BufWriter<W>>,
}

impl ResultDump<File> {
    /// Create (truncate) the dump file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| BenchError::Io(format!("Create '{}': {}", path.display(), e)))?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ResultDump<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Some(BufWriter::new(inner)),
        }
    }

    /// Write the query and its neighbors in ascending id order.
    pub fn write_result(
        &mut self,
        query: &QuerySpec,
        result: &NeighborSet,
    ) -> Result<(), BenchError> {
        let writer = self.writer.as_mut().ok_or_else(closed)?;
        writeln!(
            writer,
            "id {} attr {} query {}",
            query.node_id, query.attribute_index, query.search_value
        )?;
        let ids: Vec<String> = result.iter().map(|n| n.to_string()).collect();
        writeln!(writer, "{}", ids.join(" "))?;
        Ok(())
    }

    /// Flush and release the underlying writer.
    pub fn close(mut self) -> Result<W, BenchError> {
        let writer = self.writer.take().ok_or_else(closed)?;
        writer
            .into_inner()
            .map_err(|e| BenchError::Io(e.error().to_string()))
    }
}

impl<W: Write> Drop for ResultDump<W> {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                tracing::error!("Flushing result dump on abort failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    #[test]
    fn records_are_written_in_order() {
        let mut sink = ResultSink::new(Vec::new());
        sink.write_record(MeasurementRecord::new(1, 15)).expect("write");
        sink.write_record(MeasurementRecord::new(4, 0)).expect("write");
        assert_eq!(sink.records_written(), 2);

        let out = sink.close().expect("close");
        assert_eq!(String::from_utf8(out).expect("utf8"), "1,15\n4,0\n");
    }

    #[test]
    fn drop_without_close_flushes_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.csv");
        {
            let mut sink = ResultSink::create(&path).expect("create");
            sink.write_record(MeasurementRecord::new(2, 9)).expect("write");
        }
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "2,9\n");
    }

    #[test]
    fn dump_lists_sorted_ids() {
        let mut dump = ResultDump::new(Vec::new());
        let result: NeighborSet = [NodeId(7), NodeId(1)].into_iter().collect();
        dump.write_result(&QuerySpec::new(NodeId(0), 2, "v"), &result)
            .expect("write");

        let out = dump.close().expect("close");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "id 0 attr 2 query v\n1 7\n"
        );
    }
}
