//! # Property-Based Tests
//!
//! Invariants of query parsing, cyclic replay and strategy agreement.

use neighbor_bench_core::{
    GraphBatch, GraphStore, IndexedResolver, MemoryGraph, NeighborResolver, NodeId,
    QuerySequence, QuerySpec, RedbStore, ScanResolver, load, parse_line,
};
use proptest::collection::vec;
use proptest::prelude::*;

const VALUES: [&str; 3] = ["red", "green", "blue"];

/// Nodes `0..node_count`, each with optional `name0` / `name1` drawn from
/// `VALUES`, plus the given edges (endpoints reduced modulo node count).
fn build_batch(
    props: &[(Option<usize>, Option<usize>)],
    edges: &[(u64, u64)],
) -> GraphBatch {
    let n = props.len() as u64;
    let mut batch = GraphBatch::new();
    for (id, (p0, p1)) in props.iter().enumerate() {
        let mut properties = Vec::new();
        if let Some(v) = p0 {
            properties.push(("name0", VALUES[*v]));
        }
        if let Some(v) = p1 {
            properties.push(("name1", VALUES[*v]));
        }
        batch.add_node(NodeId(id as u64), properties);
    }
    for (start, end) in edges {
        batch.add_relationship(NodeId(start % n), NodeId(end % n));
    }
    batch
}

fn graph_strategy() -> impl Strategy<Value = (Vec<(Option<usize>, Option<usize>)>, Vec<(u64, u64)>)>
{
    (
        vec((proptest::option::of(0usize..3), proptest::option::of(0usize..3)), 1..30),
        vec((0u64..1000, 0u64..1000), 0..120),
    )
}

proptest! {
    /// A well-formed line parses back to the fields it was written from.
    #[test]
    fn loader_round_trip(
        node in any::<u64>(),
        attr in any::<u32>(),
        value in "[a-zA-Z0-9 _.-]{1,16}",
    ) {
        let line = format!("{},{},{}", node, attr, value);
        let parsed = parse_line(&line, 1).expect("parse");
        prop_assert_eq!(parsed, QuerySpec::new(NodeId(node), attr, value));
    }

    /// A written query file loads back line for line, in order.
    #[test]
    fn load_returns_every_line_of_a_written_file(
        rows in vec((any::<u64>(), any::<u32>(), "[a-zA-Z0-9 _.-]{1,16}"), 1..50),
    ) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("queries.txt");
        let body: String = rows
            .iter()
            .map(|(node, attr, value)| format!("{},{},{}\n", node, attr, value))
            .collect();
        std::fs::write(&path, body).expect("write");

        let loaded = load(&path).expect("load");
        prop_assert_eq!(loaded.len(), rows.len());
        for (query, (node, attr, value)) in loaded.as_slice().iter().zip(&rows) {
            prop_assert_eq!(query, &QuerySpec::new(NodeId(*node), *attr, value.as_str()));
        }
    }

    /// Query `i` is always entry `i mod len`, well past the end of the file.
    #[test]
    fn cyclic_indexing_up_to_ten_laps(len in 1usize..40) {
        let queries: Vec<QuerySpec> = (0..len)
            .map(|i| QuerySpec::new(NodeId(i as u64), 0, format!("v{}", i)))
            .collect();
        let seq = QuerySequence::new(queries.clone());

        for i in 0..(10 * len) as u64 {
            let got = seq.cyclic(i).expect("non-empty");
            prop_assert_eq!(got, &queries[(i % len as u64) as usize]);
        }
    }

    /// Scan and indexed resolution agree on arbitrary in-memory graphs.
    #[test]
    fn strategies_agree_in_memory(
        (props, edges) in graph_strategy(),
        probes in vec((0u64..1000, 0u32..2, 0usize..3), 1..20),
    ) {
        let mut graph = MemoryGraph::new();
        graph.apply(&build_batch(&props, &edges)).expect("apply");
        graph.create_index("name0").expect("index");
        graph.create_index("name1").expect("index");

        let view = graph.begin().expect("begin");
        let n = props.len() as u64;
        for (node, attr, value) in probes {
            let query = QuerySpec::new(NodeId(node % n), attr, VALUES[value]);
            let scan = ScanResolver.resolve(&view, &query).expect("scan");
            let indexed = IndexedResolver.resolve(&view, &query).expect("indexed");
            prop_assert_eq!(scan, indexed);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Same agreement on the persistent store, with the index built after
    /// the data (backfill path).
    #[test]
    fn strategies_agree_on_redb(
        (props, edges) in graph_strategy(),
        probes in vec((0u64..1000, 0u32..2, 0usize..3), 1..10),
    ) {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = RedbStore::open(dir.path().join("graph.redb")).expect("open");
        store.apply(&build_batch(&props, &edges)).expect("apply");
        store.create_index("name0").expect("index");
        store.create_index("name1").expect("index");

        {
            let view = store.begin().expect("begin");
            let n = props.len() as u64;
            for (node, attr, value) in probes {
                let query = QuerySpec::new(NodeId(node % n), attr, VALUES[value]);
                let scan = ScanResolver.resolve(&view, &query).expect("scan");
                let indexed = IndexedResolver.resolve(&view, &query).expect("indexed");
                prop_assert_eq!(scan, indexed);
            }
        }
        store.shutdown();
    }
}
