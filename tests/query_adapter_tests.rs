//! Property tests for the query dialect adapter.
//!
//! Uses proptest to verify invariants across generated queries:
//! - Adapting never panics, whatever the input
//! - Adapting an adapted query is a no-op
//! - Rejections carry stable reason names

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use codegraph_store::{QueryDialectAdapter, UnsupportedFeature};
use proptest::prelude::*;

/// Query fragments in the canonical dialect the adapter can translate.
const FRAGMENTS: &[&str] = &[
    "MATCH (f:File {filePath: $path})",
    "MATCH (a:Function)-[r:CALLS]->(b)",
    "MATCH (a)-[:CALLS_EXTERNAL]->(b)",
    "MATCH (c:Class)-[:INHERITS]->(base)",
    "MATCH (f)-[:IMPORTS|CONTAINS]->(m)",
    "MATCH (f)-[:CONTAINS*1..3]->(n)",
    "WHERE n.lineStart > 10 AND n.isAsync = true",
    "WHERE n.name = 'filePath' OR n.docstring CONTAINS \"lineEnd\"",
    "WITH n, toLower(n.name) AS lowered",
    "SET n.lastModified = $ts",
    "RETURN n.qualifiedName AS qualifiedName, n.returnType",
    "RETURN elementId(n) AS id, toInteger(n.loc)",
    "RETURN count(r) AS calls",
    "// trailing comment with filePath",
    "/* block comment */",
    "ORDER BY n.lineStart LIMIT 10",
];

fn query() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS.to_vec()), 1..8)
        .prop_map(|parts| parts.join("\n"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// Property: adapt never panics on arbitrary input.
    #[test]
    fn prop_adapt_never_panics(s in any::<String>()) {
        let _ = QueryDialectAdapter::default().adapt(&s);
    }

    /// Property: adapting twice equals adapting once.
    #[test]
    fn prop_adapt_is_idempotent(q in query()) {
        let adapter = QueryDialectAdapter::default();
        let once = adapter.adapt(&q).unwrap();
        let twice = adapter.adapt(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: no canonical property spelling survives in code positions.
    #[test]
    fn prop_renamed_properties_do_not_survive(q in query()) {
        let adapted = QueryDialectAdapter::default().adapt(&q).unwrap();
        for canonical in [".filePath", ".lineStart", ".isAsync", ".lastModified", ".returnType"] {
            prop_assert!(!adapted.contains(canonical), "{} in {}", canonical, adapted);
        }
    }

    /// Property: an unsupported construct anywhere is rejected.
    #[test]
    fn prop_shortest_path_always_rejected(q in query()) {
        let with_path = format!("{q}\nMATCH p = shortestPath((a)-[*]-(b)) RETURN p");
        let err = QueryDialectAdapter::default().adapt(&with_path).unwrap_err();
        prop_assert_eq!(err, UnsupportedFeature::ShortestPath);
    }
}

#[test]
fn test_shortest_path_reason_is_stable() {
    let err = QueryDialectAdapter::default()
        .adapt("MATCH p = shortestPath((a:Function)-[:CALLS*]->(b:Function)) RETURN length(p)")
        .unwrap_err();
    assert_eq!(err.reason(), "shortest_path");
}

#[test]
fn test_reason_names() {
    let reasons: Vec<&str> = UnsupportedFeature::all().iter().map(|f| f.reason()).collect();
    assert_eq!(
        reasons,
        [
            "shortest_path",
            "order_by_internal_id",
            "filtered_comprehension",
            "list_slice",
            "coalesce_empty_map",
        ]
    );
}

#[test]
fn test_commented_out_constructs_are_not_rejected() {
    let adapted = QueryDialectAdapter::default()
        .adapt("MATCH (n) // shortestPath((a)-[*]-(b))\nRETURN n.filePath")
        .unwrap();
    assert_eq!(adapted.trim_end(), "MATCH (n) \nRETURN n.file_path");
}
