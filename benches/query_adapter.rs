//! Benchmarks for the dialect adapter and identifier validation.
//!
//! Both run on every embedded query or interpolated token, so they sit on
//! the hot path of bulk ingestion.

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use codegraph_store::{QueryDialectAdapter, validate_identifier};
use std::hint::black_box;
use std::time::Duration;

const SIMPLE_QUERY: &str = "MATCH (f:File {filePath: $path}) RETURN f.hash";
const CALL_GRAPH_QUERY: &str = "MATCH (f:File {filePath: $path})-[:CONTAINS]->(fn:Function) \
    OPTIONAL MATCH (fn)-[r:CALLS]->(callee) \
    WHERE fn.lineStart > 0 AND fn.isAsync = false \
    RETURN fn.qualifiedName AS qualifiedName, fn.lineStart AS lineStart, \
    fn.lineEnd AS lineEnd, count(r) AS calls \
    ORDER BY lineStart";
const COMMENTED_QUERY: &str = "// find imports of 'filePath'\n\
    MATCH (f:File)-[:IMPORTS|CONTAINS]->(m) /* lastModified */ \
    WHERE f.name = \"lineStart\" RETURN m.qualifiedName, f.lastModified";
const REJECTED_QUERY: &str =
    "MATCH p = shortestPath((a:Function)-[:CALLS*]->(b:Function)) RETURN length(p)";

fn bench_adapt(c: &mut Criterion) {
    let mut group = c.benchmark_group("adapt");
    group.measurement_time(Duration::from_secs(5));
    let adapter = QueryDialectAdapter::default();

    for (name, query) in [
        ("simple", SIMPLE_QUERY),
        ("call_graph", CALL_GRAPH_QUERY),
        ("commented", COMMENTED_QUERY),
        ("rejected", REJECTED_QUERY),
    ] {
        group.throughput(Throughput::Bytes(query.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), query, |b, q| {
            b.iter(|| adapter.adapt(black_box(q)));
        });
    }

    group.finish();
}

fn bench_adapt_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("adapt_scaling");
    let adapter = QueryDialectAdapter::default();

    for repeat in [1usize, 10, 100] {
        let query = vec![CALL_GRAPH_QUERY; repeat].join("\nUNION ALL\n");
        group.throughput(Throughput::Bytes(query.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(repeat), &query, |b, q| {
            b.iter(|| adapter.adapt(black_box(q)));
        });
    }

    group.finish();
}

fn bench_validate_identifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_identifier");
    let long = "a".repeat(100);
    let too_long = "a".repeat(101);

    for (name, candidate) in [
        ("label", "Function"),
        ("rel_type", "CALLS_EXT_FUNC"),
        ("max_length", long.as_str()),
        ("too_long", too_long.as_str()),
        ("injection", "Function` DETACH DELETE n //"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), candidate, |b, s| {
            b.iter(|| validate_identifier(black_box(s), "bench"));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_adapt,
    bench_adapt_scaling,
    bench_validate_identifier
);
criterion_main!(benches);
