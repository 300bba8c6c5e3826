//! Networked store integration tests.
//!
//! These tests require a running Neo4j-compatible server. Set
//! `CODEGRAPH_TEST_NEO4J_URI` (and optionally the credential variables) to
//! enable them:
//!
//! ```bash
//! export CODEGRAPH_TEST_NEO4J_URI="bolt://localhost:7687"
//! export CODEGRAPH_TEST_NEO4J_PASSWORD="secret"
//! cargo test --test network_store_integration
//! ```
//!
//! Every test writes under its own qualified-name prefix so the suite can
//! share one database with parallel test threads.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::print_stderr
)]
#![cfg(feature = "neo4j")]

use codegraph_store::storage::NetworkGraphStore;
use codegraph_store::{
    Entity, ErrorKind, GraphStore, NetworkStoreConfig, NodeType, Params, Relationship,
    RelationshipType,
};
use serde_json::json;
use std::env;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Environment variable for the test server URI.
const NEO4J_URI_ENV: &str = "CODEGRAPH_TEST_NEO4J_URI";

fn get_neo4j_uri() -> Option<String> {
    env::var(NEO4J_URI_ENV).ok()
}

/// Macro to skip tests when no server is available.
macro_rules! require_neo4j {
    () => {
        match get_neo4j_uri() {
            Some(uri) => connect(&uri),
            None => {
                eprintln!(
                    "Skipping test: {} not set. Set this environment variable to run Neo4j tests.",
                    NEO4J_URI_ENV
                );
                return;
            },
        }
    };
}

fn connect(uri: &str) -> NetworkGraphStore {
    let username = env::var("CODEGRAPH_TEST_NEO4J_USER").unwrap_or_else(|_| "neo4j".into());
    let password = env::var("CODEGRAPH_TEST_NEO4J_PASSWORD").unwrap_or_default();
    let config = NetworkStoreConfig::default()
        .with_uri(uri)
        .with_credentials(username, password)
        .with_max_retries(2);
    NetworkGraphStore::connect(config).expect("connect to test server")
}

fn unique_prefix(test: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("t{}_{nanos}_{test}", std::process::id())
}

#[test]
fn test_create_then_query_by_qualified_name() {
    let store = require_neo4j!();
    let qn = format!("{}.mod.foo", unique_prefix("create"));
    let entity = Entity::new(NodeType::Function, &qn, "foo").with_location("pkg/mod.py", 10, 24);
    assert_eq!(store.create_node(&entity).unwrap(), qn);

    let mut params = Params::new();
    params.insert("qn".into(), json!(qn));
    let rows = store
        .execute_query(
            "MATCH (n:Function {qualifiedName: $qn}) \
             RETURN n.name AS name, n.lineStart AS lineStart, n.lineEnd AS lineEnd",
            &params,
            None,
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "foo");
    assert_eq!(rows[0]["lineStart"], 10);
    assert_eq!(rows[0]["lineEnd"], 24);

    let node = store.get_node(&qn).unwrap().unwrap();
    assert_eq!(node.node_type, Some(NodeType::Function));
    assert!(!node.external);
}

#[test]
fn test_unknown_target_gets_external_placeholder() {
    let store = require_neo4j!();
    let prefix = unique_prefix("placeholder");
    let caller = format!("{prefix}.mod.bar");
    let missing = format!("{prefix}.ext.thing");
    store
        .create_node(&Entity::new(NodeType::Function, &caller, "bar"))
        .unwrap();

    let rel = Relationship::new(&caller, &missing, RelationshipType::Calls).with_property("line", 3);
    assert!(store.create_relationship(&rel).unwrap());

    let placeholder = store.get_node(&missing).unwrap().unwrap();
    assert!(placeholder.external);
    assert_eq!(placeholder.node_type, None);

    // Ingesting the real entity claims the placeholder.
    store
        .batch_create_nodes(&[Entity::new(NodeType::Function, &missing, "thing")])
        .unwrap();
    let mut params = Params::new();
    params.insert("qn".into(), json!(missing));
    let rows = store
        .execute_query(
            "MATCH (n {qualifiedName: $qn}) \
             OPTIONAL MATCH (:Function)-[r:CALLS]->(n) \
             RETURN count(DISTINCT n) AS nodes, count(r) AS edges",
            &params,
            None,
        )
        .unwrap();
    assert_eq!(rows[0]["nodes"], 1);
    assert_eq!(rows[0]["edges"], 1);
    let node = store.get_node(&missing).unwrap().unwrap();
    assert_eq!(node.node_type, Some(NodeType::Function));
}

#[test]
fn test_delete_file_removes_contained_entities_only() {
    let store = require_neo4j!();
    let prefix = unique_prefix("delete");
    let file_path = format!("{prefix}/mod.py");
    let other_path = format!("{prefix}/other.py");
    let survivor = format!("{prefix}.other.baz");

    let mut entities = vec![Entity::file(&file_path), Entity::file(&other_path)];
    entities.push(Entity::new(NodeType::Class, format!("{prefix}.mod.W"), "W"));
    for name in ["f", "g"] {
        entities.push(Entity::new(
            NodeType::Function,
            format!("{prefix}.mod.{name}"),
            name,
        ));
    }
    entities.push(Entity::new(NodeType::Function, &survivor, "baz"));
    assert_eq!(store.batch_create_nodes(&entities).unwrap().len(), 6);

    let rels: Vec<Relationship> = ["W", "f", "g"]
        .iter()
        .map(|n| {
            Relationship::new(
                &file_path,
                format!("{prefix}.mod.{n}"),
                RelationshipType::Contains,
            )
        })
        .chain([Relationship::new(
            &other_path,
            &survivor,
            RelationshipType::Contains,
        )])
        .collect();
    assert_eq!(store.batch_create_relationships(&rels).unwrap(), 4);

    assert_eq!(store.delete_file_entities(&file_path).unwrap(), 4);
    assert!(store.get_node(&format!("{prefix}.mod.f")).unwrap().is_none());
    assert!(store.get_node(&survivor).unwrap().is_some());
    assert!(store.get_all_file_paths().unwrap().contains(&other_path));
}

#[test]
fn test_module_upsert_is_idempotent() {
    let store = require_neo4j!();
    let qn = unique_prefix("module");
    let module = Entity::new(NodeType::Module, &qn, &qn);
    store.create_node(&module).unwrap();
    store.create_node(&module).unwrap();

    let mut params = Params::new();
    params.insert("qn".into(), json!(qn));
    let rows = store
        .execute_query(
            "MATCH (m:Module {qualifiedName: $qn}) RETURN count(m) AS c",
            &params,
            None,
        )
        .unwrap();
    assert_eq!(rows[0]["c"], 1);
}

#[test]
fn test_syntax_error_is_not_masked_by_safe_query() {
    let store = require_neo4j!();
    let err = store
        .execute_query("MATCH (n RETURN n", &Params::new(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryFailed);

    let err = store
        .execute_query_safe(
            "MATCH (n RETURN n",
            &Params::new(),
            Some(Duration::from_secs(5)),
            Vec::new(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryFailed);
}

#[test]
fn test_pool_metrics_reflect_config() {
    let store = require_neo4j!();
    store.ensure_indexes().unwrap();
    let metrics = store.pool_metrics().unwrap();
    assert_eq!(metrics.in_use, 0);
    assert_eq!(metrics.max_pool_size, 50);
    assert_eq!(metrics.query_timeout_ms, 60_000);
    assert_eq!(store.backend_name(), "neo4j");
}
