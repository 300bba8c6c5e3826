//! Networked graph store over Bolt.
//!
//! The public API is blocking. A store-owned multi-thread runtime drives the
//! async driver; every logical operation checks a session out of the shared
//! pool, so one store may be used from many threads at once.

use super::bolt::to_bolt;
use super::cypher;
use super::pool::PoolTracker;
use crate::config::{BoltUri, NetworkStoreConfig};
use crate::models::{
    Entity, FileMetadata, GraphStats, NodeSummary, NodeType, Params, PoolMetrics, Record,
    Relationship, RelationshipType, record_i64, record_str, short_name,
};
use crate::observability::{
    record_batch_row_failure, record_operation_metrics, status_label,
};
use crate::storage::resilience::{RetryPolicy, is_transient_failure, retry_transient};
use crate::storage::traits::GraphStore;
use crate::{Error, ErrorKind, Result};
use neo4rs::{ConfigBuilder, Graph, query};
use parking_lot::RwLock;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::instrument;

const BACKEND: &str = "neo4j";

/// Rows bound per bulk statement.
const BATCH_CHUNK_SIZE: usize = 1000;

struct PoolState {
    graph: Graph,
    created: Instant,
}

/// Graph store backed by a Neo4j-compatible server.
pub struct NetworkGraphStore {
    config: NetworkStoreConfig,
    target: BoltUri,
    policy: RetryPolicy,
    tracker: PoolTracker,
    pool: RwLock<PoolState>,
    runtime: BoltRuntime,
}

impl NetworkGraphStore {
    /// Connects with bounded retry and verifies connectivity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a bad URI and
    /// [`Error::ConnectionUnavailable`] once the attempt budget is spent.
    pub fn connect(config: NetworkStoreConfig) -> Result<Self> {
        let target = config.bolt_uri()?;
        let runtime = BoltRuntime::new()?;
        let policy = RetryPolicy::from_config(&config);
        let tracker = PoolTracker::new(&config);

        let graph = runtime.block_on("connect", connect_with_retry(&config, &target, policy))?;
        tracing::info!(target = %target, "Connected to graph server");

        Ok(Self {
            config,
            target,
            policy,
            tracker,
            pool: RwLock::new(PoolState {
                graph,
                created: Instant::now(),
            }),
            runtime,
        })
    }

    /// Returns the validated connection target.
    #[must_use]
    pub const fn target(&self) -> &BoltUri {
        &self.target
    }

    /// Connection pool snapshot.
    #[must_use]
    pub fn get_pool_metrics(&self) -> PoolMetrics {
        self.tracker.snapshot(self.pool.read().created)
    }

    /// Returns the live graph handle, rebuilding the pool when it has
    /// outlived the configured connection lifetime.
    fn current_graph(&self) -> Result<Graph> {
        {
            let state = self.pool.read();
            if !self.tracker.is_expired(state.created) {
                return Ok(state.graph.clone());
            }
        }
        let mut state = self.pool.write();
        if self.tracker.is_expired(state.created) {
            tracing::info!(
                age_secs = state.created.elapsed().as_secs(),
                "Recycling graph connection pool"
            );
            state.graph = self.runtime.block_on(
                "connect",
                connect_with_retry(&self.config, &self.target, self.policy),
            )?;
            state.created = Instant::now();
        }
        Ok(state.graph.clone())
    }

    /// Runs one statement with retry and timeout, collecting all rows.
    fn run(
        &self,
        operation: &'static str,
        text: &str,
        params: &Params,
        timeout: Option<Duration>,
    ) -> Result<Vec<Record>> {
        let start = Instant::now();
        let graph = self.current_graph()?;
        let timeout = timeout.unwrap_or_else(|| self.config.query_timeout());
        let _session = self.tracker.checkout();
        let target = self.target.to_string();

        let result = self.runtime.block_on(
            operation,
            retry_transient(self.policy, BACKEND, operation, &target, |_| {
                run_once(&graph, operation, text, params, timeout)
            }),
        );
        record_operation_metrics(BACKEND, operation, start, status_label(&result));
        result
    }

    fn count(&self, operation: &'static str, text: &str) -> Result<u64> {
        let rows = self.run(operation, text, &Params::new(), None)?;
        Ok(rows
            .first()
            .and_then(|r| record_i64(r, "count"))
            .and_then(|c| u64::try_from(c).ok())
            .unwrap_or(0))
    }

    /// Writes one node type group chunk by chunk. A rejected chunk is retried
    /// row by row so one bad entity only costs itself; a chunk that timed out
    /// or lost its connection may have committed and is never replayed.
    fn write_node_group(
        &self,
        node_type: NodeType,
        group: &[&Entity],
        ids: &mut HashMap<String, String>,
    ) -> Result<()> {
        let text = cypher::batch_create_nodes(node_type)?;
        for chunk in group.chunks(BATCH_CHUNK_SIZE) {
            let entities: Vec<Value> = chunk
                .iter()
                .map(|e| Value::Object(e.canonical_properties()))
                .collect();
            let mut params = Params::new();
            params.insert("entities".to_string(), Value::Array(entities));
            match self.run("batch_create_nodes", &text, &params, None) {
                Ok(rows) => {
                    for row in rows {
                        if let (Some(qn), Some(id)) =
                            (record_str(&row, "qualified_name"), record_str(&row, "id"))
                        {
                            ids.insert(qn.to_string(), id.to_string());
                        }
                    }
                },
                Err(e) if !allows_row_fallback(&e) => {
                    tracing::warn!(
                        node_type = %node_type,
                        rows = chunk.len(),
                        error = %e,
                        "Bulk node write outcome unknown, not replaying rows"
                    );
                    for _ in chunk {
                        record_batch_row_failure(BACKEND, "batch_create_nodes");
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        node_type = %node_type,
                        rows = chunk.len(),
                        error = %e,
                        "Bulk node write failed, falling back to single rows"
                    );
                    for entity in chunk {
                        match self.create_node(entity) {
                            Ok(id) => {
                                ids.insert(entity.qualified_name.clone(), id);
                            },
                            Err(e) if e.kind() == ErrorKind::InvalidIdentifier => return Err(e),
                            Err(e) => {
                                tracing::warn!(
                                    qualified_name = %entity.qualified_name,
                                    error = %e,
                                    "Skipping node"
                                );
                                record_batch_row_failure(BACKEND, "batch_create_nodes");
                            },
                        }
                    }
                },
            }
        }
        Ok(())
    }

    fn write_relationship_group(
        &self,
        rel_type: RelationshipType,
        group: &[&Relationship],
    ) -> Result<usize> {
        let text = cypher::batch_create_relationships(rel_type)?;
        let mut created = 0;
        for chunk in group.chunks(BATCH_CHUNK_SIZE) {
            let rels: Vec<Value> = chunk
                .iter()
                .map(|r| {
                    Value::Object(cypher::relationship_row(
                        &r.source_id,
                        &r.target_id,
                        r.non_null_properties(),
                    ))
                })
                .collect();
            let mut params = Params::new();
            params.insert("rels".to_string(), Value::Array(rels));
            match self.run("batch_create_relationships", &text, &params, None) {
                Ok(rows) => {
                    created += rows
                        .first()
                        .and_then(|r| record_i64(r, "created"))
                        .and_then(|c| usize::try_from(c).ok())
                        .unwrap_or(0);
                },
                Err(e) if !allows_row_fallback(&e) => {
                    tracing::warn!(
                        rel_type = %rel_type,
                        rows = chunk.len(),
                        error = %e,
                        "Bulk relationship write outcome unknown, not replaying rows"
                    );
                    for _ in chunk {
                        record_batch_row_failure(BACKEND, "batch_create_relationships");
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        rel_type = %rel_type,
                        rows = chunk.len(),
                        error = %e,
                        "Bulk relationship write failed, falling back to single rows"
                    );
                    for rel in chunk {
                        match self.create_relationship(rel) {
                            Ok(true) => created += 1,
                            Ok(false) => {},
                            Err(e) if e.kind() == ErrorKind::InvalidIdentifier => return Err(e),
                            Err(e) => {
                                tracing::warn!(
                                    source = %rel.source_id,
                                    target = %rel.target_id,
                                    error = %e,
                                    "Skipping relationship"
                                );
                                record_batch_row_failure(BACKEND, "batch_create_relationships");
                            },
                        }
                    }
                },
            }
        }
        Ok(created)
    }
}

impl GraphStore for NetworkGraphStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self, params), fields(backend = BACKEND))]
    fn execute_query(
        &self,
        query: &str,
        params: &Params,
        timeout: Option<Duration>,
    ) -> Result<Vec<Record>> {
        self.run("execute_query", query, params, timeout)
    }

    #[instrument(skip(self, entity), fields(backend = BACKEND, qualified_name = %entity.qualified_name))]
    fn create_node(&self, entity: &Entity) -> Result<String> {
        let text = cypher::create_node(entity.node_type)?;
        let mut params = Params::new();
        params.insert(
            "props".to_string(),
            Value::Object(entity.canonical_properties()),
        );
        let rows = self.run("create_node", &text, &params, None)?;
        rows.first()
            .and_then(|r| record_str(r, "id"))
            .map(str::to_string)
            .ok_or_else(|| Error::OperationFailed {
                operation: "create_node".to_string(),
                cause: "server returned no element id".to_string(),
            })
    }

    #[instrument(skip(self, relationship), fields(backend = BACKEND, rel_type = %relationship.rel_type))]
    fn create_relationship_typed(
        &self,
        relationship: &Relationship,
        _source_type: Option<NodeType>,
        _target_type: Option<NodeType>,
    ) -> Result<bool> {
        let text = cypher::create_relationship(relationship.rel_type)?;
        let mut params = Params::new();
        params.insert("source".to_string(), Value::from(relationship.source_id.as_str()));
        params.insert("target".to_string(), Value::from(relationship.target_id.as_str()));
        params.insert(
            "target_name".to_string(),
            Value::from(short_name(&relationship.target_id)),
        );
        params.insert(
            "props".to_string(),
            Value::Object(relationship.non_null_properties()),
        );
        let rows = self.run("create_relationship", &text, &params, None)?;
        Ok(rows
            .first()
            .and_then(|r| record_i64(r, "created"))
            .is_some_and(|c| c > 0))
    }

    #[instrument(skip(self, entities), fields(backend = BACKEND, count = entities.len()))]
    fn batch_create_nodes(&self, entities: &[Entity]) -> Result<HashMap<String, String>> {
        let mut groups: BTreeMap<NodeType, Vec<&Entity>> = BTreeMap::new();
        for entity in entities {
            groups.entry(entity.node_type).or_default().push(entity);
        }

        let mut ids = HashMap::with_capacity(entities.len());
        for (node_type, group) in groups {
            self.write_node_group(node_type, &group, &mut ids)?;
        }
        Ok(ids)
    }

    #[instrument(skip(self, relationships), fields(backend = BACKEND, count = relationships.len()))]
    fn batch_create_relationships(&self, relationships: &[Relationship]) -> Result<usize> {
        let mut groups: BTreeMap<RelationshipType, Vec<&Relationship>> = BTreeMap::new();
        for rel in relationships {
            groups.entry(rel.rel_type).or_default().push(rel);
        }

        let mut created = 0;
        for (rel_type, group) in groups {
            created += self.write_relationship_group(rel_type, &group)?;
        }
        Ok(created)
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn delete_file_entities(&self, file_path: &str) -> Result<usize> {
        let mut params = Params::new();
        params.insert("path".to_string(), Value::from(file_path));
        let rows = self.run("delete_file_entities", cypher::DELETE_FILE_ENTITIES, &params, None)?;
        Ok(rows
            .first()
            .and_then(|r| record_i64(r, "deleted"))
            .and_then(|c| usize::try_from(c).ok())
            .unwrap_or(0))
    }

    fn get_node(&self, qualified_name: &str) -> Result<Option<NodeSummary>> {
        let mut params = Params::new();
        params.insert("qualified_name".to_string(), Value::from(qualified_name));
        let rows = self.run("get_node", cypher::GET_NODE, &params, None)?;
        Ok(rows.first().map(|row| {
            let node_type = row
                .get("labels")
                .and_then(Value::as_array)
                .and_then(|labels| {
                    labels
                        .iter()
                        .filter_map(Value::as_str)
                        .find_map(NodeType::parse)
                });
            NodeSummary {
                qualified_name: qualified_name.to_string(),
                name: record_str(row, "name").map(str::to_string),
                node_type,
                line_start: record_i64(row, "line_start"),
                line_end: record_i64(row, "line_end"),
                external: row.get("external").and_then(Value::as_bool).unwrap_or(false),
            }
        }))
    }

    fn get_stats(&self) -> Result<GraphStats> {
        let node_count = self.count("get_stats", cypher::COUNT_NODES)?;
        let relationship_count = self.count("get_stats", cypher::COUNT_RELATIONSHIPS)?;
        let rows = self.run("get_stats", cypher::COUNT_BY_LABEL, &Params::new(), None)?;
        let nodes_by_type = rows
            .iter()
            .filter_map(|row| {
                let label = record_str(row, "label")?;
                let count = u64::try_from(record_i64(row, "count")?).ok()?;
                Some((label.to_string(), count))
            })
            .collect();
        Ok(GraphStats {
            node_count,
            relationship_count,
            nodes_by_type,
        })
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn clear_graph(&self) -> Result<()> {
        self.run("clear_graph", cypher::CLEAR_GRAPH, &Params::new(), None)?;
        Ok(())
    }

    fn ensure_indexes(&self) -> Result<()> {
        for statement in cypher::index_statements()? {
            self.run("ensure_indexes", &statement, &Params::new(), None)?;
        }
        Ok(())
    }

    fn get_file_metadata(&self, file_path: &str) -> Result<Option<FileMetadata>> {
        let mut params = Params::new();
        params.insert("path".to_string(), Value::from(file_path));
        let rows = self.run("get_file_metadata", cypher::GET_FILE_METADATA, &params, None)?;
        Ok(rows.first().map(|row| FileMetadata {
            hash: record_str(row, "hash").map(str::to_string),
            last_modified: record_i64(row, "last_modified"),
        }))
    }

    fn get_all_file_paths(&self) -> Result<Vec<String>> {
        let rows = self.run("get_all_file_paths", cypher::GET_ALL_FILE_PATHS, &Params::new(), None)?;
        Ok(rows
            .iter()
            .filter_map(|row| record_str(row, "path").map(str::to_string))
            .collect())
    }

    fn pool_metrics(&self) -> Option<PoolMetrics> {
        Some(self.get_pool_metrics())
    }
}

/// Store-owned runtime for the async driver.
///
/// Shut down in the background on drop, so a store may be released from
/// inside async code.
struct BoltRuntime {
    runtime: Option<Runtime>,
}

impl BoltRuntime {
    fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("codegraph-bolt")
            .enable_all()
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "create_tokio_runtime".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Drives a future to completion on the store runtime.
    ///
    /// Blocking is only possible outside a runtime or on a multi-thread
    /// runtime worker; a current-thread caller gets an error instead.
    fn block_on<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let runtime = self.runtime.as_ref().ok_or_else(|| Error::OperationFailed {
            operation: operation.to_string(),
            cause: "store runtime already shut down".to_string(),
        })?;
        match Handle::try_current() {
            Err(_) => runtime.block_on(future),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                Err(Error::OperationFailed {
                    operation: operation.to_string(),
                    cause: "blocking store call from a current-thread tokio runtime; \
                            use spawn_blocking or a multi-thread runtime"
                        .to_string(),
                })
            },
            Ok(_) => tokio::task::block_in_place(|| runtime.block_on(future)),
        }
    }
}

impl Drop for BoltRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Whether a failed bulk chunk may be replayed row by row. A timeout or a
/// dropped connection leaves the chunk's commit state unknown.
fn allows_row_fallback(error: &Error) -> bool {
    !matches!(
        error.kind(),
        ErrorKind::Timeout | ErrorKind::ConnectionUnavailable
    )
}

fn driver_config(config: &NetworkStoreConfig, target: &BoltUri) -> Result<neo4rs::Config> {
    let mut builder = ConfigBuilder::default()
        .uri(target.to_string())
        .user(config.username.as_str())
        .password(config.password.expose_secret())
        .fetch_size(config.fetch_size.max(1))
        .max_connections(config.max_connection_pool_size.max(1));
    if let Some(database) = &config.database {
        builder = builder.db(database.as_str());
    }
    builder.build().map_err(|e| Error::InvalidInput(e.to_string()))
}

async fn connect_with_retry(
    config: &NetworkStoreConfig,
    target: &BoltUri,
    policy: RetryPolicy,
) -> Result<Graph> {
    let acquisition_timeout = config.acquisition_timeout();
    let target_text = target.to_string();
    retry_transient(policy, BACKEND, "connect", &target_text, |attempt| async move {
        tracing::debug!(attempt, target = %target, "Connecting to graph server");
        let attempt_result = tokio::time::timeout(acquisition_timeout, async {
            let graph = Graph::connect(driver_config(config, target)?)
                .await
                .map_err(|e| connect_error(&e.to_string()))?;
            graph
                .run(query(cypher::PING))
                .await
                .map_err(|e| connect_error(&e.to_string()))?;
            Ok(graph)
        })
        .await;
        match attempt_result {
            Ok(result) => result,
            Err(_) => Err(Error::TransientQueryFailure {
                operation: "connect".to_string(),
                cause: format!(
                    "connection not established within {}ms",
                    acquisition_timeout.as_millis()
                ),
            }),
        }
    })
    .await
}

/// Connection failures are retried unless credentials were rejected.
fn connect_error(message: &str) -> Error {
    let lowered = message.to_lowercase();
    if lowered.contains("unauthorized") || lowered.contains("authentication") {
        return Error::InvalidInput(format!("authentication failed: {message}"));
    }
    Error::TransientQueryFailure {
        operation: "connect".to_string(),
        cause: message.to_string(),
    }
}

fn query_error(operation: &str, message: String) -> Error {
    if is_transient_failure(&message) {
        Error::TransientQueryFailure {
            operation: operation.to_string(),
            cause: message,
        }
    } else {
        Error::QueryFailed {
            operation: operation.to_string(),
            cause: message,
        }
    }
}

async fn run_once(
    graph: &Graph,
    operation: &'static str,
    text: &str,
    params: &Params,
    timeout: Duration,
) -> Result<Vec<Record>> {
    let mut statement = query(text);
    for (key, value) in params {
        statement = statement.param(key, to_bolt(value));
    }

    let collect = async {
        let mut stream = graph
            .execute(statement)
            .await
            .map_err(|e| query_error(operation, e.to_string()))?;
        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| query_error(operation, e.to_string()))?
        {
            let record = row
                .to::<Map<String, Value>>()
                .map_err(|e| Error::OperationFailed {
                    operation: format!("{operation}: decode_row"),
                    cause: e.to_string(),
                })?;
            rows.push(record);
        }
        Ok(rows)
    };

    tokio::time::timeout(timeout, collect)
        .await
        .unwrap_or_else(|_| {
            Err(Error::Timeout {
                operation: operation.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_classification() {
        let transient = query_error("q", "ServiceUnavailable: routing table empty".to_string());
        assert_eq!(transient.kind(), ErrorKind::TransientQueryFailure);
        let syntax = query_error("q", "Neo.ClientError.Statement.SyntaxError".to_string());
        assert_eq!(syntax.kind(), ErrorKind::QueryFailed);
    }

    #[test]
    fn test_connect_error_classification() {
        assert_eq!(
            connect_error("Connection refused (os error 111)").kind(),
            ErrorKind::TransientQueryFailure
        );
        assert_eq!(
            connect_error("Neo.ClientError.Security.Unauthorized").kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_driver_config_accepts_validated_target() {
        let config = NetworkStoreConfig::default()
            .with_credentials("neo4j", "pw")
            .with_database("graph");
        let target = config.bolt_uri().unwrap();
        assert!(driver_config(&config, &target).is_ok());
    }

    #[test]
    fn test_unknown_chunk_outcome_is_not_replayed() {
        let timeout = Error::Timeout {
            operation: "batch_create_nodes".to_string(),
            timeout_ms: 10,
        };
        let unavailable = Error::ConnectionUnavailable {
            target: "bolt://localhost:7687".to_string(),
            attempts: 3,
            cause: "connection reset".to_string(),
        };
        let rejected = Error::QueryFailed {
            operation: "batch_create_nodes".to_string(),
            cause: "Neo.ClientError.Schema.ConstraintValidationFailed".to_string(),
        };
        assert!(!allows_row_fallback(&timeout));
        assert!(!allows_row_fallback(&unavailable));
        assert!(allows_row_fallback(&rejected));
    }

    fn unreachable_config() -> NetworkStoreConfig {
        let mut config = NetworkStoreConfig::default()
            .with_uri("bolt://127.0.0.1:1")
            .with_max_retries(1)
            .with_backoff(1, 1.0);
        config.connection_acquisition_timeout_ms = 500;
        config
    }

    #[tokio::test]
    async fn test_connect_from_current_thread_runtime_returns_error() {
        let err = NetworkGraphStore::connect(unreachable_config()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(err.to_string().contains("current-thread"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_connect_inside_multi_thread_runtime_returns_error() {
        let err = NetworkGraphStore::connect(unreachable_config()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConnectionUnavailable);
    }

    #[test]
    fn test_runtime_released_inside_async_context() {
        let outer = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let runtime = BoltRuntime::new().unwrap();
        outer.block_on(async move { drop(runtime) });
    }

    #[test]
    fn test_connect_rejects_http_uri_before_dialing() {
        let config = NetworkStoreConfig::default().with_uri("http://localhost:7474");
        let err = NetworkGraphStore::connect(config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
