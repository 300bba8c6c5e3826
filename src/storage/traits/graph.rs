//! Graph store contract shared by both engines.
//!
//! # Available Implementations
//!
//! | Backend | Feature | Engine |
//! |---------|---------|--------|
//! | `NetworkGraphStore` | `neo4j` | Client/server over Bolt, pooled sessions |
//! | `EmbeddedGraphStore` | `kuzu` | In-process, static schema, serialized access |
//!
//! # Error Modes and Guarantees
//!
//! | Operation | On bad row | Notes |
//! |-----------|------------|-------|
//! | `create_node` | error | Module nodes are upserted |
//! | `create_relationship` | `Ok(false)` or error | Embedded: unresolved endpoint is a no-op |
//! | `batch_create_nodes` | row skipped, warned | Returns ids of rows written |
//! | `batch_create_relationships` | row skipped, warned | Returns count written |
//! | `execute_query` | error | Embedded: adapted first |
//! | `execute_query_safe` | default returned | Only for dialect and schema errors |
//!
//! Batch APIs report partial results through their return values so callers
//! can detect under-delivery.

use crate::models::{
    Entity, FileMetadata, GraphStats, NodeSummary, NodeType, Params, PoolMetrics, Record,
    Relationship,
};
use crate::Result;
use std::collections::HashMap;
use std::time::Duration;

/// Persistence contract for code graphs.
///
/// # Implementor Notes
///
/// - Methods use `&self` so a store can be shared as `Arc<dyn GraphStore>`
/// - Labels, relationship types and property names are only ever spliced
///   into query text after [`crate::validate_identifier`]
/// - Data values are always bound as parameters
pub trait GraphStore: Send + Sync {
    /// Backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Runs a canonical-dialect query.
    ///
    /// `timeout` overrides the configured default where the engine supports
    /// one.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be run.
    fn execute_query(
        &self,
        query: &str,
        params: &Params,
        timeout: Option<Duration>,
    ) -> Result<Vec<Record>>;

    /// Runs a query, returning `default` instead of failing when the backend
    /// cannot express it or its schema lacks a referenced property.
    ///
    /// # Errors
    ///
    /// Returns every other error from [`GraphStore::execute_query`].
    fn execute_query_safe(
        &self,
        query: &str,
        params: &Params,
        timeout: Option<Duration>,
        default: Vec<Record>,
    ) -> Result<Vec<Record>> {
        match self.execute_query(query, params, timeout) {
            Err(e) if e.is_recoverable_dialect_error() => {
                tracing::debug!(
                    backend = self.backend_name(),
                    error = %e,
                    "Query not supported by backend, returning default"
                );
                Ok(default)
            },
            other => other,
        }
    }

    /// Creates one node and returns its backend id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn create_node(&self, entity: &Entity) -> Result<String>;

    /// Creates one relationship, resolving endpoint types as needed.
    ///
    /// Returns `false` when the edge was not written because an endpoint
    /// could not be resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn create_relationship(&self, relationship: &Relationship) -> Result<bool> {
        self.create_relationship_typed(relationship, None, None)
    }

    /// Creates one relationship with optionally known endpoint types.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn create_relationship_typed(
        &self,
        relationship: &Relationship,
        source_type: Option<NodeType>,
        target_type: Option<NodeType>,
    ) -> Result<bool>;

    /// Creates many nodes; returns qualified name to backend id for every
    /// node written.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that abort the whole batch.
    fn batch_create_nodes(&self, entities: &[Entity]) -> Result<HashMap<String, String>>;

    /// Creates many relationships; returns how many were written.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that abort the whole batch.
    fn batch_create_relationships(&self, relationships: &[Relationship]) -> Result<usize>;

    /// Deletes a `File` node and everything it transitively contains.
    ///
    /// Returns the number of nodes deleted (0 if the file is unknown).
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_file_entities(&self, file_path: &str) -> Result<usize>;

    /// Looks up a node by qualified name.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_node(&self, qualified_name: &str) -> Result<Option<NodeSummary>>;

    /// Returns node and relationship counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the counts cannot be read.
    fn get_stats(&self) -> Result<GraphStats>;

    /// Deletes every node and relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn clear_graph(&self) -> Result<()>;

    /// Creates constraints and indexes the backend benefits from.
    ///
    /// # Errors
    ///
    /// Returns an error if index creation fails.
    fn ensure_indexes(&self) -> Result<()>;

    /// Returns the change-detection metadata of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_file_metadata(&self, file_path: &str) -> Result<Option<FileMetadata>>;

    /// Returns the paths of every stored `File` node.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_all_file_paths(&self) -> Result<Vec<String>>;

    /// Connection pool snapshot, for backends that pool connections.
    fn pool_metrics(&self) -> Option<PoolMetrics> {
        None
    }
}
