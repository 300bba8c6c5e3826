//! Embedded graph store over Kuzu.
//!
//! All statements run behind one re-entrant lock with a fresh engine
//! connection each. Batch and delete operations hold the lock for their
//! whole duration so they observe a consistent graph.

use super::schema::{
    ColumnType, NAME_FALLBACK_TABLES, NODE_TABLES, LOOKUP_ORDER, RelTableKind, ddl_statements,
    is_bare_name, is_container, node_table, rel_table, resolve_relationship_table,
};
use super::statements;
use super::values::{BoundProperty, classify_engine_error, node_properties, relationship_properties};
use crate::config::EmbeddedStoreConfig;
use crate::models::{
    Entity, FileMetadata, GraphStats, NodeSummary, NodeType, Params, Record, Relationship,
    record_i64, record_str,
};
use crate::observability::{
    record_batch_row_failure, record_dialect_rejection, record_operation_metrics, status_label,
};
use crate::query::{QueryDialectAdapter, variable_length_types};
use crate::storage::traits::GraphStore;
use crate::{Error, ErrorKind, Result};
use kuzu::{Connection, Database, LogicalType, SystemConfig, Value as KuzuValue};
use parking_lot::ReentrantMutex;
use serde_json::{Map, Number, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use tracing::instrument;

const BACKEND: &str = "kuzu";

/// Rejection reason for `[:GROUP*]` patterns.
const VARIABLE_LENGTH_GROUP: &str = "variable_length_table_group";

type Endpoint = (NodeType, String);
type EndpointCache = HashMap<String, Option<Endpoint>>;

/// Graph store backed by an in-process Kuzu database.
pub struct EmbeddedGraphStore {
    db: Database,
    lock: ReentrantMutex<()>,
    adapter: QueryDialectAdapter,
    config: EmbeddedStoreConfig,
}

impl EmbeddedGraphStore {
    /// Opens the database and bootstraps the schema unless read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or a DDL statement
    /// fails.
    pub fn open(config: EmbeddedStoreConfig) -> Result<Self> {
        if !config.read_only
            && let Some(parent) = config.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_db_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let mut system = SystemConfig::default().read_only(config.read_only);
        if let Some(bytes) = config.buffer_pool_size {
            system = system.buffer_pool_size(bytes);
        }
        if let Some(threads) = config.max_num_threads {
            system = system.max_num_threads(threads);
        }
        let db = Database::new(&config.db_path, system).map_err(|e| Error::OperationFailed {
            operation: "open_database".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            db,
            lock: ReentrantMutex::new(()),
            adapter: QueryDialectAdapter::default(),
            config,
        };
        if store.config.read_only {
            tracing::warn!(
                path = %store.config.db_path.display(),
                "Read-only open, schema bootstrap skipped"
            );
        } else {
            store.init_schema()?;
        }
        Ok(store)
    }

    /// Creates every declared table that does not exist yet.
    ///
    /// Returns the number of tables created.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is read-only or a statement fails.
    pub fn init_schema(&self) -> Result<usize> {
        if self.config.read_only {
            return Err(Error::InvalidInput(
                "schema bootstrap requires a writable database".to_string(),
            ));
        }
        let _guard = self.lock.lock();
        let existing: HashSet<String> = self
            .run("show_tables", statements::SHOW_TABLES, Vec::new())?
            .iter()
            .filter_map(|row| record_str(row, "name").map(str::to_string))
            .collect();

        let mut created = 0;
        for (table, ddl) in ddl_statements() {
            if existing.contains(table) {
                continue;
            }
            self.run("init_schema", &ddl, Vec::new())?;
            created += 1;
        }
        if created > 0 {
            tracing::info!(
                path = %self.config.db_path.display(),
                tables = created,
                "Embedded schema created"
            );
        }
        Ok(created)
    }

    /// Runs one statement in the embedded dialect.
    fn run(
        &self,
        operation: &'static str,
        text: &str,
        params: Vec<(String, KuzuValue)>,
    ) -> Result<Vec<Record>> {
        let start = Instant::now();
        let result = self.run_locked(operation, text, params);
        record_operation_metrics(BACKEND, operation, start, status_label(&result));
        result
    }

    fn run_locked(
        &self,
        operation: &'static str,
        text: &str,
        params: Vec<(String, KuzuValue)>,
    ) -> Result<Vec<Record>> {
        let _guard = self.lock.lock();
        let conn = Connection::new(&self.db).map_err(|e| Error::OperationFailed {
            operation: "open_connection".to_string(),
            cause: e.to_string(),
        })?;

        let result = if params.is_empty() {
            conn.query(text)
        } else {
            let mut prepared = conn
                .prepare(text)
                .map_err(|e| classify_engine_error(operation, &e.to_string()))?;
            let bound: Vec<(&str, KuzuValue)> =
                params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
            conn.execute(&mut prepared, bound)
        }
        .map_err(|e| classify_engine_error(operation, &e.to_string()))?;

        let columns = result.get_column_names();
        Ok(result
            .map(|row| {
                columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(from_kuzu))
                    .collect::<Record>()
            })
            .collect())
    }

    fn first_i64(&self, operation: &'static str, text: &str, key: &str) -> Result<i64> {
        Ok(self
            .run(operation, text, Vec::new())?
            .first()
            .and_then(|row| record_i64(row, key))
            .unwrap_or(0))
    }

    /// Finds the table holding an endpoint: exact qualified name in lookup
    /// order, then bare name on class tables.
    fn resolve_endpoint(&self, identifier: &str, cache: &mut EndpointCache) -> Result<Option<Endpoint>> {
        if let Some(hit) = cache.get(identifier) {
            return Ok(hit.clone());
        }
        let params = || vec![("id".to_string(), KuzuValue::String(identifier.to_string()))];

        let mut found = None;
        for node_type in LOOKUP_ORDER {
            let rows = self.run(
                "resolve_endpoint",
                &statements::lookup_by_qualified_name(*node_type)?,
                params(),
            )?;
            if let Some(qn) = rows.first().and_then(|r| record_str(r, "qn")) {
                found = Some((*node_type, qn.to_string()));
                break;
            }
        }
        if found.is_none() && is_bare_name(identifier) {
            for node_type in NAME_FALLBACK_TABLES {
                let rows = self.run(
                    "resolve_endpoint",
                    &statements::lookup_by_name(*node_type)?,
                    params(),
                )?;
                if let Some(qn) = rows.first().and_then(|r| record_str(r, "qn")) {
                    found = Some((*node_type, qn.to_string()));
                    break;
                }
            }
        }
        cache.insert(identifier.to_string(), found.clone());
        Ok(found)
    }

    fn endpoint(
        &self,
        identifier: &str,
        known: Option<NodeType>,
        cache: &mut EndpointCache,
    ) -> Result<Option<Endpoint>> {
        match known {
            Some(node_type) => Ok(Some((node_type, identifier.to_string()))),
            None => self.resolve_endpoint(identifier, cache),
        }
    }

    fn write_relationship(
        &self,
        relationship: &Relationship,
        source_type: Option<NodeType>,
        target_type: Option<NodeType>,
        cache: &mut EndpointCache,
    ) -> Result<bool> {
        let source = self.endpoint(&relationship.source_id, source_type, cache)?;
        let target = self.endpoint(&relationship.target_id, target_type, cache)?;
        let (Some((src_type, src_qn)), Some((dst_type, dst_qn))) = (source, target) else {
            tracing::debug!(
                rel_type = %relationship.rel_type,
                source = %relationship.source_id,
                target = %relationship.target_id,
                "Unresolved relationship endpoint, edge skipped"
            );
            return Ok(false);
        };

        let table_name = resolve_relationship_table(relationship.rel_type, src_type, dst_type);
        let table = rel_table(table_name)
            .filter(|t| {
                t.pairs
                    .iter()
                    .any(|(from, to)| *from == src_type.as_str() && *to == dst_type.as_str())
            })
            .ok_or_else(|| Error::SchemaMismatch {
                operation: "create_relationship".to_string(),
                cause: format!("no relationship table {table_name} from {src_type} to {dst_type}"),
            })?;

        let props = relationship_properties(table, &relationship.non_null_properties());
        let text = statements::create_relationship(table.name, src_type, dst_type, &props)?;
        let mut params = vec![
            ("source".to_string(), KuzuValue::String(src_qn)),
            ("target".to_string(), KuzuValue::String(dst_qn)),
        ];
        params.extend(bind(&props));
        let rows = self.run("create_relationship", &text, params)?;
        Ok(rows
            .first()
            .and_then(|r| record_i64(r, "created"))
            .is_some_and(|c| c > 0))
    }
}

impl GraphStore for EmbeddedGraphStore {
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
        let adapted = self.adapter.adapt(query).map_err(|feature| {
            record_dialect_rejection(feature.reason());
            Error::from(feature)
        })?;
        tracing::debug!(query = %adapted, "Adapted query");
        if let Some(group) = variable_length_types(&adapted)
            .into_iter()
            .find(|t| rel_table(t).is_some_and(|r| r.kind == RelTableKind::Group))
        {
            record_dialect_rejection(VARIABLE_LENGTH_GROUP);
            return Err(Error::UnsupportedDialectFeature {
                feature: VARIABLE_LENGTH_GROUP.to_string(),
                detail: format!("variable-length traversal over table group {group}"),
            });
        }
        if let Some(timeout) = timeout {
            tracing::debug!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Embedded engine has no query timeout, ignoring"
            );
        }
        let bound = params
            .iter()
            .map(|(k, v)| (k.clone(), to_kuzu(v)))
            .collect();
        self.run("execute_query", &adapted, bound)
    }

    #[instrument(skip(self, entity), fields(backend = BACKEND, qualified_name = %entity.qualified_name))]
    fn create_node(&self, entity: &Entity) -> Result<String> {
        let table = node_table(entity.node_type).ok_or_else(|| Error::SchemaMismatch {
            operation: "create_node".to_string(),
            cause: format!("no table for {}", entity.node_type),
        })?;
        let props = node_properties(table, entity);
        let text =
            statements::create_node(table, &props, entity.node_type == NodeType::Module)?;
        self.run("create_node", &text, bind(&props))?;
        Ok(entity.qualified_name.clone())
    }

    #[instrument(skip(self, relationship), fields(backend = BACKEND, rel_type = %relationship.rel_type))]
    fn create_relationship_typed(
        &self,
        relationship: &Relationship,
        source_type: Option<NodeType>,
        target_type: Option<NodeType>,
    ) -> Result<bool> {
        self.write_relationship(relationship, source_type, target_type, &mut HashMap::new())
    }

    #[instrument(skip(self, entities), fields(backend = BACKEND, count = entities.len()))]
    fn batch_create_nodes(&self, entities: &[Entity]) -> Result<HashMap<String, String>> {
        let _guard = self.lock.lock();
        let mut ids = HashMap::with_capacity(entities.len());
        for entity in entities {
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
        Ok(ids)
    }

    #[instrument(skip(self, relationships), fields(backend = BACKEND, count = relationships.len()))]
    fn batch_create_relationships(&self, relationships: &[Relationship]) -> Result<usize> {
        let _guard = self.lock.lock();
        let mut cache = EndpointCache::new();
        let mut created = 0;
        for rel in relationships {
            match self.write_relationship(rel, None, None, &mut cache) {
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
        Ok(created)
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn delete_file_entities(&self, file_path: &str) -> Result<usize> {
        let _guard = self.lock.lock();
        let path_param = vec![("path".to_string(), KuzuValue::String(file_path.to_string()))];
        let roots = self.run("delete_file_entities", statements::FIND_FILE, path_param)?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut doomed: Vec<Endpoint> = Vec::new();
        let mut queue: VecDeque<Endpoint> = roots
            .iter()
            .filter_map(|row| record_str(row, "qn"))
            .map(|qn| (NodeType::File, qn.to_string()))
            .collect();

        while let Some((node_type, qn)) = queue.pop_front() {
            if !visited.insert(qn.clone()) {
                continue;
            }
            if !is_container(node_type) {
                doomed.push((node_type, qn));
                continue;
            }
            let rows = self.run(
                "delete_file_entities",
                &statements::contained_children(node_type)?,
                vec![("qn".to_string(), KuzuValue::String(qn.clone()))],
            )?;
            for row in &rows {
                let child = record_str(row, "label")
                    .and_then(NodeType::parse)
                    .zip(record_str(row, "qn"));
                if let Some((child_type, child_qn)) = child
                    && !visited.contains(child_qn)
                {
                    queue.push_back((child_type, child_qn.to_string()));
                }
            }
            doomed.push((node_type, qn));
        }

        for (node_type, qn) in doomed.iter().rev() {
            self.run(
                "delete_file_entities",
                &statements::detach_delete(*node_type)?,
                vec![("qn".to_string(), KuzuValue::String(qn.clone()))],
            )?;
        }
        Ok(doomed.len())
    }

    fn get_node(&self, qualified_name: &str) -> Result<Option<NodeSummary>> {
        for node_type in LOOKUP_ORDER {
            let rows = self.run(
                "get_node",
                &statements::get_node(*node_type)?,
                vec![(
                    "qn".to_string(),
                    KuzuValue::String(qualified_name.to_string()),
                )],
            )?;
            if let Some(row) = rows.first() {
                return Ok(Some(NodeSummary {
                    qualified_name: qualified_name.to_string(),
                    name: record_str(row, "name").map(str::to_string),
                    node_type: Some(*node_type),
                    line_start: record_i64(row, "line_start"),
                    line_end: record_i64(row, "line_end"),
                    external: row
                        .get("external")
                        .and_then(Value::as_bool)
                        .unwrap_or_else(|| node_type.is_external()),
                }));
            }
        }
        Ok(None)
    }

    fn get_stats(&self) -> Result<GraphStats> {
        let mut stats = GraphStats::default();
        for table in NODE_TABLES {
            let count = self.first_i64("get_stats", &statements::count_nodes(table)?, "count")?;
            let count = u64::try_from(count).unwrap_or(0);
            if count > 0 {
                stats.nodes_by_type.insert(table.name.to_string(), count);
            }
            stats.node_count += count;
        }
        let relationships =
            self.first_i64("get_stats", statements::COUNT_RELATIONSHIPS, "count")?;
        stats.relationship_count = u64::try_from(relationships).unwrap_or(0);
        Ok(stats)
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn clear_graph(&self) -> Result<()> {
        let _guard = self.lock.lock();
        for statement in statements::clear_statements()? {
            self.run("clear_graph", &statement, Vec::new())?;
        }
        Ok(())
    }

    fn ensure_indexes(&self) -> Result<()> {
        tracing::debug!("Primary keys are the only embedded indexes");
        Ok(())
    }

    fn get_file_metadata(&self, file_path: &str) -> Result<Option<FileMetadata>> {
        let rows = self.run(
            "get_file_metadata",
            statements::GET_FILE_METADATA,
            vec![("path".to_string(), KuzuValue::String(file_path.to_string()))],
        )?;
        Ok(rows.first().map(|row| FileMetadata {
            hash: record_str(row, "hash").map(str::to_string),
            last_modified: record_i64(row, "last_modified"),
        }))
    }

    fn get_all_file_paths(&self) -> Result<Vec<String>> {
        let rows = self.run("get_all_file_paths", statements::GET_ALL_FILE_PATHS, Vec::new())?;
        Ok(rows
            .iter()
            .filter_map(|row| record_str(row, "path").map(str::to_string))
            .collect())
    }
}

/// Binds coerced properties as `$column` parameters.
fn bind(props: &[BoundProperty]) -> Vec<(String, KuzuValue)> {
    props
        .iter()
        .map(|p| (p.column.name.to_string(), to_kuzu_typed(&p.value, p.column.ty)))
        .collect()
}

/// Converts a value already coerced to `ty`.
fn to_kuzu_typed(value: &Value, ty: ColumnType) -> KuzuValue {
    match ty {
        ColumnType::StringList => KuzuValue::List(
            LogicalType::String,
            value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|s| KuzuValue::String(s.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        ColumnType::DoubleList => KuzuValue::List(
            LogicalType::Double,
            value
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_f64).map(KuzuValue::Double).collect())
                .unwrap_or_default(),
        ),
        ColumnType::Double => value
            .as_f64()
            .map_or(KuzuValue::Null(LogicalType::Double), KuzuValue::Double),
        _ => to_kuzu(value),
    }
}

/// Converts a caller-supplied parameter, inferring list element types.
fn to_kuzu(value: &Value) -> KuzuValue {
    match value {
        Value::Null => KuzuValue::Null(LogicalType::Any),
        Value::Bool(b) => KuzuValue::Bool(*b),
        Value::Number(n) => n.as_i64().map_or_else(
            || KuzuValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            KuzuValue::Int64,
        ),
        Value::String(s) => KuzuValue::String(s.clone()),
        Value::Array(items) => {
            let has_float = items.iter().any(|v| v.is_f64());
            let converted: Vec<KuzuValue> = items
                .iter()
                .map(|item| match item {
                    Value::Number(n) if has_float => {
                        KuzuValue::Double(n.as_f64().unwrap_or(f64::NAN))
                    },
                    other => to_kuzu(other),
                })
                .collect();
            let element = converted
                .first()
                .map_or(LogicalType::String, logical_type_of);
            KuzuValue::List(element, converted)
        },
        Value::Object(map) => KuzuValue::Struct(
            map.iter()
                .map(|(k, v)| (k.clone(), to_kuzu(v)))
                .collect(),
        ),
    }
}

fn logical_type_of(value: &KuzuValue) -> LogicalType {
    match value {
        KuzuValue::Bool(_) => LogicalType::Bool,
        KuzuValue::Int64(_) => LogicalType::Int64,
        KuzuValue::Double(_) => LogicalType::Double,
        KuzuValue::String(_) => LogicalType::String,
        _ => LogicalType::Any,
    }
}

/// Converts an engine value into JSON. Nodes and relationships become
/// property maps with a `_label` entry.
fn from_kuzu(value: &KuzuValue) -> Value {
    match value {
        KuzuValue::Null(_) => Value::Null,
        KuzuValue::Bool(b) => Value::Bool(*b),
        KuzuValue::Int64(i) => Value::from(*i),
        KuzuValue::Int32(i) => Value::from(*i),
        KuzuValue::Int16(i) => Value::from(*i),
        KuzuValue::Int8(i) => Value::from(*i),
        KuzuValue::UInt64(u) => Value::from(*u),
        KuzuValue::UInt32(u) => Value::from(*u),
        KuzuValue::UInt16(u) => Value::from(*u),
        KuzuValue::UInt8(u) => Value::from(*u),
        KuzuValue::Double(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        KuzuValue::Float(f) => Number::from_f64(f64::from(*f)).map_or(Value::Null, Value::Number),
        KuzuValue::String(s) => Value::String(s.clone()),
        KuzuValue::List(_, items) | KuzuValue::Array(_, items) => {
            Value::Array(items.iter().map(from_kuzu).collect())
        },
        KuzuValue::Struct(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), from_kuzu(v)))
                .collect(),
        ),
        KuzuValue::Node(node) => {
            labelled(node.get_label_name(), node.get_properties())
        },
        KuzuValue::Rel(rel) => labelled(rel.get_label_name(), rel.get_properties()),
        other => Value::String(other.to_string()),
    }
}

fn labelled(label: &str, properties: &[(String, KuzuValue)]) -> Value {
    let mut map: Map<String, Value> = properties
        .iter()
        .map(|(k, v)| (k.clone(), from_kuzu(v)))
        .collect();
    map.insert("_label".to_string(), Value::from(label));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameter_conversion() {
        assert!(matches!(to_kuzu(&json!(3)), KuzuValue::Int64(3)));
        assert!(matches!(to_kuzu(&json!("x")), KuzuValue::String(ref s) if s == "x"));
        let KuzuValue::List(element, items) = to_kuzu(&json!([1, 2.5])) else {
            panic!("expected list");
        };
        assert_eq!(element, LogicalType::Double);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_typed_lists() {
        let KuzuValue::List(element, items) =
            to_kuzu_typed(&json!(["a", "b"]), ColumnType::StringList)
        else {
            panic!("expected list");
        };
        assert_eq!(element, LogicalType::String);
        assert_eq!(items.len(), 2);
        assert!(matches!(
            to_kuzu_typed(&json!(2), ColumnType::Double),
            KuzuValue::Double(_)
        ));
    }

    #[test]
    fn test_result_conversion() {
        assert_eq!(from_kuzu(&KuzuValue::Int64(4)), json!(4));
        assert_eq!(from_kuzu(&KuzuValue::Null(LogicalType::String)), Value::Null);
        assert_eq!(
            from_kuzu(&KuzuValue::List(
                LogicalType::String,
                vec![KuzuValue::String("a".to_string())]
            )),
            json!(["a"])
        );
    }
}
