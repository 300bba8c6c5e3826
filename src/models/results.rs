//! Query inputs and outputs shared by both backends.

use super::entity::NodeType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Query parameters, bound by name (`$name`).
pub type Params = serde_json::Map<String, Value>;

/// One result row keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Minimal view of a stored node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Qualified name.
    pub qualified_name: String,
    /// Short name (placeholders carry a best-effort value).
    pub name: Option<String>,
    /// Node type, `None` for unlabeled placeholders.
    pub node_type: Option<NodeType>,
    /// First source line.
    pub line_start: Option<i64>,
    /// Last source line.
    pub line_end: Option<i64>,
    /// Whether the node is a placeholder or third-party symbol.
    pub external: bool,
}

/// Change-detection metadata of a `File` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Content hash recorded at ingest.
    pub hash: Option<String>,
    /// Modification timestamp recorded at ingest.
    pub last_modified: Option<i64>,
}

/// Graph size summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total nodes.
    pub node_count: u64,
    /// Total relationships.
    pub relationship_count: u64,
    /// Node counts keyed by label.
    pub nodes_by_type: BTreeMap<String, u64>,
}

/// Connection pool snapshot of the networked store. Observability only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetrics {
    /// Sessions currently executing.
    pub in_use: usize,
    /// Pool slots not in use.
    pub idle: usize,
    /// Configured pool size.
    pub max_pool_size: usize,
    /// Connection acquisition timeout.
    pub acquisition_timeout_ms: u64,
    /// Maximum connection lifetime before recycling.
    pub max_connection_lifetime_secs: u64,
    /// Default per-query timeout.
    pub query_timeout_ms: u64,
    /// Age of the current pool.
    pub pool_age_secs: u64,
}

/// Reads an integer column, accepting integral floats.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn record_i64(record: &Record, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Reads a string column.
#[must_use]
pub fn record_str<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_accessors() {
        let record: Record = json!({"count": 4, "ratio": 2.0, "name": "foo", "half": 1.5})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(record_i64(&record, "count"), Some(4));
        assert_eq!(record_i64(&record, "ratio"), Some(2));
        assert_eq!(record_i64(&record, "half"), None);
        assert_eq!(record_i64(&record, "missing"), None);
        assert_eq!(record_str(&record, "name"), Some("foo"));
        assert_eq!(record_str(&record, "count"), None);
    }
}
