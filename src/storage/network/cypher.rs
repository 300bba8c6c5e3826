//! Canonical-dialect statements issued by the networked store.
//!
//! Labels and relationship types are the only interpolated tokens. Each one
//! is checked for enum membership and then validated before it is spliced in
//! backticks. Everything else is a parameter.

use crate::models::{NodeType, Property, RelationshipType, short_name};
use crate::security::quote_identifier;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Label of a node type, checked against the enum and the validator.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentifier`] if the label is not a known node type
/// or fails validation.
pub fn node_label(node_type: NodeType) -> Result<String> {
    checked_token(
        node_type.as_str(),
        NodeType::parse(node_type.as_str()) == Some(node_type),
        "node label",
    )
}

/// Relationship type token, checked against the enum and the validator.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentifier`] if the type is not a known
/// relationship type or fails validation.
pub fn relationship_token(rel_type: RelationshipType) -> Result<String> {
    checked_token(
        rel_type.as_str(),
        RelationshipType::parse(rel_type.as_str()) == Some(rel_type),
        "relationship type",
    )
}

fn checked_token(token: &str, is_member: bool, context: &str) -> Result<String> {
    if !is_member {
        return Err(Error::InvalidIdentifier {
            context: context.to_string(),
            reason: format!("{token:?} is not a member of the closed type set"),
        });
    }
    quote_identifier(token, context)
}

/// Single-node write bound to `$props`.
///
/// Modules are merged by qualified name. Other types are created, except that
/// an unlabeled `external` placeholder with the same qualified name is claimed
/// and labeled in place, so edges already pointing at it survive.
///
/// # Errors
///
/// Returns an error if the label fails validation.
pub fn create_node(node_type: NodeType) -> Result<String> {
    let label = node_label(node_type)?;
    Ok(if node_type == NodeType::Module {
        format!(
            "MERGE (n {{qualifiedName: $props.qualifiedName}}) \
             SET n:{label}, n += $props \
             RETURN elementId(n) AS id"
        )
    } else {
        format!(
            "OPTIONAL MATCH (p {{qualifiedName: $props.qualifiedName}}) {PLACEHOLDER_FILTER} \
             WITH head(collect(p)) AS p \
             {} \
             RETURN elementId(n) AS id",
            claim_or_create("p", &label, "$props")
        )
    })
}

/// Bulk node write for one type group, bound to `$entities`.
///
/// Same placeholder handling as [`create_node`].
///
/// # Errors
///
/// Returns an error if the label fails validation.
pub fn batch_create_nodes(node_type: NodeType) -> Result<String> {
    let label = node_label(node_type)?;
    Ok(if node_type == NodeType::Module {
        format!(
            "UNWIND $entities AS e \
             MERGE (n {{qualifiedName: e.qualifiedName}}) \
             SET n:{label}, n += e \
             RETURN e.qualifiedName AS qualified_name, elementId(n) AS id"
        )
    } else {
        format!(
            "UNWIND $entities AS e \
             OPTIONAL MATCH (p {{qualifiedName: e.qualifiedName}}) {PLACEHOLDER_FILTER} \
             WITH e, head(collect(p)) AS p \
             {} \
             RETURN e.qualifiedName AS qualified_name, elementId(n) AS id",
            claim_or_create("e, p", &label, "e")
        )
    })
}

const PLACEHOLDER_FILTER: &str = "WHERE p.external = true AND size(labels(p)) = 0";

/// Subquery yielding `n`: the claimed placeholder `p`, or a new node.
fn claim_or_create(imports: &str, label: &str, props: &str) -> String {
    format!(
        "CALL {{ \
           WITH {imports} WITH {imports} WHERE p IS NULL \
           CREATE (n:{label}) SET n = {props} RETURN n \
           UNION \
           WITH {imports} WITH {imports} WHERE p IS NOT NULL \
           SET p:{label}, p = {props} RETURN p AS n \
         }}"
    )
}

/// Single-edge write bound to `$source`, `$target`, `$target_name` and
/// `$props`. A missing target becomes an `external` placeholder.
///
/// # Errors
///
/// Returns an error if the relationship type fails validation.
pub fn create_relationship(rel_type: RelationshipType) -> Result<String> {
    let token = relationship_token(rel_type)?;
    Ok(format!(
        "MATCH (s {{qualifiedName: $source}}) \
         WITH s LIMIT 1 \
         MERGE (t {{qualifiedName: $target}}) \
         ON CREATE SET t.name = $target_name, t.external = true \
         CREATE (s)-[r:{token}]->(t) \
         SET r = $props \
         RETURN count(r) AS created"
    ))
}

/// Bulk edge write for one relationship type, bound to `$rels`.
///
/// # Errors
///
/// Returns an error if the relationship type fails validation.
pub fn batch_create_relationships(rel_type: RelationshipType) -> Result<String> {
    let token = relationship_token(rel_type)?;
    Ok(format!(
        "UNWIND $rels AS rel \
         MATCH (s {{qualifiedName: rel.source}}) \
         MERGE (t {{qualifiedName: rel.target}}) \
         ON CREATE SET t.name = rel.target_name, t.external = true \
         CREATE (s)-[r:{token}]->(t) \
         SET r = rel.props \
         RETURN count(r) AS created"
    ))
}

/// Row bound into [`batch_create_relationships`] for one edge.
#[must_use]
pub fn relationship_row(
    source: &str,
    target: &str,
    props: Map<String, Value>,
) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("source".to_string(), Value::from(source));
    row.insert("target".to_string(), Value::from(target));
    row.insert("target_name".to_string(), Value::from(short_name(target)));
    row.insert("props".to_string(), Value::Object(props));
    row
}

/// Deletes a file and its transitive containment closure, bound to `$path`.
pub const DELETE_FILE_ENTITIES: &str = "\
    MATCH (f:File {filePath: $path}) \
    OPTIONAL MATCH (f)-[:CONTAINS*]->(c) \
    WITH f, collect(DISTINCT c) AS contained \
    UNWIND [f] + contained AS n \
    WITH DISTINCT n \
    DETACH DELETE n \
    RETURN count(*) AS deleted";

/// Node lookup by qualified name, bound to `$qualified_name`.
pub const GET_NODE: &str = "\
    MATCH (n {qualifiedName: $qualified_name}) \
    RETURN n.name AS name, labels(n) AS labels, \
           n.lineStart AS line_start, n.lineEnd AS line_end, \
           coalesce(n.external, false) AS external \
    LIMIT 1";

/// Total node count.
pub const COUNT_NODES: &str = "MATCH (n) RETURN count(n) AS count";

/// Total relationship count.
pub const COUNT_RELATIONSHIPS: &str = "MATCH ()-[r]->() RETURN count(r) AS count";

/// Node counts per label.
pub const COUNT_BY_LABEL: &str =
    "MATCH (n) UNWIND labels(n) AS label RETURN label, count(*) AS count";

/// Deletes everything.
pub const CLEAR_GRAPH: &str = "MATCH (n) DETACH DELETE n";

/// File change-detection metadata, bound to `$path`.
pub const GET_FILE_METADATA: &str = "\
    MATCH (f:File {filePath: $path}) \
    RETURN f.hash AS hash, f.lastModified AS last_modified \
    LIMIT 1";

/// Every stored file path.
pub const GET_ALL_FILE_PATHS: &str = "\
    MATCH (f:File) WHERE f.filePath IS NOT NULL \
    RETURN f.filePath AS path ORDER BY path";

/// Connectivity check.
pub const PING: &str = "RETURN 1 AS ok";

/// Uniqueness constraints per node type plus the file path index.
///
/// # Errors
///
/// Returns an error if any label fails validation.
pub fn index_statements() -> Result<Vec<String>> {
    let mut statements = Vec::with_capacity(NodeType::all().len() + 1);
    for node_type in NodeType::all() {
        let label = node_label(*node_type)?;
        let name = quote_identifier(
            &format!("{}_qualified_name", node_type.as_str().to_lowercase()),
            "constraint name",
        )?;
        statements.push(format!(
            "CREATE CONSTRAINT {name} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{} IS UNIQUE",
            Property::QualifiedName.canonical()
        ));
    }
    statements.push(format!(
        "CREATE INDEX `file_path` IF NOT EXISTS FOR (f:`File`) ON (f.{})",
        Property::FilePath.canonical()
    ));
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_backticked() {
        assert_eq!(node_label(NodeType::ExternalClass).unwrap(), "`ExternalClass`");
        assert_eq!(
            relationship_token(RelationshipType::CallsExternal).unwrap(),
            "`CALLS_EXTERNAL`"
        );
    }

    #[test]
    fn test_module_is_merged_and_others_created() {
        let module = batch_create_nodes(NodeType::Module).unwrap();
        assert!(module.contains("MERGE (n {qualifiedName: e.qualifiedName})"));
        assert!(module.contains("SET n:`Module`, n += e"));
        let function = batch_create_nodes(NodeType::Function).unwrap();
        assert!(function.contains("CREATE (n:`Function`) SET n = e"));
        assert!(!function.contains("MERGE"));
        assert!(create_node(NodeType::Module).unwrap().starts_with("MERGE"));
        assert!(create_node(NodeType::Class).unwrap().contains("CREATE (n:`Class`) SET n = $props"));
    }

    #[test]
    fn test_placeholders_are_claimed_not_duplicated() {
        for query in [
            create_node(NodeType::Function).unwrap(),
            batch_create_nodes(NodeType::Function).unwrap(),
        ] {
            assert!(query.contains("WHERE p.external = true AND size(labels(p)) = 0"));
            assert!(query.contains("SET p:`Function`"));
            assert!(query.contains("UNION"));
        }
    }

    #[test]
    fn test_relationship_upserts_placeholder_target() {
        let query = batch_create_relationships(RelationshipType::Calls).unwrap();
        assert!(query.contains("MERGE (t {qualifiedName: rel.target})"));
        assert!(query.contains("ON CREATE SET t.name = rel.target_name, t.external = true"));
        assert!(query.contains("CREATE (s)-[r:`CALLS`]->(t)"));
    }

    #[test]
    fn test_relationship_row() {
        let row = relationship_row("pkg.a.f", "requests.get", Map::new());
        assert_eq!(row["target_name"], "get");
        assert_eq!(row["source"], "pkg.a.f");
        assert!(row["props"].is_object());
    }

    #[test]
    fn test_index_statements_cover_every_label() {
        let statements = index_statements().unwrap();
        assert_eq!(statements.len(), NodeType::all().len() + 1);
        assert!(statements[0].contains("`file_qualified_name`"));
        assert!(statements.iter().all(|s| s.contains("IF NOT EXISTS")));
    }
}
