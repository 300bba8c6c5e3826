//! Statements issued by the embedded store, already in the embedded dialect.
//!
//! Table and column names are validated before being spliced; values are
//! bound as `$column` parameters.

use super::schema::{NODE_TABLES, NodeTable, node_table};
use super::values::BoundProperty;
use crate::models::{NodeType, Property};
use crate::security::validate_identifier;
use crate::Result;

fn table_token(name: &str) -> Result<&str> {
    validate_identifier(name, "table name")
}

fn assignments(props: &[BoundProperty]) -> Result<Vec<String>> {
    props
        .iter()
        .map(|p| {
            let column = validate_identifier(p.column.name, "column name")?;
            Ok(format!("{column}: ${column}"))
        })
        .collect()
}

/// Node insert. Modules are merged on their key so repeated imports stay
/// one node.
///
/// # Errors
///
/// Returns an error if a table or column name fails validation.
pub fn create_node(table: &NodeTable, props: &[BoundProperty], merge: bool) -> Result<String> {
    let name = table_token(table.name)?;
    let key = validate_identifier(table.primary_key(), "column name")?;
    if !merge {
        return Ok(format!(
            "CREATE (n:{name} {{{}}})",
            assignments(props)?.join(", ")
        ));
    }
    let sets = props
        .iter()
        .filter(|p| p.column.name != key)
        .map(|p| {
            let column = validate_identifier(p.column.name, "column name")?;
            Ok(format!("n.{column} = ${column}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut statement = format!("MERGE (n:{name} {{{key}: ${key}}})");
    if !sets.is_empty() {
        statement.push_str(" SET ");
        statement.push_str(&sets.join(", "));
    }
    Ok(statement)
}

/// Endpoint lookup by qualified name, bound to `$id`.
///
/// # Errors
///
/// Returns an error if the table name fails validation.
pub fn lookup_by_qualified_name(node_type: NodeType) -> Result<String> {
    let name = table_token(node_type.as_str())?;
    Ok(format!(
        "MATCH (n:{name}) WHERE n.qualifiedName = $id RETURN n.qualifiedName AS qn LIMIT 1"
    ))
}

/// Endpoint lookup by bare name, bound to `$id`.
///
/// # Errors
///
/// Returns an error if the table name fails validation.
pub fn lookup_by_name(node_type: NodeType) -> Result<String> {
    let name = table_token(node_type.as_str())?;
    Ok(format!(
        "MATCH (n:{name}) WHERE n.name = $id RETURN n.qualifiedName AS qn LIMIT 1"
    ))
}

/// Edge insert between two resolved endpoints, bound to `$source`,
/// `$target` and one parameter per property column.
///
/// # Errors
///
/// Returns an error if any table or column name fails validation.
pub fn create_relationship(
    rel_table: &str,
    source: NodeType,
    target: NodeType,
    props: &[BoundProperty],
) -> Result<String> {
    let rel = table_token(rel_table)?;
    let source = table_token(source.as_str())?;
    let target = table_token(target.as_str())?;
    let body = if props.is_empty() {
        String::new()
    } else {
        format!(" {{{}}}", assignments(props)?.join(", "))
    };
    Ok(format!(
        "MATCH (s:{source}), (t:{target}) \
         WHERE s.qualifiedName = $source AND t.qualifiedName = $target \
         CREATE (s)-[r:{rel}{body}]->(t) \
         RETURN count(r) AS created"
    ))
}

/// File lookup by path, bound to `$path`.
pub const FIND_FILE: &str =
    "MATCH (f:File) WHERE f.file_path = $path RETURN f.qualifiedName AS qn";

/// One containment hop from a node, bound to `$qn`.
///
/// # Errors
///
/// Returns an error if the table name fails validation.
pub fn contained_children(parent: NodeType) -> Result<String> {
    let name = table_token(parent.as_str())?;
    Ok(format!(
        "MATCH (p:{name})-[:CONTAINS]->(c) WHERE p.qualifiedName = $qn \
         RETURN label(c) AS label, c.qualifiedName AS qn"
    ))
}

/// Deletes one node and its edges, bound to `$qn`.
///
/// # Errors
///
/// Returns an error if the table name fails validation.
pub fn detach_delete(node_type: NodeType) -> Result<String> {
    let name = table_token(node_type.as_str())?;
    Ok(format!(
        "MATCH (n:{name}) WHERE n.qualifiedName = $qn DETACH DELETE n"
    ))
}

/// Node lookup returning only the columns the table declares, bound to
/// `$qn`.
///
/// # Errors
///
/// Returns an error if the table name fails validation.
pub fn get_node(node_type: NodeType) -> Result<String> {
    let Some(table) = node_table(node_type) else {
        return Err(crate::Error::SchemaMismatch {
            operation: "get_node".to_string(),
            cause: format!("no table for {node_type}"),
        });
    };
    let name = table_token(table.name)?;
    let mut columns = vec![format!("n.{} AS name", Property::Name.embedded())];
    for (property, alias) in [
        (Property::LineStart, "line_start"),
        (Property::LineEnd, "line_end"),
        (Property::External, "external"),
    ] {
        if table.column(property.embedded()).is_some() {
            columns.push(format!("n.{} AS {alias}", property.embedded()));
        }
    }
    Ok(format!(
        "MATCH (n:{name}) WHERE n.qualifiedName = $qn RETURN {} LIMIT 1",
        columns.join(", ")
    ))
}

/// Node count of one table.
///
/// # Errors
///
/// Returns an error if the table name fails validation.
pub fn count_nodes(table: &NodeTable) -> Result<String> {
    let name = table_token(table.name)?;
    Ok(format!("MATCH (n:{name}) RETURN count(n) AS count"))
}

/// Total relationship count.
pub const COUNT_RELATIONSHIPS: &str = "MATCH ()-[r]->() RETURN count(r) AS count";

/// Deletes every row of every node table, edges included.
///
/// # Errors
///
/// Returns an error if a table name fails validation.
pub fn clear_statements() -> Result<Vec<String>> {
    NODE_TABLES
        .iter()
        .map(|t| Ok(format!("MATCH (n:{}) DETACH DELETE n", table_token(t.name)?)))
        .collect()
}

/// File change-detection metadata, bound to `$path`.
pub const GET_FILE_METADATA: &str = "\
    MATCH (f:File) WHERE f.file_path = $path \
    RETURN f.hash AS hash, f.last_modified AS last_modified LIMIT 1";

/// Every stored file path.
pub const GET_ALL_FILE_PATHS: &str = "\
    MATCH (f:File) WHERE f.file_path IS NOT NULL \
    RETURN f.file_path AS path ORDER BY path";

/// Lists existing tables.
pub const SHOW_TABLES: &str = "CALL show_tables() RETURN name";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;
    use crate::storage::embedded::schema::rel_table;
    use crate::storage::embedded::values::{node_properties, relationship_properties};
    use serde_json::{Map, json};

    #[test]
    fn test_create_node_binds_every_column() {
        let table = node_table(NodeType::Function).unwrap();
        let entity = Entity::new(NodeType::Function, "pkg.mod.foo", "foo")
            .with_location("pkg/mod.py", 10, 24);
        let props = node_properties(table, &entity);
        let statement = create_node(table, &props, false).unwrap();
        assert_eq!(
            statement,
            "CREATE (n:Function {qualifiedName: $qualifiedName, name: $name, \
             file_path: $file_path, line_start: $line_start, line_end: $line_end})"
        );
    }

    #[test]
    fn test_module_is_merged() {
        let table = node_table(NodeType::Module).unwrap();
        let entity = Entity::new(NodeType::Module, "requests", "requests");
        let props = node_properties(table, &entity);
        assert_eq!(
            create_node(table, &props, true).unwrap(),
            "MERGE (n:Module {qualifiedName: $qualifiedName}) SET n.name = $name"
        );
    }

    #[test]
    fn test_relationship_with_and_without_properties() {
        let mut bag = Map::new();
        bag.insert("line".to_string(), json!(3));
        let calls = rel_table("CALLS").unwrap();
        let props = relationship_properties(calls, &bag);
        let statement =
            create_relationship("CALLS", NodeType::Function, NodeType::Function, &props).unwrap();
        assert!(statement.contains("CREATE (s)-[r:CALLS {line: $line}]->(t)"));

        let statement =
            create_relationship("CONTAINS", NodeType::File, NodeType::Class, &[]).unwrap();
        assert!(statement.contains("MATCH (s:File), (t:Class)"));
        assert!(statement.contains("CREATE (s)-[r:CONTAINS]->(t)"));
    }

    #[test]
    fn test_get_node_only_selects_declared_columns() {
        let file = get_node(NodeType::File).unwrap();
        assert!(!file.contains("line_start"));
        let function = get_node(NodeType::Function).unwrap();
        assert!(function.contains("n.line_start AS line_start"));
        assert!(function.contains("n.external AS external"));
    }

    #[test]
    fn test_clear_covers_every_table() {
        assert_eq!(clear_statements().unwrap().len(), NODE_TABLES.len());
    }
}
