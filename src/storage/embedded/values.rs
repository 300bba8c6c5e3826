//! Property maps and error classification for the embedded engine.
//!
//! The engine rejects explicit nulls and undeclared columns on insert, so
//! every write goes through the table's column list first.

use super::schema::{Column, ColumnType, NodeTable, RelTable, RelTableKind};
use crate::models::Entity;
use crate::Error;
use serde_json::{Map, Value};

/// Coerces a JSON value to a column type.
///
/// Returns `None` for nulls and values that cannot be represented.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn coerce(value: &Value, ty: ColumnType) -> Option<Value> {
    match (ty, value) {
        (_, Value::Null) => None,
        (ColumnType::String, Value::String(_)) => Some(value.clone()),
        (ColumnType::String, Value::Number(n)) => Some(Value::from(n.to_string())),
        (ColumnType::String, Value::Bool(b)) => Some(Value::from(b.to_string())),
        (ColumnType::Int64, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Value::from),
        (ColumnType::Double, Value::Number(n)) => n.as_f64().map(Value::from),
        (ColumnType::Bool, Value::Bool(_)) => Some(value.clone()),
        (ColumnType::StringList, Value::Array(items)) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| coerce(item, ColumnType::String))
                .collect(),
        )),
        (ColumnType::StringList, Value::String(_)) => Some(Value::Array(vec![value.clone()])),
        (ColumnType::DoubleList, Value::Array(items)) => items
            .iter()
            .map(|item| coerce(item, ColumnType::Double))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        _ => None,
    }
}

/// A property ready to bind, with the column it lands in.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundProperty {
    /// Target column.
    pub column: Column,
    /// Coerced value.
    pub value: Value,
}

/// Builds the insert properties of an entity for its table.
///
/// Properties are renamed to embedded column names, filtered to the
/// declared columns and coerced. Nulls are dropped.
#[must_use]
pub fn node_properties(table: &NodeTable, entity: &Entity) -> Vec<BoundProperty> {
    let mut bound = Vec::new();
    for (property, value) in entity.properties() {
        let Some(column) = table.column(property.embedded()) else {
            tracing::debug!(
                table = table.name,
                property = property.canonical(),
                "Dropping property without a column"
            );
            continue;
        };
        match coerce(&value, column.ty) {
            Some(value) => bound.push(BoundProperty {
                column: *column,
                value,
            }),
            None => tracing::debug!(
                table = table.name,
                column = column.name,
                "Dropping value incompatible with column type"
            ),
        }
    }
    bound
}

/// Filters an edge property bag to the table's declared columns.
///
/// Table groups carry no properties, so their bags are dropped entirely.
#[must_use]
pub fn relationship_properties(table: &RelTable, props: &Map<String, Value>) -> Vec<BoundProperty> {
    if table.kind == RelTableKind::Group {
        if !props.is_empty() {
            tracing::debug!(
                table = table.name,
                dropped = props.len(),
                "Dropping properties on grouped relationship"
            );
        }
        return Vec::new();
    }
    table
        .columns
        .iter()
        .filter_map(|column| {
            let value = coerce(props.get(column.name)?, column.ty)?;
            Some(BoundProperty {
                column: *column,
                value,
            })
        })
        .collect()
}

/// Maps an engine error message onto the crate taxonomy.
///
/// Unknown tables and properties become [`Error::SchemaMismatch`], engine
/// feature gaps [`Error::UnsupportedDialectFeature`], everything else
/// [`Error::QueryFailed`].
#[must_use]
pub fn classify_engine_error(operation: &str, message: &str) -> Error {
    let lowered = message.to_lowercase();
    if lowered.contains("cannot find property")
        || lowered.contains("does not exist")
        || lowered.contains("not found in table")
        || lowered.contains("not connected through rel")
    {
        return Error::SchemaMismatch {
            operation: operation.to_string(),
            cause: message.to_string(),
        };
    }
    if lowered.contains("not supported") || lowered.contains("not implemented") {
        return Error::UnsupportedDialectFeature {
            feature: "engine".to_string(),
            detail: message.to_string(),
        };
    }
    Error::QueryFailed {
        operation: operation.to_string(),
        cause: message.to_string(),
    }
}
