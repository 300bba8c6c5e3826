//! Parameter conversion into Bolt values.

use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType};
use serde_json::Value;

/// Converts a JSON value into the Bolt value bound as a query parameter.
///
/// Integers that do not fit `i64` are sent as floats.
#[must_use]
pub fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => n.as_i64().map_or_else(
            || BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
            |i| BoltType::Integer(BoltInteger::new(i)),
        ),
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        },
        Value::Object(map) => {
            let mut bolt = BoltMap::with_capacity(map.len());
            for (key, item) in map {
                bolt.put(BoltString::new(key), to_bolt(item));
            }
            BoltType::Map(bolt)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(to_bolt(&json!(42)), BoltType::Integer(BoltInteger::new(42)));
        assert_eq!(to_bolt(&json!(true)), BoltType::Boolean(BoltBoolean::new(true)));
        assert_eq!(to_bolt(&json!("x")), BoltType::String(BoltString::new("x")));
        assert_eq!(to_bolt(&Value::Null), BoltType::Null(BoltNull));
    }

    #[test]
    fn test_nested() {
        let bolt = to_bolt(&json!({"names": ["a", "b"], "embedding": [0.5, 1.5]}));
        let BoltType::Map(map) = bolt else {
            panic!("expected map");
        };
        assert_eq!(map.value.len(), 2);
    }
}
