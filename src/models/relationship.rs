//! Code graph edges.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of relationship types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationshipType {
    /// Function calls function or instantiates class.
    Calls,
    /// Call into external or builtin code.
    CallsExternal,
    /// File imports module, file or symbol.
    Imports,
    /// Class inherits from class.
    Inherits,
    /// Structural containment (file → class → method).
    Contains,
    /// Definition site.
    Defines,
    /// Reads or writes a symbol.
    Uses,
    /// Method overrides a base-class method.
    Overrides,
    /// Decorator applied to function or class.
    Decorates,
    /// Test exercises a symbol.
    Tests,
}

impl RelationshipType {
    /// Returns all relationship type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Calls,
            Self::CallsExternal,
            Self::Imports,
            Self::Inherits,
            Self::Contains,
            Self::Defines,
            Self::Uses,
            Self::Overrides,
            Self::Decorates,
            Self::Tests,
        ]
    }

    /// Returns the relationship type name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "CALLS",
            Self::CallsExternal => "CALLS_EXTERNAL",
            Self::Imports => "IMPORTS",
            Self::Inherits => "INHERITS",
            Self::Contains => "CONTAINS",
            Self::Defines => "DEFINES",
            Self::Uses => "USES",
            Self::Overrides => "OVERRIDES",
            Self::Decorates => "DECORATES",
            Self::Tests => "TESTS",
        }
    }

    /// Parses a relationship type name. Matching is exact.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown relationship type: {s}"))
    }
}

/// A typed directed edge between two qualified names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Qualified name of the source node.
    pub source_id: String,
    /// Qualified name of the target node.
    pub target_id: String,
    /// Relationship type.
    pub rel_type: RelationshipType,
    /// Edge properties such as `line`, `call_name`, `is_self_call`.
    pub properties: BTreeMap<String, Value>,
}

impl Relationship {
    /// Creates a relationship with an empty property bag.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        rel_type: RelationshipType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            rel_type,
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the property bag with null values removed.
    #[must_use]
    pub fn non_null_properties(&self) -> serde_json::Map<String, Value> {
        self.properties
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
