//! Code graph nodes.
//!
//! # Node Types
//!
//! | Type | Located | Notes |
//! |------|---------|-------|
//! | `File` | path only | one per source file |
//! | `Class`, `Function`, `Variable`, `Attribute`, `Import` | path + lines | |
//! | `Module` | path only | idempotently upserted |
//! | `Concept` | no | free-floating domain concept |
//! | `ExternalFunction`, `ExternalClass`, `BuiltinFunction` | no | carry `module` instead |

use super::property::Property;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    /// Source file.
    File,
    /// Class definition.
    Class,
    /// Function or method definition.
    Function,
    /// Importable module.
    Module,
    /// Module-level or local variable.
    Variable,
    /// Class attribute.
    Attribute,
    /// Import statement.
    Import,
    /// Domain concept.
    Concept,
    /// Function defined outside the analysed code.
    ExternalFunction,
    /// Class defined outside the analysed code.
    ExternalClass,
    /// Language builtin.
    BuiltinFunction,
}

impl NodeType {
    /// Returns all node type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::File,
            Self::Class,
            Self::Function,
            Self::Module,
            Self::Variable,
            Self::Attribute,
            Self::Import,
            Self::Concept,
            Self::ExternalFunction,
            Self::ExternalClass,
            Self::BuiltinFunction,
        ]
    }

    /// Returns the node label (also the embedded table name).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Class => "Class",
            Self::Function => "Function",
            Self::Module => "Module",
            Self::Variable => "Variable",
            Self::Attribute => "Attribute",
            Self::Import => "Import",
            Self::Concept => "Concept",
            Self::ExternalFunction => "ExternalFunction",
            Self::ExternalClass => "ExternalClass",
            Self::BuiltinFunction => "BuiltinFunction",
        }
    }

    /// Parses a node label. Matching is exact.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == s)
    }

    /// Returns true for nodes defined outside the analysed code.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(
            self,
            Self::ExternalFunction | Self::ExternalClass | Self::BuiltinFunction
        )
    }

    /// Returns true for nodes that carry a line range.
    #[must_use]
    pub const fn has_line_range(&self) -> bool {
        !matches!(self, Self::File | Self::Module | Self::Concept) && !self.is_external()
    }

    /// Returns true for nodes that carry a file path.
    #[must_use]
    pub const fn has_file_path(&self) -> bool {
        !matches!(self, Self::Concept) && !self.is_external()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown node type: {s}"))
    }
}

/// Type-specific optional attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAttributes {
    /// Cyclomatic complexity.
    pub complexity: Option<i64>,
    /// Lines of code.
    pub loc: Option<i64>,
    /// `async` function.
    pub is_async: Option<bool>,
    /// Abstract class.
    pub is_abstract: Option<bool>,
    /// Method (function defined in a class).
    pub is_method: Option<bool>,
    /// Parameter names.
    pub parameters: Vec<String>,
    /// Decorator expressions.
    pub decorators: Vec<String>,
    /// Docstring.
    pub docstring: Option<String>,
    /// Embedding vector.
    pub embedding: Option<Vec<f64>>,
    /// Source language (files).
    pub language: Option<String>,
    /// Content hash (files).
    pub hash: Option<String>,
    /// Modification timestamp in Unix seconds (files).
    pub last_modified: Option<i64>,
    /// Declared return type (functions).
    pub return_type: Option<String>,
}

/// A typed graph node.
///
/// `qualified_name` is the natural key and must be unique within a
/// repository. External and builtin entities carry `module` and never a
/// location; location fields set on them are ignored when persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique natural key.
    pub qualified_name: String,
    /// Short name.
    pub name: String,
    /// Node type.
    pub node_type: NodeType,
    /// Source file path.
    pub file_path: Option<String>,
    /// First source line.
    pub line_start: Option<i64>,
    /// Last source line.
    pub line_end: Option<i64>,
    /// Defining module (external and builtin entities).
    pub module: Option<String>,
    /// Type-specific attributes.
    pub attributes: EntityAttributes,
}

impl Entity {
    /// Creates an entity with no location or attributes.
    #[must_use]
    pub fn new(
        node_type: NodeType,
        qualified_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name: name.into(),
            node_type,
            file_path: None,
            line_start: None,
            line_end: None,
            module: None,
            attributes: EntityAttributes::default(),
        }
    }

    /// Creates a `File` entity keyed by its path.
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = short_name(&path).to_string();
        Self::new(NodeType::File, path.clone(), name).with_file_path(path)
    }

    /// Sets the file path.
    #[must_use]
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Sets file path and line range.
    #[must_use]
    pub fn with_location(mut self, path: impl Into<String>, start: i64, end: i64) -> Self {
        self.file_path = Some(path.into());
        self.line_start = Some(start);
        self.line_end = Some(end);
        self
    }

    /// Sets the defining module.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Replaces the attribute set.
    #[must_use]
    pub fn with_attributes(mut self, attributes: EntityAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Returns the persisted properties in canonical order, nulls omitted.
    ///
    /// Location fields are emitted only for node types that carry them;
    /// external and builtin entities emit `module` and `external = true`
    /// instead.
    #[must_use]
    pub fn properties(&self) -> Vec<(Property, Value)> {
        let mut props = vec![
            (Property::QualifiedName, Value::from(self.qualified_name.as_str())),
            (Property::Name, Value::from(self.name.as_str())),
        ];
        let t = self.node_type;

        if t.has_file_path() {
            push_opt(&mut props, Property::FilePath, self.file_path.as_deref());
        }
        if t.has_line_range() {
            push_opt(&mut props, Property::LineStart, self.line_start);
            push_opt(&mut props, Property::LineEnd, self.line_end);
        }
        if t.is_external() || t == NodeType::Import {
            push_opt(&mut props, Property::Module, self.module.as_deref());
        }
        if t.is_external() {
            props.push((Property::External, Value::Bool(true)));
        }

        let a = &self.attributes;
        push_opt(&mut props, Property::Complexity, a.complexity);
        push_opt(&mut props, Property::Loc, a.loc);
        push_opt(&mut props, Property::IsAsync, a.is_async);
        push_opt(&mut props, Property::IsAbstract, a.is_abstract);
        push_opt(&mut props, Property::IsMethod, a.is_method);
        if !a.parameters.is_empty() {
            props.push((Property::Parameters, Value::from(a.parameters.clone())));
        }
        if !a.decorators.is_empty() {
            props.push((Property::Decorators, Value::from(a.decorators.clone())));
        }
        push_opt(&mut props, Property::Docstring, a.docstring.as_deref());
        if let Some(embedding) = a.embedding.as_ref().filter(|e| !e.is_empty()) {
            props.push((Property::Embedding, Value::from(embedding.clone())));
        }
        push_opt(&mut props, Property::Language, a.language.as_deref());
        push_opt(&mut props, Property::Hash, a.hash.as_deref());
        push_opt(&mut props, Property::LastModified, a.last_modified);
        push_opt(&mut props, Property::ReturnType, a.return_type.as_deref());

        props
    }

    /// Returns the canonical-dialect property map.
    #[must_use]
    pub fn canonical_properties(&self) -> serde_json::Map<String, Value> {
        self.properties()
            .into_iter()
            .map(|(p, v)| (p.canonical().to_string(), v))
            .collect()
    }
}

fn push_opt<T: Into<Value>>(props: &mut Vec<(Property, Value)>, property: Property, v: Option<T>) {
    if let Some(v) = v {
        props.push((property, v.into()));
    }
}

/// Best-effort short name of a qualified name or path.
///
/// `"pkg.mod.foo"` → `"foo"`, `"src/app/main.py"` → `"main.py"`,
/// `"a::b::C"` → `"C"`.
#[must_use]
pub fn short_name(qualified_name: &str) -> &str {
    let trimmed = qualified_name.trim_end_matches(['/', '\\']);
    if trimmed.contains(['/', '\\']) {
        return trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    }
    trimmed
        .rsplit(['.', ':'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(trimmed)
}
