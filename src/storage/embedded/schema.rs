//! Static schema of the embedded engine.
//!
//! The embedded engine refuses to create nodes or relationships whose tables
//! were not declared up front, so the whole code-graph shape lives here:
//!
//! - one node table per [`NodeType`] keyed by `qualifiedName`, plus the
//!   schema-only `Finding` table written by detectors;
//! - **individual** relationship tables for edges that carry properties
//!   (grouped tables cannot), split per `(source, target)` pair;
//! - **table groups** for property-less edges whose logical type spans many
//!   node-type pairs.
//!
//! [`resolve_relationship_table`] maps a logical relationship and its
//! endpoint types to the concrete table, falling back to the logical name.

use crate::models::{NodeType, Property, RelationshipType};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Column type in the embedded schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `STRING`
    String,
    /// `INT64`
    Int64,
    /// `DOUBLE`
    Double,
    /// `BOOLEAN`
    Bool,
    /// `STRING[]`
    StringList,
    /// `DOUBLE[]`
    DoubleList,
}

impl ColumnType {
    /// DDL spelling.
    #[must_use]
    pub const fn ddl(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Int64 => "INT64",
            Self::Double => "DOUBLE",
            Self::Bool => "BOOLEAN",
            Self::StringList => "STRING[]",
            Self::DoubleList => "DOUBLE[]",
        }
    }
}

/// A declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Column type.
    pub ty: ColumnType,
}

impl Column {
    const fn prop(property: Property, ty: ColumnType) -> Self {
        Self {
            name: property.embedded(),
            ty,
        }
    }

    const fn named(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

/// A node table declaration.
#[derive(Debug)]
pub struct NodeTable {
    /// Table name.
    pub name: &'static str,
    /// Columns; the first is the primary key.
    pub columns: &'static [Column],
}

impl NodeTable {
    /// Returns the primary key column.
    #[must_use]
    pub const fn primary_key(&self) -> &'static str {
        self.columns[0].name
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Storage shape of a relationship table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelTableKind {
    /// One `(source, target)` pair, may carry properties.
    Individual,
    /// Many pairs under one name, no properties.
    Group,
}

/// A relationship table declaration.
#[derive(Debug)]
pub struct RelTable {
    /// Table (or group) name.
    pub name: &'static str,
    /// Individual or group.
    pub kind: RelTableKind,
    /// Declared `(source table, target table)` pairs.
    pub pairs: &'static [(&'static str, &'static str)],
    /// Property columns (always empty for groups).
    pub columns: &'static [Column],
}

impl RelTable {
    /// Looks up a property column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

use ColumnType::{Bool, DoubleList, Int64, String as Str, StringList};

const QN: Column = Column::prop(Property::QualifiedName, Str);
const NAME: Column = Column::prop(Property::Name, Str);
const FILE_PATH: Column = Column::prop(Property::FilePath, Str);
const LINE_START: Column = Column::prop(Property::LineStart, Int64);
const LINE_END: Column = Column::prop(Property::LineEnd, Int64);
const MODULE: Column = Column::prop(Property::Module, Str);
const COMPLEXITY: Column = Column::prop(Property::Complexity, Int64);
const LOC: Column = Column::prop(Property::Loc, Int64);
const DECORATORS: Column = Column::prop(Property::Decorators, StringList);
const DOCSTRING: Column = Column::prop(Property::Docstring, Str);
const EMBEDDING: Column = Column::prop(Property::Embedding, DoubleList);
const EXTERNAL: Column = Column::prop(Property::External, Bool);

/// Table name of the schema-only finding node.
pub const FINDING_TABLE: &str = "Finding";

/// Node tables in declaration order.
pub static NODE_TABLES: &[NodeTable] = &[
    NodeTable {
        name: "File",
        columns: &[
            QN,
            NAME,
            FILE_PATH,
            Column::prop(Property::Language, Str),
            LOC,
            Column::prop(Property::Hash, Str),
            Column::prop(Property::LastModified, Int64),
            DOCSTRING,
            EMBEDDING,
        ],
    },
    NodeTable {
        name: "Module",
        columns: &[QN, NAME, FILE_PATH, EXTERNAL],
    },
    NodeTable {
        name: "Class",
        columns: &[
            QN,
            NAME,
            FILE_PATH,
            LINE_START,
            LINE_END,
            COMPLEXITY,
            LOC,
            Column::prop(Property::IsAbstract, Bool),
            DECORATORS,
            DOCSTRING,
            EMBEDDING,
            EXTERNAL,
        ],
    },
    NodeTable {
        name: "Function",
        columns: &[
            QN,
            NAME,
            FILE_PATH,
            LINE_START,
            LINE_END,
            COMPLEXITY,
            LOC,
            Column::prop(Property::IsAsync, Bool),
            Column::prop(Property::IsMethod, Bool),
            Column::prop(Property::Parameters, StringList),
            DECORATORS,
            Column::prop(Property::ReturnType, Str),
            DOCSTRING,
            EMBEDDING,
            EXTERNAL,
        ],
    },
    NodeTable {
        name: "Variable",
        columns: &[QN, NAME, FILE_PATH, LINE_START, LINE_END],
    },
    NodeTable {
        name: "Attribute",
        columns: &[QN, NAME, FILE_PATH, LINE_START, LINE_END],
    },
    NodeTable {
        name: "Import",
        columns: &[QN, NAME, FILE_PATH, LINE_START, LINE_END, MODULE],
    },
    NodeTable {
        name: "Concept",
        columns: &[QN, NAME, DOCSTRING, EMBEDDING],
    },
    NodeTable {
        name: "ExternalFunction",
        columns: &[QN, NAME, MODULE, EXTERNAL],
    },
    NodeTable {
        name: "ExternalClass",
        columns: &[QN, NAME, MODULE, EXTERNAL],
    },
    NodeTable {
        name: "BuiltinFunction",
        columns: &[QN, NAME, MODULE, EXTERNAL],
    },
    NodeTable {
        name: FINDING_TABLE,
        columns: &[
            Column::named("id", Str),
            Column::named("detector", Str),
            Column::named("severity", Str),
            Column::named("message", Str),
            Column::named("created_at", Int64),
        ],
    },
];

const CALL_PROPS: &[Column] = &[
    Column::named("line", Int64),
    Column::named("call_name", Str),
    Column::named("is_self_call", Bool),
];
const IMPORT_PROPS: &[Column] = &[Column::named("line", Int64), Column::named("alias", Str)];
const INHERIT_PROPS: &[Column] = &[Column::named("position", Int64)];

/// Relationship tables in declaration order (individual tables first).
pub static REL_TABLES: &[RelTable] = &[
    RelTable {
        name: "CALLS",
        kind: RelTableKind::Individual,
        pairs: &[("Function", "Function")],
        columns: CALL_PROPS,
    },
    RelTable {
        name: "CALLS_CLASS",
        kind: RelTableKind::Individual,
        pairs: &[("Function", "Class")],
        columns: CALL_PROPS,
    },
    RelTable {
        name: "CALLS_EXT_FUNC",
        kind: RelTableKind::Individual,
        pairs: &[("Function", "ExternalFunction")],
        columns: CALL_PROPS,
    },
    RelTable {
        name: "CALLS_EXT_CLASS",
        kind: RelTableKind::Individual,
        pairs: &[("Function", "ExternalClass")],
        columns: CALL_PROPS,
    },
    RelTable {
        name: "CALLS_BUILTIN",
        kind: RelTableKind::Individual,
        pairs: &[("Function", "BuiltinFunction")],
        columns: CALL_PROPS,
    },
    RelTable {
        name: "IMPORTS",
        kind: RelTableKind::Individual,
        pairs: &[("File", "Module")],
        columns: IMPORT_PROPS,
    },
    RelTable {
        name: "IMPORTS_FILE",
        kind: RelTableKind::Individual,
        pairs: &[("File", "File")],
        columns: IMPORT_PROPS,
    },
    RelTable {
        name: "IMPORTS_CLASS",
        kind: RelTableKind::Individual,
        pairs: &[("File", "Class")],
        columns: IMPORT_PROPS,
    },
    RelTable {
        name: "IMPORTS_FUNC",
        kind: RelTableKind::Individual,
        pairs: &[("File", "Function")],
        columns: IMPORT_PROPS,
    },
    RelTable {
        name: "IMPORTS_EXT_CLASS",
        kind: RelTableKind::Individual,
        pairs: &[("File", "ExternalClass")],
        columns: IMPORT_PROPS,
    },
    RelTable {
        name: "IMPORTS_EXT_FUNC",
        kind: RelTableKind::Individual,
        pairs: &[("File", "ExternalFunction")],
        columns: IMPORT_PROPS,
    },
    RelTable {
        name: "INHERITS",
        kind: RelTableKind::Individual,
        pairs: &[("Class", "Class")],
        columns: INHERIT_PROPS,
    },
    RelTable {
        name: "INHERITS_EXT",
        kind: RelTableKind::Individual,
        pairs: &[("Class", "ExternalClass")],
        columns: INHERIT_PROPS,
    },
    RelTable {
        name: "OVERRIDES",
        kind: RelTableKind::Individual,
        pairs: &[("Function", "Function")],
        columns: &[],
    },
    RelTable {
        name: "CONTAINS",
        kind: RelTableKind::Group,
        pairs: &[
            ("File", "Class"),
            ("File", "Function"),
            ("File", "Variable"),
            ("File", "Import"),
            ("Class", "Function"),
            ("Class", "Attribute"),
            ("Class", "Class"),
            ("Function", "Function"),
            ("Module", "File"),
        ],
        columns: &[],
    },
    RelTable {
        name: "DEFINES",
        kind: RelTableKind::Group,
        pairs: &[
            ("File", "Class"),
            ("File", "Function"),
            ("File", "Variable"),
            ("Class", "Function"),
            ("Class", "Attribute"),
            ("Module", "Class"),
            ("Module", "Function"),
        ],
        columns: &[],
    },
    RelTable {
        name: "USES",
        kind: RelTableKind::Group,
        pairs: &[
            ("Function", "Variable"),
            ("Function", "Attribute"),
            ("Function", "Class"),
            ("Function", "Function"),
            ("Function", "Module"),
        ],
        columns: &[],
    },
    RelTable {
        name: "DECORATES",
        kind: RelTableKind::Group,
        pairs: &[
            ("Function", "Function"),
            ("Function", "Class"),
            ("ExternalFunction", "Function"),
            ("ExternalFunction", "Class"),
            ("BuiltinFunction", "Function"),
        ],
        columns: &[],
    },
    RelTable {
        name: "TESTS",
        kind: RelTableKind::Group,
        pairs: &[
            ("Function", "Function"),
            ("Function", "Class"),
            ("Function", "Module"),
            ("File", "File"),
        ],
        columns: &[],
    },
    RelTable {
        name: "FLAGGED_BY",
        kind: RelTableKind::Group,
        pairs: &[
            ("File", FINDING_TABLE),
            ("Class", FINDING_TABLE),
            ("Function", FINDING_TABLE),
            ("Module", FINDING_TABLE),
        ],
        columns: &[],
    },
];

type RouteKey = (RelationshipType, NodeType, NodeType);

/// Concrete table for `(logical type, source type, target type)`.
///
/// Pairs missing here use the logical type name directly.
static RELATIONSHIP_ROUTES: &[(RouteKey, &str)] = {
    use NodeType::{
        BuiltinFunction as BF, Class as C, ExternalClass as EC, ExternalFunction as EF, File,
        Function as F, Module,
    };
    use RelationshipType::{Calls, CallsExternal, Imports, Inherits};
    &[
        ((Calls, F, F), "CALLS"),
        ((Calls, F, C), "CALLS_CLASS"),
        ((Calls, F, EF), "CALLS_EXT_FUNC"),
        ((Calls, F, EC), "CALLS_EXT_CLASS"),
        ((Calls, F, BF), "CALLS_BUILTIN"),
        ((CallsExternal, F, EF), "CALLS_EXT_FUNC"),
        ((CallsExternal, F, EC), "CALLS_EXT_CLASS"),
        ((CallsExternal, F, BF), "CALLS_BUILTIN"),
        ((Imports, File, File), "IMPORTS_FILE"),
        ((Imports, File, Module), "IMPORTS"),
        ((Imports, File, C), "IMPORTS_CLASS"),
        ((Imports, File, F), "IMPORTS_FUNC"),
        ((Imports, File, EC), "IMPORTS_EXT_CLASS"),
        ((Imports, File, EF), "IMPORTS_EXT_FUNC"),
        ((Inherits, C, C), "INHERITS"),
        ((Inherits, C, EC), "INHERITS_EXT"),
    ]
};

static ROUTE_MAP: LazyLock<HashMap<RouteKey, &'static str>> =
    LazyLock::new(|| RELATIONSHIP_ROUTES.iter().copied().collect());

/// Order in which node tables are searched to resolve a qualified name.
pub const LOOKUP_ORDER: &[NodeType] = &[
    NodeType::Function,
    NodeType::Class,
    NodeType::File,
    NodeType::Module,
    NodeType::Variable,
    NodeType::Attribute,
    NodeType::Import,
    NodeType::Concept,
    NodeType::ExternalFunction,
    NodeType::ExternalClass,
    NodeType::BuiltinFunction,
];

/// Tables that accept a bare-name match when no qualified name matches.
pub const NAME_FALLBACK_TABLES: &[NodeType] = &[NodeType::Class, NodeType::ExternalClass];

/// Returns true if `identifier` has no path-like separator, making it
/// eligible for the bare-name fallback.
#[must_use]
pub fn is_bare_name(identifier: &str) -> bool {
    !identifier.is_empty() && !identifier.contains(['.', '/', '\\', ':'])
}

/// Resolves the concrete relationship table for a logical edge.
#[must_use]
pub fn resolve_relationship_table(
    rel_type: RelationshipType,
    source: NodeType,
    target: NodeType,
) -> &'static str {
    ROUTE_MAP
        .get(&(rel_type, source, target))
        .copied()
        .unwrap_or_else(|| rel_type.as_str())
}

/// Returns the node table declared for a node type.
#[must_use]
pub fn node_table(node_type: NodeType) -> Option<&'static NodeTable> {
    NODE_TABLES.iter().find(|t| t.name == node_type.as_str())
}

/// Returns a relationship table or group by name.
#[must_use]
pub fn rel_table(name: &str) -> Option<&'static RelTable> {
    REL_TABLES.iter().find(|t| t.name == name)
}

/// Returns true when `node_type` is declared as the source of a `CONTAINS`
/// pair. Every other type is a leaf of the containment tree, and the engine
/// rejects a `CONTAINS` pattern that starts from it.
#[must_use]
pub fn is_container(node_type: NodeType) -> bool {
    rel_table(RelationshipType::Contains.as_str())
        .is_some_and(|t| t.pairs.iter().any(|(src, _)| *src == node_type.as_str()))
}

/// Logical relationship names that fan out over several individual tables,
/// mapped to those tables (logical name first when it is itself a table).
#[must_use]
pub fn relationship_fanout() -> HashMap<String, Vec<String>> {
    let mut fanout: HashMap<String, Vec<String>> = HashMap::new();
    for rel_type in RelationshipType::all() {
        let logical = rel_type.as_str();
        let mut tables: Vec<String> = Vec::new();
        if rel_table(logical).is_some_and(|t| t.kind == RelTableKind::Individual) {
            tables.push(logical.to_string());
        }
        for ((route_type, _, _), table) in RELATIONSHIP_ROUTES {
            if route_type == rel_type && !tables.iter().any(|t| t == table) {
                tables.push((*table).to_string());
            }
        }
        if tables.len() > 1 || tables.first().is_some_and(|t| t != logical) {
            fanout.insert(logical.to_string(), tables);
        }
    }
    fanout
}

/// `CREATE NODE TABLE` statement.
#[must_use]
pub fn node_table_ddl(table: &NodeTable) -> String {
    let columns = table
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.ty.ddl()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE NODE TABLE {}({columns}, PRIMARY KEY ({}))",
        table.name,
        table.primary_key()
    )
}

/// `CREATE REL TABLE` or `CREATE REL TABLE GROUP` statement.
#[must_use]
pub fn rel_table_ddl(table: &RelTable) -> String {
    let mut parts: Vec<String> = table
        .pairs
        .iter()
        .map(|(from, to)| format!("FROM {from} TO {to}"))
        .collect();
    parts.extend(
        table
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.ty.ddl())),
    );
    let keyword = match table.kind {
        RelTableKind::Individual => "REL TABLE",
        RelTableKind::Group => "REL TABLE GROUP",
    };
    format!("CREATE {keyword} {}({})", table.name, parts.join(", "))
}

/// All DDL in dependency order, as `(table name, statement)` pairs.
#[must_use]
pub fn ddl_statements() -> Vec<(&'static str, String)> {
    NODE_TABLES
        .iter()
        .map(|t| (t.name, node_table_ddl(t)))
        .chain(REL_TABLES.iter().map(|t| (t.name, rel_table_ddl(t))))
        .collect()
}
