//! Canonical-to-embedded dialect rewriting.
//!
//! Pipeline, in order:
//!
//! 1. strip `//` and `/* */` comments;
//! 2. reject constructs the embedded dialect cannot express;
//! 3. rename properties spelled differently in the embedded schema;
//! 4. expand logical relationship types that span several tables;
//! 5. rename builtin functions.
//!
//! Steps 3 to 5 only touch code, never string literals or backtick-quoted
//! identifiers. Every step is idempotent, so adapting an adapted query is a
//! no-op.

// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use super::segments;
use crate::models::Property;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// A canonical-dialect construct with no faithful embedded translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedFeature {
    /// `shortestPath(...)` / `allShortestPaths(...)`.
    ShortestPath,
    /// `ORDER BY id(n)` or `ORDER BY elementId(n)`.
    OrderByInternalId,
    /// List or pattern comprehension with an inline `WHERE`.
    FilteredComprehension,
    /// `list[a..b]`.
    ListSlice,
    /// `COALESCE(x, {})`.
    CoalesceEmptyMap,
}

impl UnsupportedFeature {
    /// Returns all variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ShortestPath,
            Self::OrderByInternalId,
            Self::FilteredComprehension,
            Self::ListSlice,
            Self::CoalesceEmptyMap,
        ]
    }

    /// Stable reason string.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::ShortestPath => "shortest_path",
            Self::OrderByInternalId => "order_by_internal_id",
            Self::FilteredComprehension => "filtered_comprehension",
            Self::ListSlice => "list_slice",
            Self::CoalesceEmptyMap => "coalesce_empty_map",
        }
    }

    /// Human-readable explanation.
    #[must_use]
    pub const fn detail(self) -> &'static str {
        match self {
            Self::ShortestPath => "shortest path functions are not available",
            Self::OrderByInternalId => "internal node ids have no stable order",
            Self::FilteredComprehension => "comprehensions cannot filter inline",
            Self::ListSlice => "list slice syntax is not available",
            Self::CoalesceEmptyMap => "an empty map literal cannot be a COALESCE default",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::ShortestPath => &SHORTEST_PATH,
            Self::OrderByInternalId => &ORDER_BY_ID,
            Self::FilteredComprehension => &FILTERED_COMPREHENSION,
            Self::ListSlice => &LIST_SLICE,
            Self::CoalesceEmptyMap => &COALESCE_EMPTY_MAP,
        }
    }
}

impl fmt::Display for UnsupportedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl std::error::Error for UnsupportedFeature {}

impl From<UnsupportedFeature> for crate::Error {
    fn from(feature: UnsupportedFeature) -> Self {
        Self::UnsupportedDialectFeature {
            feature: feature.reason().to_string(),
            detail: feature.detail().to_string(),
        }
    }
}

static SHORTEST_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:all)?shortest(?:path|paths)\s*\(").expect("static regex")
});

static ORDER_BY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bORDER\s+BY\s+(?:[\w.]+(?:\s+(?:ASC|DESC))?\s*,\s*)*(?:id|elementId)\s*\(",
    )
    .expect("static regex")
});

static FILTERED_COMPREHENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:[A-Za-z_]\w*\s+IN\b|\()(?:[^\[\]]|\[[^\[\]]*\])*?\bWHERE\b")
        .expect("static regex")
});

static LIST_SLICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w)\]]\s*\[[^\[\]*:]*\.\.[^\[\]]*\]").expect("static regex")
});

static COALESCE_EMPTY_MAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bCOALESCE\s*\([^()]*,\s*\{\s*\}\s*\)").expect("static regex")
});

static PROPERTY_RENAMES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| Property::renamed().collect());

static PROPERTY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    let mut names: Vec<&str> = PROPERTY_RENAMES.keys().copied().collect();
    names.sort_unstable();
    Regex::new(&format!(r"(?P<pre>^|[^$\w])(?P<name>{})\b", names.join("|")))
        .expect("static regex")
});

static REL_TYPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[(?P<head>\s*(?:[A-Za-z_]\w*)?\s*:\s*)(?P<types>[A-Za-z_]\w*(?:\s*\|\s*:?\s*[A-Za-z_]\w*)*)(?P<star>\s*\*)?",
    )
    .expect("static regex")
});

const FUNCTION_RENAMES: &[(&str, &str)] = &[
    ("elementid", "id"),
    ("tolower", "lower"),
    ("toupper", "upper"),
    ("tofloat", "to_double"),
    ("tointeger", "to_int64"),
];

static FUNCTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<pre>^|[^.\w$])(?P<name>elementId|toLower|toUpper|toFloat|toInteger)(?P<ws>\s*)\(")
        .expect("static regex")
});

/// Rewrites canonical-dialect queries for the embedded engine.
///
/// The adapter is stateless apart from the relationship fan-out table, which
/// maps a logical relationship type to the concrete tables it is stored in.
#[derive(Debug, Clone)]
pub struct QueryDialectAdapter {
    fanout: HashMap<String, Vec<String>>,
}

impl Default for QueryDialectAdapter {
    fn default() -> Self {
        Self::new(crate::storage::embedded::schema::relationship_fanout())
    }
}

impl QueryDialectAdapter {
    /// Creates an adapter with a custom fan-out table.
    #[must_use]
    pub const fn new(fanout: HashMap<String, Vec<String>>) -> Self {
        Self { fanout }
    }

    /// Adapts `query`, returning a new string or the first unsupported
    /// construct found.
    ///
    /// # Errors
    ///
    /// Returns the [`UnsupportedFeature`] when the query cannot be expressed
    /// in the embedded dialect.
    pub fn adapt(&self, query: &str) -> Result<String, UnsupportedFeature> {
        let stripped = segments::strip_comments(query);
        if let Some(feature) = detect_unsupported(&stripped) {
            return Err(feature);
        }
        Ok(segments::map_code(&stripped, |code| {
            let code = rename_properties(code);
            let code = self.expand_relationship_types(&code);
            rename_functions(&code)
        }))
    }

    /// Expands fanned-out relationship types into label unions.
    ///
    /// Variable-length patterns are left alone.
    #[must_use]
    pub fn expand_relationship_types(&self, code: &str) -> String {
        REL_TYPES
            .replace_all(code, |caps: &Captures<'_>| {
                let whole = &caps[0];
                if caps.name("star").is_some() {
                    return whole.to_string();
                }
                let original: Vec<&str> = caps["types"]
                    .split('|')
                    .map(|t| t.trim().trim_start_matches(':').trim())
                    .collect();
                let mut expanded: Vec<&str> = Vec::with_capacity(original.len());
                for rel_type in &original {
                    let tables = self
                        .fanout
                        .get(*rel_type)
                        .map_or_else(|| vec![*rel_type], |t| t.iter().map(String::as_str).collect());
                    for table in tables {
                        if !expanded.contains(&table) {
                            expanded.push(table);
                        }
                    }
                }
                if expanded == original {
                    return whole.to_string();
                }
                format!("[{}{}", &caps["head"], expanded.join("|"))
            })
            .into_owned()
    }
}

/// Relationship types named in variable-length patterns such as
/// `[:CONTAINS*1..3]`, in order of appearance.
///
/// String literals and comments are ignored.
#[must_use]
pub fn variable_length_types(query: &str) -> Vec<String> {
    let masked = segments::masked(query);
    REL_TYPES
        .captures_iter(&masked)
        .filter(|caps| caps.name("star").is_some())
        .flat_map(|caps| {
            caps["types"]
                .split('|')
                .map(|t| t.trim().trim_start_matches(':').trim().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Returns the first construct in `query` the embedded dialect cannot run.
///
/// String literals and comments are ignored.
#[must_use]
pub fn detect_unsupported(query: &str) -> Option<UnsupportedFeature> {
    let masked = segments::masked(query);
    UnsupportedFeature::all()
        .iter()
        .copied()
        .find(|feature| feature.pattern().is_match(&masked))
}

/// Renames canonical property names to their embedded spelling.
///
/// Whole words only; `$parameter` names are kept.
#[must_use]
pub fn rename_properties(code: &str) -> String {
    PROPERTY_NAME
        .replace_all(code, |caps: &Captures<'_>| {
            let name = &caps["name"];
            let renamed = PROPERTY_RENAMES.get(name).copied().unwrap_or(name);
            format!("{}{renamed}", &caps["pre"])
        })
        .into_owned()
}

/// Renames builtin functions whose embedded name differs.
#[must_use]
pub fn rename_functions(code: &str) -> String {
    FUNCTION_NAME
        .replace_all(code, |caps: &Captures<'_>| {
            let name = &caps["name"];
            let lowered = name.to_ascii_lowercase();
            let renamed = FUNCTION_RENAMES
                .iter()
                .find(|(from, _)| *from == lowered)
                .map_or(name, |(_, to)| to);
            format!("{}{renamed}{}(", &caps["pre"], &caps["ws"])
        })
        .into_owned()
}
