//! Node property names in both dialects.
//!
//! The networked engine stores properties under their canonical camelCase
//! names. The embedded schema uses snake_case for multi-word properties, with
//! the exception of the `qualifiedName` primary key. This enum is the single
//! source for both spellings: entity property maps, schema column lists and
//! the dialect adapter's rename table are all derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A node property known to the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Property {
    /// Globally unique natural key.
    QualifiedName,
    /// Short display name.
    Name,
    /// Source file path.
    FilePath,
    /// First source line.
    LineStart,
    /// Last source line.
    LineEnd,
    /// Defining module of external and builtin symbols.
    Module,
    /// Cyclomatic complexity.
    Complexity,
    /// Lines of code.
    Loc,
    /// `async` function.
    IsAsync,
    /// Abstract class.
    IsAbstract,
    /// Function defined inside a class.
    IsMethod,
    /// Parameter names.
    Parameters,
    /// Decorator expressions.
    Decorators,
    /// Docstring or description.
    Docstring,
    /// Embedding vector.
    Embedding,
    /// Source language of a file.
    Language,
    /// Content hash of a file.
    Hash,
    /// Modification timestamp (Unix seconds) of a file.
    LastModified,
    /// Declared return type.
    ReturnType,
    /// Placeholder or third-party node.
    External,
}

impl Property {
    /// Returns all properties.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::QualifiedName,
            Self::Name,
            Self::FilePath,
            Self::LineStart,
            Self::LineEnd,
            Self::Module,
            Self::Complexity,
            Self::Loc,
            Self::IsAsync,
            Self::IsAbstract,
            Self::IsMethod,
            Self::Parameters,
            Self::Decorators,
            Self::Docstring,
            Self::Embedding,
            Self::Language,
            Self::Hash,
            Self::LastModified,
            Self::ReturnType,
            Self::External,
        ]
    }

    /// Name used by the canonical (networked) dialect.
    #[must_use]
    pub const fn canonical(self) -> &'static str {
        match self {
            Self::QualifiedName => "qualifiedName",
            Self::Name => "name",
            Self::FilePath => "filePath",
            Self::LineStart => "lineStart",
            Self::LineEnd => "lineEnd",
            Self::Module => "module",
            Self::Complexity => "complexity",
            Self::Loc => "loc",
            Self::IsAsync => "isAsync",
            Self::IsAbstract => "isAbstract",
            Self::IsMethod => "isMethod",
            Self::Parameters => "parameters",
            Self::Decorators => "decorators",
            Self::Docstring => "docstring",
            Self::Embedding => "embedding",
            Self::Language => "language",
            Self::Hash => "hash",
            Self::LastModified => "lastModified",
            Self::ReturnType => "returnType",
            Self::External => "external",
        }
    }

    /// Column name in the embedded schema.
    #[must_use]
    pub const fn embedded(self) -> &'static str {
        match self {
            Self::FilePath => "file_path",
            Self::LineStart => "line_start",
            Self::LineEnd => "line_end",
            Self::IsAsync => "is_async",
            Self::IsAbstract => "is_abstract",
            Self::IsMethod => "is_method",
            Self::LastModified => "last_modified",
            Self::ReturnType => "return_type",
            other => other.canonical(),
        }
    }

    /// Canonical-to-embedded pairs for properties spelled differently.
    pub fn renamed() -> impl Iterator<Item = (&'static str, &'static str)> {
        Self::all()
            .iter()
            .filter(|p| p.canonical() != p.embedded())
            .map(|p| (p.canonical(), p.embedded()))
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_is_not_renamed() {
        assert_eq!(Property::QualifiedName.embedded(), "qualifiedName");
        assert!(Property::renamed().all(|(from, _)| from != "qualifiedName"));
    }

    #[test]
    fn test_file_path_rename() {
        assert_eq!(Property::FilePath.canonical(), "filePath");
        assert_eq!(Property::FilePath.embedded(), "file_path");
    }

    #[test]
    fn test_renamed_targets_never_collide_with_sources() {
        let sources: Vec<_> = Property::renamed().map(|(from, _)| from).collect();
        for (_, to) in Property::renamed() {
            assert!(!sources.contains(&to), "{to} would be renamed twice");
        }
    }

    #[test]
    fn test_all_names_are_safe_identifiers() {
        for property in Property::all() {
            assert!(crate::validate_identifier(property.canonical(), "test").is_ok());
            assert!(crate::validate_identifier(property.embedded(), "test").is_ok());
        }
    }
}
