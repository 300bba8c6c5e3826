//! # codegraph-store
//!
//! Persistence layer for code knowledge graphs.
//!
//! A code graph (files, classes, functions, modules and the call, import and
//! containment edges between them) is written through one contract,
//! [`GraphStore`], with two interchangeable engines behind it:
//!
//! - **Networked** (`neo4j` feature, default): a Neo4j-compatible server
//!   reached over Bolt, queried in the canonical Cypher dialect.
//! - **Embedded** (`kuzu` feature): an in-process Kuzu database with a
//!   statically typed schema and a divergent dialect. Queries are rewritten by
//!   the [`QueryDialectAdapter`] before execution.
//!
//! Structural query tokens (labels, relationship types, property names) can
//! never be bound as parameters, so every interpolated token passes through
//! [`validate_identifier`] first.
//!
//! ## Example
//!
//! ```rust,ignore
//! use codegraph_store::{Entity, NodeType, StoreConfig, open_graph_store};
//!
//! let store = open_graph_store(&StoreConfig::load_default())?;
//! let entity = Entity::new(NodeType::Function, "pkg.mod.foo", "foo")
//!     .with_location("pkg/mod.py", 10, 24);
//! store.create_node(&entity)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod query;
pub mod security;
pub mod storage;

pub use config::{BackendKind, EmbeddedStoreConfig, NetworkStoreConfig, StoreConfig};
pub use models::{
    Entity, FileMetadata, GraphStats, NodeSummary, NodeType, Params, PoolMetrics, Record,
    Relationship, RelationshipType,
};
pub use query::{QueryDialectAdapter, UnsupportedFeature};
pub use security::validate_identifier;
pub use storage::{GraphStore, open_graph_store};

/// Coarse classification of [`Error`] values.
///
/// Callers working through the [`GraphStore`] contract match on this instead
/// of destructuring the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A structural token failed identifier validation.
    InvalidIdentifier,
    /// The networked engine could not be reached after all retries.
    ConnectionUnavailable,
    /// A query failed for a reason that may clear up on retry.
    TransientQueryFailure,
    /// A query uses a construct the embedded dialect cannot express.
    UnsupportedDialectFeature,
    /// A query references a table or property the embedded schema lacks.
    SchemaMismatch,
    /// The engine rejected the query (syntax or semantics).
    QueryFailed,
    /// The per-call or default timeout elapsed.
    Timeout,
    /// Invalid configuration or arguments.
    InvalidInput,
    /// The requested backend was not compiled in.
    FeatureNotEnabled,
    /// Infrastructure failure (I/O, runtime creation, decoding).
    OperationFailed,
}

/// Error type for graph store operations.
///
/// | Variant | Raised When | Retried |
/// |---------|-------------|---------|
/// | `InvalidIdentifier` | Label/type/property token outside `[A-Za-z0-9_-]{1,100}` | never |
/// | `ConnectionUnavailable` | Connect or transient query failures exhausted the attempt budget | - |
/// | `TransientQueryFailure` | Service unavailable, session expired, connection reset | yes |
/// | `UnsupportedDialectFeature` | Adapter or embedded engine rejects a canonical construct | never |
/// | `SchemaMismatch` | Embedded query names an unknown table or property | never |
/// | `QueryFailed` | Syntax or semantic errors | never |
/// | `Timeout` | Query exceeded its deadline | never |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A structural query token failed validation.
    ///
    /// Always fatal to the triggering call.
    #[error("invalid identifier for {context}: {reason}")]
    InvalidIdentifier {
        /// Where the token was going to be interpolated (e.g. "node label").
        context: String,
        /// Why it was rejected. Contains an escaped, truncated excerpt only.
        reason: String,
    },

    /// The networked engine stayed unreachable for the whole retry budget.
    #[error("graph backend '{target}' unavailable after {attempts} attempt(s): {cause}")]
    ConnectionUnavailable {
        /// Connection target (URI without credentials).
        target: String,
        /// Attempts made.
        attempts: u32,
        /// Last underlying failure.
        cause: String,
    },

    /// A query failed transiently.
    #[error("transient failure in '{operation}': {cause}")]
    TransientQueryFailure {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The embedded dialect cannot express a construct used by the query.
    #[error("unsupported dialect feature '{feature}': {detail}")]
    UnsupportedDialectFeature {
        /// Stable reason name (see [`UnsupportedFeature::reason`]).
        feature: String,
        /// Human-readable detail.
        detail: String,
    },

    /// The embedded schema lacks a referenced table or property.
    #[error("schema mismatch in '{operation}': {cause}")]
    SchemaMismatch {
        /// The operation that failed.
        operation: String,
        /// Engine message.
        cause: String,
    },

    /// The engine rejected the query.
    #[error("query '{operation}' failed: {cause}")]
    QueryFailed {
        /// The operation that failed.
        operation: String,
        /// Engine message.
        cause: String,
    },

    /// The query deadline elapsed.
    #[error("operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),

    /// An infrastructure operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns the coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            Self::ConnectionUnavailable { .. } => ErrorKind::ConnectionUnavailable,
            Self::TransientQueryFailure { .. } => ErrorKind::TransientQueryFailure,
            Self::UnsupportedDialectFeature { .. } => ErrorKind::UnsupportedDialectFeature,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::QueryFailed { .. } => ErrorKind::QueryFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::FeatureNotEnabled(_) => ErrorKind::FeatureNotEnabled,
            Self::OperationFailed { .. } => ErrorKind::OperationFailed,
        }
    }

    /// Returns true if the retry loop may re-run the failed operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientQueryFailure { .. })
    }

    /// Returns true for the failures `execute_query_safe` converts into the
    /// caller's default result.
    #[must_use]
    pub const fn is_recoverable_dialect_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDialectFeature { .. } | Self::SchemaMismatch { .. }
        )
    }
}

/// Result type alias for graph store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("bad uri".to_string());
        assert_eq!(err.to_string(), "invalid input: bad uri");

        let err = Error::ConnectionUnavailable {
            target: "bolt://localhost:7687".to_string(),
            attempts: 3,
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "graph backend 'bolt://localhost:7687' unavailable after 3 attempt(s): connection refused"
        );

        let err = Error::UnsupportedDialectFeature {
            feature: "shortest_path".to_string(),
            detail: "shortestPath() has no embedded equivalent".to_string(),
        };
        assert!(err.to_string().starts_with("unsupported dialect feature 'shortest_path'"));
    }

    #[test]
    fn test_error_kind_and_retryability() {
        let transient = Error::TransientQueryFailure {
            operation: "execute_query".to_string(),
            cause: "session expired".to_string(),
        };
        assert_eq!(transient.kind(), ErrorKind::TransientQueryFailure);
        assert!(transient.is_retryable());

        let syntax = Error::QueryFailed {
            operation: "execute_query".to_string(),
            cause: "Invalid input 'MATC'".to_string(),
        };
        assert!(!syntax.is_retryable());
        assert!(!syntax.is_recoverable_dialect_error());

        let identifier = Error::InvalidIdentifier {
            context: "node label".to_string(),
            reason: "empty".to_string(),
        };
        assert!(!identifier.is_retryable());
        assert!(!identifier.is_recoverable_dialect_error());
    }

    #[test]
    fn test_recoverable_dialect_errors() {
        let unsupported = Error::UnsupportedDialectFeature {
            feature: "list_slice".to_string(),
            detail: String::new(),
        };
        let mismatch = Error::SchemaMismatch {
            operation: "execute_query".to_string(),
            cause: "Cannot find property filePath".to_string(),
        };
        assert!(unsupported.is_recoverable_dialect_error());
        assert!(mismatch.is_recoverable_dialect_error());
        assert_eq!(mismatch.kind(), ErrorKind::SchemaMismatch);
    }
}
