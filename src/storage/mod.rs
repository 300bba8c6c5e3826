//! Storage layer.
//!
//! One contract, [`GraphStore`], and two engines behind it:
//! - **Networked** (`neo4j` feature): Neo4j-compatible server over Bolt
//! - **Embedded** (`kuzu` feature): in-process Kuzu database
//!
//! The backend is chosen once, at construction, by [`open_graph_store`].

// Allow cast precision loss for gauge and duration values.
#![allow(clippy::cast_precision_loss)]
// Allow significant_drop_tightening - lock guards span whole batches on purpose.
#![allow(clippy::significant_drop_tightening)]
// Allow match_same_arms for explicit enum handling.
#![allow(clippy::match_same_arms)]

pub mod embedded;
pub mod network;
pub mod resilience;
pub mod traits;

#[cfg(feature = "kuzu")]
pub use embedded::EmbeddedGraphStore;
#[cfg(feature = "neo4j")]
pub use network::NetworkGraphStore;
pub use resilience::{Backoff, RetryPolicy, is_transient_failure};
pub use traits::GraphStore;

use crate::config::{BackendKind, StoreConfig};
use crate::Result;

/// Opens the store selected by `config.backend`.
///
/// # Errors
///
/// Returns [`crate::Error::FeatureNotEnabled`] if the backend was not
/// compiled in, or the backend's own connect/open error.
pub fn open_graph_store(config: &StoreConfig) -> Result<Box<dyn GraphStore>> {
    tracing::debug!(backend = config.backend.as_str(), "Opening graph store");
    match config.backend {
        BackendKind::Neo4j => open_network(config),
        BackendKind::Kuzu => open_embedded(config),
    }
}

#[cfg(feature = "neo4j")]
fn open_network(config: &StoreConfig) -> Result<Box<dyn GraphStore>> {
    Ok(Box::new(NetworkGraphStore::connect(config.network.clone())?))
}

#[cfg(not(feature = "neo4j"))]
fn open_network(_config: &StoreConfig) -> Result<Box<dyn GraphStore>> {
    Err(crate::Error::FeatureNotEnabled("neo4j".to_string()))
}

#[cfg(feature = "kuzu")]
fn open_embedded(config: &StoreConfig) -> Result<Box<dyn GraphStore>> {
    Ok(Box::new(EmbeddedGraphStore::open(config.embedded.clone())?))
}

#[cfg(not(feature = "kuzu"))]
fn open_embedded(_config: &StoreConfig) -> Result<Box<dyn GraphStore>> {
    Err(crate::Error::FeatureNotEnabled("kuzu".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "kuzu"))]
    #[test]
    fn test_embedded_requires_feature() {
        let config = StoreConfig::embedded("/tmp/unused-graph");
        let err = open_graph_store(&config).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::FeatureNotEnabled);
    }

    #[cfg(not(feature = "neo4j"))]
    #[test]
    fn test_network_requires_feature() {
        let config = StoreConfig::network("bolt://localhost:7687");
        let err = open_graph_store(&config).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::FeatureNotEnabled);
    }

    #[cfg(feature = "neo4j")]
    #[test]
    fn test_network_rejects_management_port() {
        let config = StoreConfig::network("bolt://localhost:7474");
        let err = open_graph_store(&config).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }
}
