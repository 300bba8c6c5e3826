//! Networked backend.
//!
//! Statement text lives in [`cypher`] and session accounting in [`pool`];
//! both compile without the driver so they can be tested anywhere.

pub mod cypher;
pub mod pool;

#[cfg(feature = "neo4j")]
mod bolt;
#[cfg(feature = "neo4j")]
mod neo4j;

#[cfg(feature = "neo4j")]
pub use neo4j::NetworkGraphStore;
