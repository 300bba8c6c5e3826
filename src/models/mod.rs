//! Value types exchanged with the graph store.
//!
//! Entities and relationships are produced by the ingestion pipeline and
//! carry no reference back to the store that persists them.

mod entity;
mod property;
mod relationship;
mod results;

pub use entity::{Entity, EntityAttributes, NodeType, short_name};
pub use property::Property;
pub use relationship::{Relationship, RelationshipType};
pub use results::{
    FileMetadata, GraphStats, NodeSummary, Params, PoolMetrics, Record, record_i64, record_str,
};
