//! Embedded backend.
//!
//! [`schema`], [`statements`] and [`values`] are pure and always compiled;
//! the engine binding needs the `kuzu` feature.

pub mod schema;
pub mod statements;
pub mod values;

#[cfg(feature = "kuzu")]
mod store;

#[cfg(feature = "kuzu")]
pub use store::EmbeddedGraphStore;
