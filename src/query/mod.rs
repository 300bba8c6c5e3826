//! Query dialect handling.

mod adapter;
mod segments;

pub use adapter::{
    QueryDialectAdapter, UnsupportedFeature, detect_unsupported, rename_functions,
    rename_properties, variable_length_types,
};
pub use segments::strip_comments;
