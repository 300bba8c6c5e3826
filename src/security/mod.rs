//! Security boundary for dynamic query construction.
//!
//! Every label, relationship type and property name that is interpolated into
//! query text (rather than bound as a parameter) is validated here first.

mod identifier;

pub use identifier::{MAX_IDENTIFIER_LENGTH, quote_identifier, validate_identifier};
