//! Safe-identifier validation for interpolated query tokens.
//!
//! Cypher cannot bind node labels, relationship types or property names used
//! in schema position as parameters. Those tokens are spliced into the query
//! text, so they are checked against an exhaustive allow-list:
//!
//! ```text
//! safe_identifier := [A-Za-z0-9_-]{1,100}
//! ```
//!
//! Anything not explicitly permitted is rejected, which covers quotes,
//! semicolons, braces, slashes, backslashes, whitespace, control characters
//! and any non-ASCII code point.

use crate::{Error, Result};

/// Maximum accepted identifier length in characters.
pub const MAX_IDENTIFIER_LENGTH: usize = 100;

/// Longest excerpt of a rejected candidate echoed back in error messages.
const EXCERPT_LENGTH: usize = 32;

/// Returns true if `c` belongs to the identifier alphabet.
const fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Validates a token that is about to be interpolated into a query.
///
/// Returns the candidate unchanged on success.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentifier`] if the candidate is empty, longer than
/// [`MAX_IDENTIFIER_LENGTH`] characters, or contains a character outside
/// `[A-Za-z0-9_-]`.
///
/// # Examples
///
/// ```rust
/// use codegraph_store::validate_identifier;
///
/// assert_eq!(validate_identifier("Function", "node label").unwrap(), "Function");
/// assert!(validate_identifier("x' OR '1'='1", "node label").is_err());
/// ```
pub fn validate_identifier<'a>(candidate: &'a str, context: &str) -> Result<&'a str> {
    if candidate.is_empty() {
        return Err(rejection(context, "identifier is empty".to_string()));
    }

    let length = candidate.chars().count();
    if length > MAX_IDENTIFIER_LENGTH {
        return Err(rejection(
            context,
            format!("identifier is {length} characters long (maximum {MAX_IDENTIFIER_LENGTH})"),
        ));
    }

    if let Some((position, ch)) = candidate
        .chars()
        .enumerate()
        .find(|(_, ch)| !is_identifier_char(*ch))
    {
        return Err(rejection(
            context,
            format!(
                "character {ch:?} at position {position} is not allowed in {}",
                excerpt(candidate)
            ),
        ));
    }

    Ok(candidate)
}

/// Validates a token and wraps it in backticks for interpolation.
///
/// Backticks let labels containing `-` parse as a single token; the allow-list
/// guarantees the token itself contains no backtick.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentifier`] under the same conditions as
/// [`validate_identifier`].
pub fn quote_identifier(candidate: &str, context: &str) -> Result<String> {
    validate_identifier(candidate, context).map(|token| format!("`{token}`"))
}

fn rejection(context: &str, reason: String) -> Error {
    metrics::counter!("graph_store_identifier_rejections_total").increment(1);
    tracing::warn!(context, reason = %reason, "Rejected query identifier");
    Error::InvalidIdentifier {
        context: context.to_string(),
        reason,
    }
}

/// Debug-escaped, truncated rendering of an untrusted candidate.
fn excerpt(candidate: &str) -> String {
    let truncated: String = candidate.chars().take(EXCERPT_LENGTH).collect();
    if truncated.len() < candidate.len() {
        format!("{truncated:?}...")
    } else {
        format!("{truncated:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_simple_identifiers() {
        for candidate in ["Function", "CALLS_EXT_FUNC", "my-graph", "a", "_", "-", "v2"] {
            assert_eq!(validate_identifier(candidate, "test").ok(), Some(candidate));
        }
    }

    #[test]
    fn test_length_boundaries() {
        let max = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_identifier(&max, "test").is_ok());

        let too_long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let err = validate_identifier(&too_long, "test").unwrap_err();
        assert!(err.to_string().contains("101 characters"));

        assert!(validate_identifier("", "test").is_err());
    }

    #[test]
    fn test_rejects_injection_characters() {
        for ch in ['\'', '"', ';', '{', '}', '/', '\\', '\n', '\r', '\t', ' ', '`', '\0'] {
            let candidate = format!("label{ch}suffix");
            assert!(
                validate_identifier(&candidate, "test").is_err(),
                "expected rejection of {candidate:?}"
            );
        }
    }

    #[test]
    fn test_rejects_non_ascii() {
        assert!(validate_identifier("Fünction", "test").is_err());
        assert!(validate_identifier("ｆｕｎｃ", "test").is_err());
    }

    #[test]
    fn test_error_carries_context_and_escapes_payload() {
        let err = validate_identifier("a\nMATCH (n) DETACH DELETE n", "relationship type")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("relationship type"));
        assert!(message.contains("'\\n'"));
        assert!(!message.contains('\n'));
    }

    #[test]
    fn test_excerpt_truncates_long_payloads() {
        let payload = format!("{}'", "x".repeat(200));
        let err = validate_identifier(&payload, "test").unwrap_err();
        assert!(err.to_string().len() < 200);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("Class", "node label").unwrap(), "`Class`");
        assert!(quote_identifier("Cl`ass", "node label").is_err());
    }
}
