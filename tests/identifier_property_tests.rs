//! Differential property tests for the identifier validator.
//!
//! `is_safe_identifier` below is an independent reference model of the
//! grammar `[A-Za-z0-9_-]{1,100}`, written without sharing code with the
//! crate. The validator must agree with it on every input.

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use codegraph_store::security::MAX_IDENTIFIER_LENGTH;
use codegraph_store::{ErrorKind, validate_identifier};
use proptest::prelude::*;

/// Reference model: byte-level check over an explicit alphabet.
fn is_safe_identifier(s: &str) -> bool {
    const ALPHABET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";
    !s.is_empty() && s.len() <= 100 && s.bytes().all(|b| ALPHABET.contains(&b))
}

/// Characters that matter for query injection.
const INJECTION_CHARS: &[char] = &['\'', '"', ';', '{', '}', '/', '\\', '\n', '\r', '\t', ' '];

fn adversarial_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::sample::select(INJECTION_CHARS.to_vec()),
        prop::sample::select(vec!['`', '$', '(', ')', '[', ']', ':', '.', '\0', '\u{7f}']),
        prop::sample::select(vec!['é', 'Ω', '\u{200b}', '\u{feff}', 'ｆ']),
        prop::char::range('a', 'z'),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// Property: validator and reference agree on arbitrary strings.
    #[test]
    fn prop_agrees_on_arbitrary_strings(s in any::<String>()) {
        prop_assert_eq!(validate_identifier(&s, "test").is_ok(), is_safe_identifier(&s));
    }

    /// Property: validator and reference agree near the alphabet and length edges.
    #[test]
    fn prop_agrees_on_near_miss_strings(s in "[A-Za-z0-9_\\- '\";{}/\\\\.`$]{0,110}") {
        prop_assert_eq!(validate_identifier(&s, "test").is_ok(), is_safe_identifier(&s));
    }

    /// Property: accepted identifiers are returned unchanged.
    #[test]
    fn prop_accepted_identifiers_unchanged(s in "[A-Za-z0-9_-]{1,100}") {
        prop_assert_eq!(validate_identifier(&s, "test").unwrap(), s.as_str());
    }

    /// Property: one adversarial character anywhere in a valid identifier is
    /// rejected exactly when the reference rejects it.
    #[test]
    fn prop_single_adversarial_char(
        prefix in "[A-Za-z0-9_-]{0,49}",
        suffix in "[A-Za-z0-9_-]{0,49}",
        c in adversarial_char(),
    ) {
        let candidate = format!("{prefix}{c}{suffix}");
        let result = validate_identifier(&candidate, "test");
        prop_assert_eq!(result.is_ok(), is_safe_identifier(&candidate));
        if let Err(e) = result {
            prop_assert_eq!(e.kind(), ErrorKind::InvalidIdentifier);
        }
    }
}

#[test]
fn test_every_injection_char_is_rejected_at_every_position() {
    for c in INJECTION_CHARS {
        for position in [0, 5, 10] {
            let mut candidate = "identifier".to_string();
            candidate.insert(position, *c);
            assert!(
                validate_identifier(&candidate, "test").is_err(),
                "{candidate:?} accepted"
            );
        }
    }
}

#[test]
fn test_length_boundaries() {
    assert_eq!(MAX_IDENTIFIER_LENGTH, 100);
    assert!(validate_identifier("", "test").is_err());
    assert!(validate_identifier(&"a".repeat(100), "test").is_ok());
    assert!(validate_identifier(&"a".repeat(101), "test").is_err());
}

#[test]
fn test_known_payloads_rejected() {
    let payloads = [
        "'; DROP DATABASE",
        "test' OR '1'='1",
        "user; MATCH (n) DETACH DELETE n",
        "Function` DETACH DELETE n //",
        "Label}) RETURN n //",
        "{{label}}",
        "${label}",
        "../../etc/passwd",
        "a\nMATCH (n) DELETE n",
        "name\u{0}",
    ];
    for payload in payloads {
        let err = validate_identifier(payload, "node label").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier, "{payload:?}");
        assert!(!is_safe_identifier(payload));
    }
}

#[test]
fn test_error_message_never_echoes_long_payload() {
    let payload = format!("x'{}", "y".repeat(200));
    let message = validate_identifier(&payload, "node label")
        .unwrap_err()
        .to_string();
    assert!(!message.contains(&payload));
}

#[test]
fn test_known_safe_corpus_accepted() {
    let hundred = "a".repeat(100);
    for safe in ["my_graph", "test123_data-v2", hundred.as_str(), "CALLS_EXT_FUNC", "-"] {
        assert_eq!(validate_identifier(safe, "test").unwrap(), safe);
        assert!(is_safe_identifier(safe));
    }
}
