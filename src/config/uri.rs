//! Bolt connection URI validation.

use crate::{Error, Result};
use std::fmt;

/// Default Bolt port.
pub const BOLT_PORT: u16 = 7687;

/// HTTP management port, a common misconfiguration.
pub const HTTP_PORT: u16 = 7474;

/// Accepted URI schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoltScheme {
    /// `bolt://`, plain direct connection.
    Bolt,
    /// `bolt+s://`, TLS with full certificate verification.
    BoltSecure,
    /// `bolt+ssc://`, TLS accepting self-signed certificates.
    BoltSelfSigned,
    /// `neo4j://`, routed connection.
    Neo4j,
    /// `neo4j+s://`
    Neo4jSecure,
    /// `neo4j+ssc://`
    Neo4jSelfSigned,
}

impl BoltScheme {
    /// Parses a scheme, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bolt" => Some(Self::Bolt),
            "bolt+s" => Some(Self::BoltSecure),
            "bolt+ssc" => Some(Self::BoltSelfSigned),
            "neo4j" => Some(Self::Neo4j),
            "neo4j+s" => Some(Self::Neo4jSecure),
            "neo4j+ssc" => Some(Self::Neo4jSelfSigned),
            _ => None,
        }
    }

    /// Returns the scheme as written in a URI.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bolt => "bolt",
            Self::BoltSecure => "bolt+s",
            Self::BoltSelfSigned => "bolt+ssc",
            Self::Neo4j => "neo4j",
            Self::Neo4jSecure => "neo4j+s",
            Self::Neo4jSelfSigned => "neo4j+ssc",
        }
    }

    /// Returns true if the scheme requires TLS.
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        !matches!(self, Self::Bolt | Self::Neo4j)
    }

    /// Upgrades a plain scheme to its verified TLS variant.
    #[must_use]
    pub const fn encrypted(self) -> Self {
        match self {
            Self::Bolt => Self::BoltSecure,
            Self::Neo4j => Self::Neo4jSecure,
            other => other,
        }
    }
}

/// A validated Bolt endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoltUri {
    /// Scheme.
    pub scheme: BoltScheme,
    /// Host name or address (IPv6 addresses keep their brackets).
    pub host: String,
    /// Port.
    pub port: u16,
}

impl BoltUri {
    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for BoltUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

/// Validates a connection URI.
///
/// HTTP schemes and the HTTP management port are rejected with a hint towards
/// the Bolt port. With `encrypted` set, a plain scheme is upgraded to `+s`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for any URI that cannot reach a Bolt
/// endpoint.
pub fn parse_bolt_uri(uri: &str, encrypted: bool) -> Result<BoltUri> {
    let uri = uri.trim();
    let Some((scheme, rest)) = uri.split_once("://") else {
        return Err(Error::InvalidInput(format!(
            "connection URI {uri:?} has no scheme; expected bolt://host:{BOLT_PORT}"
        )));
    };

    if matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "connection URI {uri:?} uses the HTTP API; use bolt://host:{BOLT_PORT} instead"
        )));
    }
    let Some(scheme) = BoltScheme::parse(scheme) else {
        return Err(Error::InvalidInput(format!(
            "unsupported URI scheme {scheme:?}; expected one of bolt, bolt+s, bolt+ssc, neo4j, neo4j+s, neo4j+ssc"
        )));
    };

    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    if authority.contains('@') {
        return Err(Error::InvalidInput(
            "credentials must be configured separately, not embedded in the URI".to_string(),
        ));
    }
    let (host, port) = split_host_port(authority)?;
    if host.is_empty() {
        return Err(Error::InvalidInput(format!(
            "connection URI {uri:?} has no host"
        )));
    }
    if port == HTTP_PORT {
        return Err(Error::InvalidInput(format!(
            "port {HTTP_PORT} is the HTTP port; the Bolt protocol listens on {BOLT_PORT}"
        )));
    }

    Ok(BoltUri {
        scheme: if encrypted { scheme.encrypted() } else { scheme },
        host: host.to_string(),
        port,
    })
}

fn split_host_port(authority: &str) -> Result<(&str, u16)> {
    // Bracketed IPv6 literal: the port, if any, follows the closing bracket.
    let (host, port) = if authority.starts_with('[') {
        match authority.find(']') {
            Some(end) => {
                let (host, tail) = authority.split_at(end + 1);
                (host, tail.strip_prefix(':'))
            },
            None => {
                return Err(Error::InvalidInput(format!(
                    "unterminated IPv6 address in {authority:?}"
                )));
            },
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    let port = match port {
        None | Some("") => BOLT_PORT,
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| Error::InvalidInput(format!("invalid port {p:?}")))?,
    };
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bolt_schemes() {
        for scheme in ["bolt", "bolt+s", "bolt+ssc", "neo4j", "neo4j+s", "neo4j+ssc"] {
            let parsed = parse_bolt_uri(&format!("{scheme}://db.internal:7687"), false).unwrap();
            assert_eq!(parsed.scheme.as_str(), scheme);
            assert_eq!(parsed.address(), "db.internal:7687");
        }
    }

    #[test]
    fn test_default_port() {
        let parsed = parse_bolt_uri("bolt://localhost", false).unwrap();
        assert_eq!(parsed.port, BOLT_PORT);
        assert_eq!(parsed.to_string(), "bolt://localhost:7687");
    }

    #[test]
    fn test_rejects_http_with_hint() {
        let err = parse_bolt_uri("http://localhost:7474", false).unwrap_err();
        assert!(err.to_string().contains("7687"));
        let err = parse_bolt_uri("https://example.com", false).unwrap_err();
        assert!(err.to_string().contains("bolt://"));
    }

    #[test]
    fn test_rejects_http_port_on_bolt_scheme() {
        let err = parse_bolt_uri("bolt://localhost:7474", false).unwrap_err();
        assert!(err.to_string().contains("7474"));
        assert!(err.to_string().contains("7687"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_bolt_uri("localhost:7687", false).is_err());
        assert!(parse_bolt_uri("ftp://localhost", false).is_err());
        assert!(parse_bolt_uri("bolt://:7687", false).is_err());
        assert!(parse_bolt_uri("bolt://localhost:notaport", false).is_err());
        assert!(parse_bolt_uri("bolt://user:pw@localhost", false).is_err());
    }

    #[test]
    fn test_encrypted_upgrades_plain_schemes() {
        let parsed = parse_bolt_uri("bolt://localhost", true).unwrap();
        assert_eq!(parsed.scheme, BoltScheme::BoltSecure);
        let parsed = parse_bolt_uri("neo4j://localhost", true).unwrap();
        assert_eq!(parsed.scheme, BoltScheme::Neo4jSecure);
        let parsed = parse_bolt_uri("bolt+ssc://localhost", true).unwrap();
        assert_eq!(parsed.scheme, BoltScheme::BoltSelfSigned);
    }

    #[test]
    fn test_ipv6() {
        let parsed = parse_bolt_uri("bolt://[::1]:7688", false).unwrap();
        assert_eq!(parsed.host, "[::1]");
        assert_eq!(parsed.port, 7688);
        let parsed = parse_bolt_uri("bolt://[::1]", false).unwrap();
        assert_eq!(parsed.port, BOLT_PORT);
    }
}
