//! Configuration management.
//!
//! Sources, lowest to highest precedence: defaults, a TOML file, environment
//! variables, then builder calls made by the embedding application.

mod uri;

pub use uri::{BOLT_PORT, BoltScheme, BoltUri, HTTP_PORT, parse_bolt_uri};

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which graph engine backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Client/server engine over Bolt.
    #[default]
    Neo4j,
    /// Embedded, schema-required engine.
    Kuzu,
}

impl BackendKind {
    /// Parses a backend name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "neo4j" | "network" | "bolt" => Some(Self::Neo4j),
            "kuzu" | "embedded" => Some(Self::Kuzu),
            _ => None,
        }
    }

    /// Returns the backend name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neo4j => "neo4j",
            Self::Kuzu => "kuzu",
        }
    }
}

/// Networked store settings.
#[derive(Debug, Clone)]
pub struct NetworkStoreConfig {
    /// Bolt connection URI.
    pub uri: String,
    /// Username.
    pub username: String,
    /// Password. Never printed.
    pub password: SecretString,
    /// Target database; server default when unset.
    pub database: Option<String>,
    /// Total attempt budget for connect and transient query failures.
    pub max_retries: u32,
    /// Multiplier applied to the delay after every failed attempt.
    pub backoff_factor: f64,
    /// Delay before the second attempt.
    pub base_delay_ms: u64,
    /// Maximum pooled connections.
    pub max_connection_pool_size: usize,
    /// How long an operation waits for a pooled connection.
    pub connection_acquisition_timeout_ms: u64,
    /// Pool age after which connections are recycled.
    pub max_connection_lifetime_secs: u64,
    /// Default per-query timeout.
    pub query_timeout_ms: u64,
    /// Require TLS.
    pub encrypted: bool,
    /// Rows fetched per round trip.
    pub fetch_size: usize,
}

impl Default for NetworkStoreConfig {
    fn default() -> Self {
        Self {
            uri: format!("bolt://localhost:{BOLT_PORT}"),
            username: "neo4j".to_string(),
            password: SecretString::from(String::new()),
            database: None,
            max_retries: 3,
            backoff_factor: 2.0,
            base_delay_ms: 1000,
            max_connection_pool_size: 50,
            connection_acquisition_timeout_ms: 60_000,
            max_connection_lifetime_secs: 3600,
            query_timeout_ms: 60_000,
            encrypted: false,
            fetch_size: 500,
        }
    }
}

impl NetworkStoreConfig {
    /// Validates the URI and applies the encryption flag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for non-Bolt URIs.
    pub fn bolt_uri(&self) -> crate::Result<BoltUri> {
        parse_bolt_uri(&self.uri, self.encrypted)
    }

    /// Default per-query timeout.
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Maximum connection lifetime.
    #[must_use]
    pub const fn max_connection_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_connection_lifetime_secs)
    }

    /// Connection acquisition timeout.
    #[must_use]
    pub const fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_acquisition_timeout_ms)
    }

    /// Sets the URI.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Sets username and password.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = SecretString::from(password.into());
        self
    }

    /// Sets the target database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the attempt budget (at least one attempt is always made).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Sets backoff base delay and factor.
    #[must_use]
    pub const fn with_backoff(mut self, base_delay_ms: u64, backoff_factor: f64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.backoff_factor = backoff_factor;
        self
    }

    /// Sets the default query timeout.
    #[must_use]
    pub const fn with_query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.query_timeout_ms = timeout_ms;
        self
    }
}

/// Embedded store settings.
#[derive(Debug, Clone)]
pub struct EmbeddedStoreConfig {
    /// Database directory.
    pub db_path: PathBuf,
    /// Open without schema bootstrap or writes.
    pub read_only: bool,
    /// Buffer pool size in bytes; engine default when unset.
    pub buffer_pool_size: Option<u64>,
    /// Worker threads; engine default when unset.
    pub max_num_threads: Option<u64>,
}

impl Default for EmbeddedStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".codegraph/kuzu"),
            read_only: false,
            buffer_pool_size: None,
            max_num_threads: None,
        }
    }
}

impl EmbeddedStoreConfig {
    /// Creates a config for a database directory.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    /// Sets the read-only flag.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Complete store configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Selected backend.
    pub backend: BackendKind,
    /// Networked store settings.
    pub network: NetworkStoreConfig,
    /// Embedded store settings.
    pub embedded: EmbeddedStoreConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Backend name.
    pub backend: Option<String>,
    /// `[neo4j]` section.
    pub neo4j: Option<ConfigFileNetwork>,
    /// `[kuzu]` section.
    pub kuzu: Option<ConfigFileEmbedded>,
}

/// `[neo4j]` section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileNetwork {
    /// Connection URI.
    pub uri: Option<String>,
    /// Username.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Database.
    pub database: Option<String>,
    /// Attempt budget.
    pub max_retries: Option<u32>,
    /// Backoff factor.
    pub backoff_factor: Option<f64>,
    /// Base delay.
    pub base_delay_ms: Option<u64>,
    /// Pool size.
    pub max_connection_pool_size: Option<usize>,
    /// Acquisition timeout.
    pub connection_acquisition_timeout_ms: Option<u64>,
    /// Connection lifetime.
    pub max_connection_lifetime_secs: Option<u64>,
    /// Query timeout.
    pub query_timeout_ms: Option<u64>,
    /// TLS flag.
    pub encrypted: Option<bool>,
    /// Fetch size.
    pub fetch_size: Option<usize>,
}

/// `[kuzu]` section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEmbedded {
    /// Database directory.
    pub db_path: Option<String>,
    /// Read-only flag.
    pub read_only: Option<bool>,
    /// Buffer pool size.
    pub buffer_pool_size: Option<u64>,
    /// Worker threads.
    pub max_num_threads: Option<u64>,
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an embedded-backend configuration for a database directory.
    #[must_use]
    pub fn embedded(db_path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Kuzu,
            embedded: EmbeddedStoreConfig::new(db_path),
            ..Self::default()
        }
    }

    /// Creates a networked-backend configuration for a URI.
    #[must_use]
    pub fn network(uri: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Neo4j,
            network: NetworkStoreConfig::default().with_uri(uri),
            ..Self::default()
        }
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or names an unknown
    /// backend.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir, then `~/.config/codegraph/`. Returns
    /// defaults if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("codegraph").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("codegraph")
                .join("config.toml"),
        ];
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    fn from_config_file(file: ConfigFile) -> crate::Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = file.backend {
            config.backend = BackendKind::parse(&backend).ok_or_else(|| {
                crate::Error::InvalidInput(format!("unknown backend {backend:?}"))
            })?;
        }
        if let Some(n) = file.neo4j {
            let net = &mut config.network;
            if let Some(v) = n.uri {
                net.uri = v;
            }
            if let Some(v) = n.username {
                net.username = v;
            }
            if let Some(v) = n.password {
                net.password = SecretString::from(v);
            }
            if n.database.is_some() {
                net.database = n.database;
            }
            if let Some(v) = n.max_retries {
                net.max_retries = v.max(1);
            }
            if let Some(v) = n.backoff_factor {
                net.backoff_factor = v;
            }
            if let Some(v) = n.base_delay_ms {
                net.base_delay_ms = v;
            }
            if let Some(v) = n.max_connection_pool_size {
                net.max_connection_pool_size = v.max(1);
            }
            if let Some(v) = n.connection_acquisition_timeout_ms {
                net.connection_acquisition_timeout_ms = v;
            }
            if let Some(v) = n.max_connection_lifetime_secs {
                net.max_connection_lifetime_secs = v;
            }
            if let Some(v) = n.query_timeout_ms {
                net.query_timeout_ms = v;
            }
            if let Some(v) = n.encrypted {
                net.encrypted = v;
            }
            if let Some(v) = n.fetch_size {
                net.fetch_size = v.max(1);
            }
        }
        if let Some(k) = file.kuzu {
            let emb = &mut config.embedded;
            if let Some(v) = k.db_path {
                emb.db_path = PathBuf::from(v);
            }
            if let Some(v) = k.read_only {
                emb.read_only = v;
            }
            if k.buffer_pool_size.is_some() {
                emb.buffer_pool_size = k.buffer_pool_size;
            }
            if k.max_num_threads.is_some() {
                emb.max_num_threads = k.max_num_threads;
            }
        }

        Ok(config)
    }

    /// Applies `CODEGRAPH_*` environment variable overrides.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("CODEGRAPH_BACKEND") {
            match BackendKind::parse(&v) {
                Some(kind) => self.backend = kind,
                None => tracing::warn!(value = %v, "Ignoring unknown CODEGRAPH_BACKEND"),
            }
        }
        if let Some(v) = lookup("CODEGRAPH_NEO4J_URI") {
            self.network.uri = v;
        }
        if let Some(v) = lookup("CODEGRAPH_NEO4J_USER") {
            self.network.username = v;
        }
        if let Some(v) = lookup("CODEGRAPH_NEO4J_PASSWORD") {
            self.network.password = SecretString::from(v);
        }
        if let Some(v) = lookup("CODEGRAPH_NEO4J_DATABASE") {
            self.network.database = Some(v).filter(|d| !d.is_empty());
        }
        if let Some(v) = parsed::<u32>(&lookup, "CODEGRAPH_NEO4J_MAX_RETRIES") {
            self.network.max_retries = v.max(1);
        }
        if let Some(v) = parsed::<usize>(&lookup, "CODEGRAPH_NEO4J_POOL_SIZE") {
            self.network.max_connection_pool_size = v.max(1);
        }
        if let Some(v) = parsed::<u64>(&lookup, "CODEGRAPH_NEO4J_QUERY_TIMEOUT_MS") {
            self.network.query_timeout_ms = v;
        }
        if let Some(v) = lookup("CODEGRAPH_KUZU_PATH") {
            self.embedded.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CODEGRAPH_KUZU_READ_ONLY") {
            self.embedded.read_only = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        self
    }

    /// Sets the backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let value = raw.trim().parse::<T>().ok();
    if value.is_none() {
        tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
    }
    value
}
