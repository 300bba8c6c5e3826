//! Structured logging configuration.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_FILTER_ENV: &str = "CODEGRAPH_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds a configuration from `CODEGRAPH_LOG`, then `RUST_LOG`.
    ///
    /// `verbose` raises the crate's level to `debug` when no filter is set.
    #[must_use]
    pub fn from_env(verbose: bool, format: LogFormat) -> Self {
        let directive = std::env::var(LOG_FILTER_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .filter(|d| !d.trim().is_empty());
        Self {
            format,
            filter: build_filter(directive.as_deref(), verbose),
            file: None,
        }
    }

    /// Writes logs to a file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_env(false, LogFormat::Pretty)
    }
}

fn build_filter(directive: Option<&str>, verbose: bool) -> EnvFilter {
    let fallback = if verbose {
        "info,codegraph_store=debug"
    } else {
        "info"
    };
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}
