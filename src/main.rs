//! Binary entry point for codegraph-store.
//!
//! Operator CLI over the graph store: identifier checks, dialect
//! adaptation, schema output and a handful of maintenance commands.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use codegraph_store::observability::{self, LogFormat, LoggingConfig};
use codegraph_store::storage::embedded::schema::ddl_statements;
use codegraph_store::{
    BackendKind, GraphStore, Params, QueryDialectAdapter, StoreConfig, open_graph_store,
    validate_identifier,
};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

/// codegraph-store - persistence layer for code knowledge graphs.
#[derive(Parser)]
#[command(name = "codegraph-store")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true, env = "CODEGRAPH_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend override (neo4j or kuzu).
    #[arg(short, long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Check a label, relationship type or property name.
    Validate {
        /// Candidate identifier.
        candidate: String,

        /// Where the identifier would be used.
        #[arg(long, default_value = "identifier")]
        context: String,
    },

    /// Rewrite a canonical query into the embedded dialect.
    Adapt {
        /// Query text.
        query: String,
    },

    /// Print the embedded schema DDL.
    Schema,

    /// Create the embedded schema or networked indexes.
    InitSchema,

    /// Run a query against the configured backend.
    Query {
        /// Query text in the canonical dialect.
        cypher: String,

        /// Return an empty result on dialect or schema errors.
        #[arg(long)]
        safe: bool,

        /// Query parameter as key=value (value parsed as JSON, else string).
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Timeout in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Show node and relationship counts.
    Stats,

    /// Delete a file and everything it contains.
    DeleteFile {
        /// File path as ingested.
        path: String,
    },

    /// Show connection pool metrics (networked backend).
    PoolMetrics,
}

fn main() -> ExitCode {
    // Missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    let mut logging = LoggingConfig::from_env(cli.verbose, format);
    if let Some(path) = &cli.log_file {
        logging = logging.with_file(path);
    }
    if let Err(e) = observability::init_logging(logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StoreConfig::load_default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(backend) = &cli.backend {
        let Some(kind) = BackendKind::parse(backend) else {
            bail!("unknown backend {backend:?} (expected neo4j or kuzu)");
        };
        config = config.with_backend(kind);
    }
    Ok(config)
}

fn open_store(cli: &Cli) -> Result<Box<dyn GraphStore>> {
    let config = load_config(cli)?;
    open_graph_store(&config)
        .with_context(|| format!("opening {} store", config.backend.as_str()))
}

/// Runs the selected command.
fn run_command(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Validate { candidate, context } => cmd_validate(candidate, context),
        Commands::Adapt { query } => cmd_adapt(query),
        Commands::Schema => {
            for (_, ddl) in ddl_statements() {
                println!("{ddl};");
            }
            Ok(())
        },
        Commands::InitSchema => {
            let store = open_store(&cli)?;
            store.ensure_indexes()?;
            println!("Schema ready ({})", store.backend_name());
            Ok(())
        },
        Commands::Query {
            cypher,
            safe,
            params,
            timeout_ms,
        } => {
            let store = open_store(&cli)?;
            cmd_query(store.as_ref(), cypher, *safe, params, *timeout_ms)
        },
        Commands::Stats => {
            let store = open_store(&cli)?;
            let stats = store.get_stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        },
        Commands::DeleteFile { path } => {
            let store = open_store(&cli)?;
            let deleted = store.delete_file_entities(path)?;
            println!("Deleted {deleted} node(s)");
            Ok(())
        },
        Commands::PoolMetrics => {
            let store = open_store(&cli)?;
            match store.pool_metrics() {
                Some(metrics) => println!("{}", serde_json::to_string_pretty(&metrics)?),
                None => println!("{} backend has no connection pool", store.backend_name()),
            }
            Ok(())
        },
    }
}

fn cmd_validate(candidate: &str, context: &str) -> Result<()> {
    let accepted = validate_identifier(candidate, context)?;
    println!("ok: {accepted}");
    Ok(())
}

fn cmd_adapt(query: &str) -> Result<()> {
    match QueryDialectAdapter::default().adapt(query) {
        Ok(adapted) => {
            println!("{adapted}");
            Ok(())
        },
        Err(feature) => bail!("{feature}"),
    }
}

fn cmd_query(
    store: &dyn GraphStore,
    cypher: &str,
    safe: bool,
    raw_params: &[String],
    timeout_ms: Option<u64>,
) -> Result<()> {
    let params = parse_params(raw_params)?;
    let timeout = timeout_ms.map(std::time::Duration::from_millis);
    let rows = if safe {
        store.execute_query_safe(cypher, &params, timeout, Vec::new())?
    } else {
        store.execute_query(cypher, &params, timeout)?
    };
    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }
    eprintln!("{} row(s)", rows.len());
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<Params> {
    let mut params = Params::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("parameter {entry:?} is not key=value");
        };
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
        params.insert(key.trim().to_string(), value);
    }
    Ok(params)
}
