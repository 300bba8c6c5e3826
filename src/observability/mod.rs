//! Logging and metrics.

mod logging;
mod metrics;

pub use logging::{LOG_FILTER_ENV, LogFormat, LoggingConfig};
pub use metrics::{
    record_batch_row_failure, record_dialect_rejection, record_operation_metrics, record_retry,
    status_label,
};

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global `tracing` subscriber.
///
/// Events go to stderr unless [`LoggingConfig::file`] is set, in which case
/// they are appended to that file without ANSI colouring.
///
/// # Errors
///
/// Returns an error if logging has already been initialized or the log file
/// cannot be opened.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "logging_init".to_string(),
            cause: "logging already initialized".to_string(),
        });
    }

    let (writer, ansi) = match &config.file {
        Some(path) => (BoxMakeWriter::new(Arc::new(open_log_file(path)?)), false),
        None => (BoxMakeWriter::new(io::stderr), true),
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(config.filter);
    match config.format {
        LogFormat::Json => registry
            .with(layer.json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(layer.pretty().with_ansi(ansi)).try_init(),
    }
    .map_err(init_error)?;

    LOGGING_INIT.set(()).map_err(|()| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: "failed to mark logging initialized".to_string(),
    })
}

/// Opens `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_appends_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.log");
        for line in ["first\n", "second\n"] {
            let file = open_log_file(&path).unwrap();
            (&file).write_all(line.as_bytes()).unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_log_file_under_regular_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let err = open_log_file(&blocker.join("store.log")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::OperationFailed);
        assert!(err.to_string().contains("blocker"));
    }
}
