//! Metric recording helpers.
//!
//! Only the `metrics` facade is used here; installing an exporter is left to
//! the embedding application.

use std::time::Instant;

/// Records the outcome and latency of one store operation.
///
/// Emits `graph_store_operations_total` and
/// `graph_store_operation_duration_ms`, both labelled by backend, operation
/// and status (`"success"` or `"error"`).
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "graph_store_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "graph_store_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Records a retry of a transient failure.
pub fn record_retry(backend: &'static str, operation: &'static str) {
    metrics::counter!(
        "graph_store_retries_total",
        "backend" => backend,
        "operation" => operation
    )
    .increment(1);
}

/// Records a row skipped inside a batch write.
pub fn record_batch_row_failure(backend: &'static str, operation: &'static str) {
    metrics::counter!(
        "graph_store_batch_row_failures_total",
        "backend" => backend,
        "operation" => operation
    )
    .increment(1);
}

/// Records a query rejected by the dialect adapter.
pub fn record_dialect_rejection(feature: &'static str) {
    metrics::counter!("graph_store_dialect_rejections_total", "feature" => feature).increment(1);
}

/// Maps a result to the status label.
#[must_use]
pub const fn status_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_record_operation_metrics_without_recorder() {
        let start = Instant::now();
        thread::sleep(Duration::from_millis(1));
        record_operation_metrics("kuzu", "execute_query", start, "success");
        record_operation_metrics("neo4j", "execute_query", start, "error");
        record_retry("neo4j", "connect");
        record_batch_row_failure("kuzu", "batch_create_nodes");
        record_dialect_rejection("shortest_path");
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label::<(), ()>(&Ok(())), "success");
        assert_eq!(status_label::<(), ()>(&Err(())), "error");
    }

    #[test]
    fn test_concurrent_recording() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let status = if i % 2 == 0 { "success" } else { "error" };
                thread::spawn(move || {
                    record_operation_metrics("kuzu", "create_node", Instant::now(), status);
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }
    }
}
