//! Session accounting for the connection pool.

use crate::config::NetworkStoreConfig;
use crate::models::PoolMetrics;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Tracks sessions in use against the configured pool size.
#[derive(Debug, Clone)]
pub struct PoolTracker {
    in_use: Arc<AtomicUsize>,
    max_pool_size: usize,
    acquisition_timeout: Duration,
    max_lifetime: Duration,
    query_timeout: Duration,
}

impl PoolTracker {
    /// Creates a tracker from configuration.
    #[must_use]
    pub fn new(config: &NetworkStoreConfig) -> Self {
        Self {
            in_use: Arc::new(AtomicUsize::new(0)),
            max_pool_size: config.max_connection_pool_size.max(1),
            acquisition_timeout: config.acquisition_timeout(),
            max_lifetime: config.max_connection_lifetime(),
            query_timeout: config.query_timeout(),
        }
    }

    /// Marks a session as in use until the guard drops.
    #[must_use]
    pub fn checkout(&self) -> SessionGuard {
        let now = self.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("graph_store_pool_sessions_in_use").set(now as f64);
        SessionGuard {
            in_use: Arc::clone(&self.in_use),
        }
    }

    /// Sessions currently in use.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Returns true when a pool created at `created` should be recycled.
    ///
    /// A zero lifetime disables recycling.
    #[must_use]
    pub fn is_expired(&self, created: Instant) -> bool {
        !self.max_lifetime.is_zero() && created.elapsed() >= self.max_lifetime
    }

    /// Snapshot for observability.
    #[must_use]
    pub fn snapshot(&self, created: Instant) -> PoolMetrics {
        let in_use = self.in_use();
        PoolMetrics {
            in_use,
            idle: self.max_pool_size.saturating_sub(in_use),
            max_pool_size: self.max_pool_size,
            acquisition_timeout_ms: duration_ms(self.acquisition_timeout),
            max_connection_lifetime_secs: self.max_lifetime.as_secs(),
            query_timeout_ms: duration_ms(self.query_timeout),
            pool_age_secs: created.elapsed().as_secs(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Decrements the in-use count on drop.
#[derive(Debug)]
pub struct SessionGuard {
    in_use: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let now = self.in_use.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!("graph_store_pool_sessions_in_use").set(now as f64);
    }
}
