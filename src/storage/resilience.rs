//! Bounded exponential backoff for transient backend failures.
//!
//! # Retry States
//!
//! ```text
//! +---------+   transient failure, budget left   +---------+
//! | Attempt | ---------------------------------> | Waiting |
//! +---------+                                    +---------+
//!   |     |                                           |
//!   |     |  success            delay elapsed         |
//!   |     v                                           |
//!   |  +----+     <-----------------------------------+
//!   |  | Ok |
//!   |  +----+
//!   |
//!   |  non-transient failure, or budget exhausted
//!   v
//! +-------+
//! | Error |
//! +-------+
//! ```
//!
//! The attempt budget counts every attempt including the first, so a budget
//! of 3 waits at most twice: `base_delay`, then `base_delay * factor`.

use crate::config::NetworkStoreConfig;
use crate::observability::record_retry;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Longest single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Retry policy derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Multiplier applied after every further failure.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&NetworkStoreConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy from networked store settings.
    #[must_use]
    pub fn from_config(config: &NetworkStoreConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            backoff_factor: config.backoff_factor,
        }
    }

    /// Returns the delay after the given failed attempt (1-based):
    /// `base_delay * backoff_factor^(attempt - 1)`, capped at one minute.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= MAX_DELAY.as_secs_f64() {
            return MAX_DELAY;
        }
        Duration::from_secs_f64(secs)
    }

    /// Starts a fresh backoff sequence.
    #[must_use]
    pub const fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 1,
        }
    }
}

/// Backoff state for one operation.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    /// The attempt currently in progress (1-based).
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records a failure of the current attempt.
    ///
    /// Returns the delay before the next attempt, or `None` once the budget
    /// is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.delay_after(self.attempt);
        self.attempt += 1;
        Some(delay)
    }
}

/// Classifies a driver error message as transient.
///
/// Matches service unavailability, expired sessions, dropped connections and
/// any server-side `Neo.TransientError.*` code.
#[must_use]
pub fn is_transient_failure(message: &str) -> bool {
    const MARKERS: &[&str] = &[
        "serviceunavailable",
        "service unavailable",
        "sessionexpired",
        "session expired",
        "connection reset",
        "connection refused",
        "connection aborted",
        "broken pipe",
        "unexpected eof",
        "neo.transienterror",
        "leader switch",
        "no routing servers",
    ];
    let lowered = message.to_lowercase();
    MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Runs `call` until it succeeds, fails non-transiently, or the budget is
/// spent.
///
/// Only [`Error::TransientQueryFailure`] is retried. An exhausted budget
/// surfaces as [`Error::ConnectionUnavailable`] carrying the last cause.
///
/// # Errors
///
/// Returns the first non-transient error, or `ConnectionUnavailable`.
pub async fn retry_transient<T, F, Fut>(
    policy: RetryPolicy,
    backend: &'static str,
    operation: &'static str,
    target: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = policy.backoff();
    loop {
        let attempt = backoff.attempt();
        let cause = match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(Error::TransientQueryFailure { cause, .. }) => cause,
            Err(e) => return Err(e),
        };
        let Some(delay) = backoff.next_delay() else {
            return Err(Error::ConnectionUnavailable {
                target: target.to_string(),
                attempts: attempt,
                cause,
            });
        };
        tracing::warn!(
            backend,
            operation,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %cause,
            "Transient failure, retrying"
        );
        record_retry(backend, operation);
        tokio::time::sleep(delay).await;
    }
}
