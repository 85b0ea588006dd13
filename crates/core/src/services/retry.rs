//! Fixed-delay retry for transient I/O.
//!
//! Transient failures are never escalated into errors: the operation is
//! retried until it succeeds. Past `alert_after` consecutive failures each
//! further failure is logged at `error` and counted as a stall.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::metrics::record_retry_stall;

/// Retry schedule for one class of operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay between attempts.
    pub delay: Duration,
    /// Consecutive failures before each failure is reported as a stall.
    pub alert_after: u32,
}

impl RetryPolicy {
    /// Node requests (1 s).
    pub fn fetch() -> Self {
        Self {
            delay: Duration::from_secs(1),
            alert_after: 10,
        }
    }

    /// Storage writes (5 s).
    pub fn storage() -> Self {
        Self {
            delay: Duration::from_secs(5),
            alert_after: 10,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::storage()
    }
}

/// Run `op` until it succeeds.
///
/// `on_failure` is invoked after every failed attempt (metrics hooks).
pub async fn retry_forever<T, E, F, Fut>(
    operation: &'static str,
    policy: RetryPolicy,
    mut on_failure: impl FnMut(),
    mut op: F,
) -> T
where
    E: Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return value,
            Err(e) => {
                failures = failures.saturating_add(1);
                on_failure();
                if failures > policy.alert_after {
                    error!(
                        operation,
                        attempts = failures,
                        error = ?e,
                        "❌ Operation keeps failing, parser is stalled"
                    );
                    record_retry_stall(operation);
                } else {
                    warn!(
                        operation,
                        attempt = failures,
                        retry_in_ms = policy.delay.as_millis() as u64,
                        error = ?e,
                        "⚠️  Operation failed, retrying..."
                    );
                }
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
