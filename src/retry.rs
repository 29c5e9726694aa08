//! Retry utilities with exponential backoff and jitter.
//!
//! Used for one-shot startup calls (CRD installation) where the API server may
//! not be reachable yet. Reconcile passes never retry internally; a failed
//! pass is requeued by the controller runtime instead.
//!
//! # Example
//!
//! ```ignore
//! use cluster_register::retry::{retry_with_backoff, RetryConfig};
//!
//! retry_with_backoff(&RetryConfig::with_max_attempts(10), "install_crd", || async {
//!     crds.patch(name, &params, &Patch::Apply(&crd)).await
//! })
//! .await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

/// Bounded backoff for startup calls
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first; zero is treated as one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub initial_delay: Duration,
    /// Upper bound on the delay before jitter
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Default delays with the given attempt budget
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Delay after the `failed`th failed attempt (1-based), before jitter
    fn delay_after(&self, failed: u32) -> Duration {
        let factor = 1u32 << failed.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or the attempt budget is spent
///
/// Sleeps between attempts with doubling delays, jittered to 50-150%.
/// Returns the last error once `max_attempts` calls have failed.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let budget = config.max_attempts.max(1);
    let mut failed = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        failed += 1;

        if failed >= budget {
            error!(operation = %operation_name, attempts = failed, error = %err, "giving up");
            return Err(err);
        }

        let delay = config
            .delay_after(failed)
            .mul_f64(rand::thread_rng().gen_range(0.5..1.5));
        warn!(
            operation = %operation_name,
            attempt = failed,
            error = %err,
            delay_ms = delay.as_millis(),
            "attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
