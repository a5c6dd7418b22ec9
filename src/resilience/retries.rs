//! Retry logic for chain calls.
//!
//! # Responsibilities
//! - Decide whether a failed call may be repeated
//! - Execute retries with exponential backoff and jitter
//! - Bound the number of attempts per call

use std::future::Future;
use std::time::Duration;

use crate::blockchain::types::ChainResult;
use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Attempt budget and delays for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }

    /// Whether another attempt is allowed after `attempt` (0-based) failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out.
///
/// `op` receives the 0-based attempt number. Only errors for which
/// [`ChainError::is_transient`](crate::blockchain::ChainError::is_transient) holds are retried.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    call: &'static str,
    mut op: F,
) -> ChainResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ChainResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && policy.allows_retry(attempt) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    call,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient RPC failure, retrying"
                );
                metrics::record_rpc_retry(call);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
