// src/retry.rs
// Exponential backoff with jitter for retryable failures

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::Result;

/// Backoff parameters for one call site
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry `attempt` (0-based): capped exponential, with the
    /// upper half randomized so concurrent callers don't thunder in step.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16) as u64);
        let capped = exp.min(self.max_delay_ms).max(1);
        let jitter = rand::rng().random_range(0..=capped / 2);
        Duration::from_millis(capped / 2 + jitter)
    }
}

/// Per-request bound on total retries across all call sites, so one slow
/// dependency cannot amplify into unbounded traffic.
pub struct RetryBudget(AtomicU32);

impl RetryBudget {
    pub fn new(total: u32) -> Self {
        Self(AtomicU32::new(total))
    }

    /// Effectively unbounded budget for call sites without request scope.
    pub fn unlimited() -> Self {
        Self::new(u32::MAX)
    }

    /// Take one retry from the budget; false when exhausted.
    pub fn try_take(&self) -> bool {
        self.0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn remaining(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run `op`, retrying retryable errors with backoff until the policy or the
/// request budget is exhausted. Non-retryable errors surface immediately.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    budget: &RetryBudget,
    op_name: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                if !budget.try_take() {
                    warn!(op = op_name, "retry budget exhausted");
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    op = op_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
