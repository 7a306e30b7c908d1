//! Bounded polling.
//!
//! Every blocking wait in the orchestrator goes through [`poll_until`] with an
//! explicit [`RetryPolicy`]; there are no unbounded waits anywhere in the
//! deploy or rollback paths.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// A bounded retry schedule: at most `max_attempts` probes, `interval` apart.
///
/// The ceiling for a poll is therefore `max_attempts * interval` (minus the
/// final sleep, which is skipped once the last attempt has failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Default readiness gate: 30 attempts, 2 seconds apart.
    pub const fn readiness() -> Self {
        Self::new(30, Duration::from_secs(2))
    }

    /// Post-start verification gate: shorter ceiling, 10 attempts.
    pub const fn verification() -> Self {
        Self::new(10, Duration::from_secs(2))
    }

    /// Upper bound on how long a poll with this policy can take.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::readiness()
    }
}

/// Poll `probe` until it returns `true` or the policy is exhausted.
///
/// The probe runs exactly once per attempt; there is no sleep after the final
/// attempt. Returns `false` when every attempt failed.
pub async fn poll_until<F, Fut>(policy: &RetryPolicy, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        if probe().await {
            return true;
        }
        if attempt < policy.max_attempts {
            sleep(policy.interval).await;
        }
    }
    false
}
