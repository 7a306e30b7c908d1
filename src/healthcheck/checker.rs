use crate::error::Result;
use crate::retry::{poll_until, RetryPolicy};
use async_trait::async_trait;

/// A service-specific readiness probe.
///
/// `check` answers "can this service serve right now?", distinct from the
/// container merely running. Probe errors count as "not ready"; they never
/// abort a polling loop.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self) -> Result<bool>;
}

/// Poll a checker under a bounded retry policy. Returns `true` as soon as a
/// check passes, `false` once the policy is exhausted.
pub async fn check_with_retry<C: HealthChecker + ?Sized>(
    checker: &C,
    policy: &RetryPolicy,
) -> bool {
    poll_until(policy, || async move {
        checker.check().await.unwrap_or(false)
    })
    .await
}
