use super::HealthChecker;
use crate::error::Result;
use crate::runtime::ComposeRuntime;
use async_trait::async_trait;
use std::sync::Arc;

/// Readiness probe that runs a command inside the service's container
/// (e.g. `pg_isready` for postgres, `redis-cli ping` for the cache).
pub struct ExecChecker {
    runtime: Arc<dyn ComposeRuntime>,
    service: String,
    command: String,
}

impl ExecChecker {
    pub fn new(runtime: Arc<dyn ComposeRuntime>, service: String, command: String) -> Self {
        Self {
            runtime,
            service,
            command,
        }
    }
}

#[async_trait]
impl HealthChecker for ExecChecker {
    async fn check(&self) -> Result<bool> {
        // exec failures (container not up yet, engine hiccup) read as
        // "not ready", letting the retry loop decide when to give up.
        match self.runtime.exec(&self.service, &self.command).await {
            Ok(passed) => Ok(passed),
            Err(_) => Ok(false),
        }
    }
}
