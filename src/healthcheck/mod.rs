//! Service readiness probes.
//!
//! A probe confirms a service can accept requests, as opposed to its
//! container merely running. Probes are polled under bounded retry policies
//! during deploy/rollback and sampled once by the status inspector.

mod checker;
mod exec;
mod http;

pub use checker::{check_with_retry, HealthChecker};
pub use exec::ExecChecker;
pub use http::HttpChecker;

use crate::config::{Probe, ServiceSpec};
use crate::error::Result;
use crate::runtime::ComposeRuntime;
use std::sync::Arc;
use std::time::Duration;

/// Per-probe HTTP timeout. Exec probes are bounded by the runtime's exec
/// ceiling instead.
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the checker for a service, if it declares a probe.
pub fn checker_for(
    spec: &ServiceSpec,
    runtime: Arc<dyn ComposeRuntime>,
) -> Result<Option<Arc<dyn HealthChecker>>> {
    let checker: Arc<dyn HealthChecker> = match &spec.probe {
        None => return Ok(None),
        Some(Probe::Exec { command }) => Arc::new(ExecChecker::new(
            runtime,
            spec.name.clone(),
            command.clone(),
        )),
        Some(Probe::Http { url }) => {
            Arc::new(HttpChecker::new(url.clone(), HTTP_PROBE_TIMEOUT)?)
        }
    };
    Ok(Some(checker))
}
