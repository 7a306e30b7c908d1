//! # empleos-deploy
//!
//! Deployment orchestration for the portalempleos production stack: a
//! docker-compose topology of postgres, redis, the django application behind
//! traefik, and the celery workers with their monitoring UI.
//!
//! Three entry points share this library:
//!
//! - `deploy` — snapshot the configuration, build, and roll the topology
//!   forward phase by phase with bounded readiness gates; any fatal step
//!   triggers exactly one automatic rollback.
//! - `rollback` — restore the pre-deploy snapshot and relaunch the topology;
//!   interactive use requires explicit confirmation and fails closed.
//! - `status` — read-only inspection: run state, probe results, resource
//!   usage, and a log-tail error scan per service.
//!
//! The orchestrators are strictly sequential: no step begins before the
//! previous one's result is known, and every wait is bounded by an explicit
//! [`retry::RetryPolicy`]. The only persistent state is the configuration
//! snapshot file; its presence means a deploy is in flight or failed without
//! being rolled back.

pub mod cli;
pub mod compose;
pub mod config;
pub mod deploy;
pub mod error;
pub mod healthcheck;
pub mod output;
pub mod retry;
pub mod rollback;
pub mod runtime;
pub mod snapshot;
pub mod status;

// Re-export commonly used types
pub use config::{DeployTarget, Topology};
pub use deploy::{DeployOrchestrator, DeployReport, DeploySettings, Stage};
pub use error::{Error, Result};
pub use output::{CliOutput, QuietOutput, UserOutput};
pub use retry::RetryPolicy;
pub use rollback::{RollbackOrchestrator, RollbackOutcome};
pub use runtime::{ComposeRuntime, ContainerStats, DockerCompose, RunState};
pub use snapshot::{ConfigSnapshot, OrchestrationLock};
pub use status::{StatusInspector, StatusReport};
