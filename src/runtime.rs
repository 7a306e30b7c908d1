//! The seam between the orchestrators and the container engine.
//!
//! Deploy, rollback, and status never spawn processes themselves; they talk
//! to a [`ComposeRuntime`]. The production implementation ([`DockerCompose`])
//! delegates to the CLI client; tests substitute mocks.

use crate::compose::{ComposeClient, ComposeError};
use crate::config::DeployTarget;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Derived per-service run state. Computed on demand, never cached.
///
/// `Degraded` (running but failing its probe) is derived one level up, in the
/// status inspector, since the engine only knows about container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    NotCreated,
    Starting,
    Running,
    Degraded,
    Restarting,
    Exited,
    Unknown,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::NotCreated => "not created",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Degraded => "degraded",
            RunState::Restarting => "restarting",
            RunState::Exited => "exited",
            RunState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Resource usage snapshot for one service's container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerStats {
    pub service: String,
    pub cpu: String,
    pub memory: String,
}

/// Everything the orchestrators need from the container engine.
#[async_trait]
pub trait ComposeRuntime: Send + Sync {
    /// Is the engine daemon responding?
    async fn engine_reachable(&self) -> bool;

    /// Is the compose tooling available?
    async fn compose_available(&self) -> bool;

    /// Build all service images.
    async fn build_images(&self) -> Result<()>;

    /// Stop and remove the whole topology, draining for at most `grace`.
    async fn stop_all(&self, grace: Duration) -> Result<()>;

    /// Start the named services detached.
    async fn start_services(&self, services: &[String]) -> Result<()>;

    /// Run a one-shot container to completion; non-zero exit is an error.
    async fn run_one_shot(&self, service: &str, args: &[String]) -> Result<()>;

    /// Run a shell command inside a running service container.
    /// `Ok(true)` on exit 0, `Ok(false)` on non-zero exit.
    async fn exec(&self, service: &str, command: &str) -> Result<bool>;

    /// Current run state of one service.
    async fn service_state(&self, service: &str) -> RunState;

    /// Last `lines` log lines of a service.
    async fn logs_tail(&self, service: &str, lines: usize) -> Result<Vec<String>>;

    /// Resource usage for every container in the topology.
    async fn container_stats(&self) -> Result<Vec<ContainerStats>>;

    /// Image/container/volume storage summary.
    async fn storage_summary(&self) -> Result<String>;

    /// Host disk usage for the deployment volume.
    async fn disk_usage(&self) -> Result<String>;
}

// Per-operation ceilings. Builds are the only genuinely long operation; the
// rest are bounded tightly so a wedged daemon surfaces as a timeout error
// instead of a hang.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const EXEC_TIMEOUT: Duration = Duration::from_secs(60);
const BUILD_TIMEOUT: Duration = Duration::from_secs(1800);
const UP_TIMEOUT: Duration = Duration::from_secs(300);
const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(600);
const LOGS_TIMEOUT: Duration = Duration::from_secs(20);
const STATS_TIMEOUT: Duration = Duration::from_secs(30);

/// Production runtime backed by the `docker` CLI.
pub struct DockerCompose {
    client: ComposeClient,
    work_dir: PathBuf,
}

impl DockerCompose {
    pub fn for_target(target: &DeployTarget) -> Self {
        Self {
            client: ComposeClient::for_target(target),
            work_dir: target.work_dir.clone(),
        }
    }
}

#[async_trait]
impl ComposeRuntime for DockerCompose {
    async fn engine_reachable(&self) -> bool {
        self.client.engine_reachable(PROBE_TIMEOUT).await
    }

    async fn compose_available(&self) -> bool {
        self.client.compose_available(PROBE_TIMEOUT).await
    }

    async fn build_images(&self) -> Result<()> {
        self.client.build(BUILD_TIMEOUT).await?;
        Ok(())
    }

    async fn stop_all(&self, grace: Duration) -> Result<()> {
        // Allow the CLI itself some headroom beyond the container grace.
        let timeout = grace + Duration::from_secs(60);
        self.client.down(grace, timeout).await?;
        Ok(())
    }

    async fn start_services(&self, services: &[String]) -> Result<()> {
        self.client.up(services, UP_TIMEOUT).await?;
        Ok(())
    }

    async fn run_one_shot(&self, service: &str, args: &[String]) -> Result<()> {
        self.client
            .run_one_shot(service, args, ONE_SHOT_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn exec(&self, service: &str, command: &str) -> Result<bool> {
        Ok(self.client.exec_sh(service, command, EXEC_TIMEOUT).await?)
    }

    async fn service_state(&self, service: &str) -> RunState {
        let entries = match self.client.ps(PROBE_TIMEOUT).await {
            Ok(entries) => entries,
            Err(_) => return RunState::Unknown,
        };
        let entry = entries.iter().find(|e| e.service == service);
        match entry {
            None => RunState::NotCreated,
            Some(e) => map_run_state(&e.state, &e.health),
        }
    }

    async fn logs_tail(&self, service: &str, lines: usize) -> Result<Vec<String>> {
        Ok(self.client.logs_tail(service, lines, LOGS_TIMEOUT).await?)
    }

    async fn container_stats(&self) -> Result<Vec<ContainerStats>> {
        let entries = self.client.ps(PROBE_TIMEOUT).await?;
        let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        let stats = self.client.stats(&names, STATS_TIMEOUT).await?;
        Ok(stats
            .into_iter()
            .map(|s| {
                let service = entries
                    .iter()
                    .find(|e| e.name == s.name)
                    .map(|e| e.service.clone())
                    .unwrap_or_else(|| s.name.clone());
                ContainerStats {
                    service,
                    cpu: s.cpu_perc,
                    memory: s.mem_usage,
                }
            })
            .collect())
    }

    async fn storage_summary(&self) -> Result<String> {
        Ok(self.client.system_df(STATS_TIMEOUT).await?)
    }

    async fn disk_usage(&self) -> Result<String> {
        let result = tokio::time::timeout(
            STATS_TIMEOUT,
            tokio::process::Command::new("df")
                .arg("-h")
                .arg(&self.work_dir)
                .output(),
        )
        .await;
        match result {
            Ok(Ok(output)) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
            }
            Ok(Ok(output)) => Err(Error::Compose(ComposeError::failed("df -h", &output))),
            Ok(Err(e)) => Err(Error::Compose(ComposeError::exec_failed("df -h", e))),
            Err(_) => Err(Error::Compose(ComposeError::timeout("df -h", STATS_TIMEOUT))),
        }
    }
}

/// Map compose's container state (plus health, when a container-level
/// healthcheck exists) onto [`RunState`].
fn map_run_state(state: &str, health: &str) -> RunState {
    match state {
        "running" => {
            if health.eq_ignore_ascii_case("starting") {
                RunState::Starting
            } else {
                RunState::Running
            }
        }
        "restarting" => RunState::Restarting,
        "exited" | "dead" => RunState::Exited,
        "created" => RunState::Starting,
        _ => RunState::Unknown,
    }
}
