//! Centralized Docker / Docker Compose CLI client.
//!
//! Every subprocess invocation of the container engine goes through
//! [`ComposeClient`], which provides consistent timeout handling, structured
//! [`ComposeError`] returns, and a single point where the `docker` command
//! line is constructed (compose file, env file, working directory).

use super::ComposeError;
use crate::config::DeployTarget;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

/// One row of `docker compose ps --format json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PsEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Health", default)]
    pub health: String,
}

/// One row of `docker stats --no-stream --format '{{json .}}'`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CPUPerc", default)]
    pub cpu_perc: String,
    #[serde(rename = "MemUsage", default)]
    pub mem_usage: String,
}

#[derive(Debug, Clone)]
pub struct ComposeClient {
    work_dir: PathBuf,
    compose_file: PathBuf,
    env_file: Option<PathBuf>,
}

impl ComposeClient {
    pub fn for_target(target: &DeployTarget) -> Self {
        Self {
            work_dir: target.work_dir.clone(),
            compose_file: target.compose_file.clone(),
            env_file: target.env_file.clone(),
        }
    }

    /// The `docker compose -f <file> [--env-file <file>]` prefix.
    fn compose_prefix(&self) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.compose_file.display().to_string(),
        ];
        if let Some(ref env_file) = self.env_file {
            args.push("--env-file".to_string());
            args.push(env_file.display().to_string());
        }
        args
    }

    /// Run `docker <args>` with a timeout, returning raw Output.
    async fn run_engine(&self, args: &[String], timeout: Duration) -> Result<Output, ComposeError> {
        let result = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("docker")
                .args(args)
                .current_dir(&self.work_dir)
                .output(),
        )
        .await;

        let cmd_str = format!("docker {}", args.join(" "));
        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ComposeError::exec_failed(cmd_str, e)),
            Err(_) => Err(ComposeError::timeout(cmd_str, timeout)),
        }
    }

    /// Run `docker <args>`, returning Output only on exit 0.
    async fn run_engine_success(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> Result<Output, ComposeError> {
        let output = self.run_engine(args, timeout).await?;
        if output.status.success() {
            Ok(output)
        } else {
            let cmd_str = format!("docker {}", args.join(" "));
            Err(ComposeError::failed(cmd_str, &output))
        }
    }

    /// Run a compose subcommand, returning Output only on exit 0.
    async fn run_compose(
        &self,
        subcommand: &[&str],
        timeout: Duration,
    ) -> Result<Output, ComposeError> {
        let mut args = self.compose_prefix();
        args.extend(subcommand.iter().map(|s| s.to_string()));
        self.run_engine_success(&args, timeout).await
    }

    // ========================================================================
    // Engine probes
    // ========================================================================

    /// Is the engine daemon responding? (`docker info`)
    pub async fn engine_reachable(&self, timeout: Duration) -> bool {
        self.run_engine_success(&["info".to_string()], timeout)
            .await
            .is_ok()
    }

    /// Is the compose plugin installed? (`docker compose version`)
    pub async fn compose_available(&self, timeout: Duration) -> bool {
        self.run_engine_success(
            &["compose".to_string(), "version".to_string()],
            timeout,
        )
        .await
        .is_ok()
    }

    // ========================================================================
    // Topology lifecycle
    // ========================================================================

    /// Build all service images.
    pub async fn build(&self, timeout: Duration) -> Result<(), ComposeError> {
        self.run_compose(&["build"], timeout).await.map(|_| ())
    }

    /// Start the named services detached. Compose creates infrastructure
    /// (networks, volumes) on first use.
    pub async fn up(&self, services: &[String], timeout: Duration) -> Result<(), ComposeError> {
        let mut sub: Vec<&str> = vec!["up", "-d"];
        sub.extend(services.iter().map(String::as_str));
        self.run_compose(&sub, timeout).await.map(|_| ())
    }

    /// Stop and remove the whole topology with a bounded grace period.
    pub async fn down(&self, grace: Duration, timeout: Duration) -> Result<(), ComposeError> {
        let grace_secs = grace.as_secs().to_string();
        self.run_compose(&["down", "--timeout", &grace_secs], timeout)
            .await
            .map(|_| ())
    }

    /// Run a one-shot container (`compose run --rm <service> <args>`).
    pub async fn run_one_shot(
        &self,
        service: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<(), ComposeError> {
        let mut sub: Vec<&str> = vec!["run", "--rm", service];
        sub.extend(args.iter().map(String::as_str));
        self.run_compose(&sub, timeout).await.map(|_| ())
    }

    /// Execute a shell command inside a running service container.
    /// Returns `Ok(true)` on exit 0, `Ok(false)` on non-zero exit.
    pub async fn exec_sh(
        &self,
        service: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<bool, ComposeError> {
        let mut args = self.compose_prefix();
        args.extend(
            ["exec", "-T", service, "sh", "-c", command]
                .iter()
                .map(|s| s.to_string()),
        );
        let output = self.run_engine(&args, timeout).await?;
        Ok(output.status.success())
    }

    /// Current container state per service (`ps --all --format json`).
    pub async fn ps(&self, timeout: Duration) -> Result<Vec<PsEntry>, ComposeError> {
        let output = self
            .run_compose(&["ps", "--all", "--format", "json"], timeout)
            .await?;
        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Last `lines` log lines for a service.
    pub async fn logs_tail(
        &self,
        service: &str,
        lines: usize,
        timeout: Duration,
    ) -> Result<Vec<String>, ComposeError> {
        let tail = lines.to_string();
        let output = self
            .run_compose(&["logs", "--no-color", "--tail", &tail, service], timeout)
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.to_string())
            .collect())
    }

    /// Resource usage snapshot for the named containers.
    pub async fn stats(
        &self,
        containers: &[String],
        timeout: Duration,
    ) -> Result<Vec<StatsEntry>, ComposeError> {
        if containers.is_empty() {
            return Ok(Vec::new());
        }
        let mut args: Vec<String> = vec![
            "stats".to_string(),
            "--no-stream".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        args.extend(containers.iter().cloned());
        let output = self.run_engine_success(&args, timeout).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| serde_json::from_str::<StatsEntry>(line).ok())
            .collect())
    }

    /// Image/container/volume storage summary (`docker system df`).
    pub async fn system_df(&self, timeout: Duration) -> Result<String, ComposeError> {
        let output = self
            .run_engine_success(&["system".to_string(), "df".to_string()], timeout)
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

/// Parse `compose ps` JSON output. Newer compose emits one JSON object per
/// line; some releases emit a single JSON array. Accept both.
fn parse_ps_output(raw: &str) -> Vec<PsEntry> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).unwrap_or_default();
    }
    trimmed
        .lines()
        .filter_map(|line| serde_json::from_str::<PsEntry>(line).ok())
        .collect()
}
