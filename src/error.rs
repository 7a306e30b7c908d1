use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::compose::ComposeError;
use crate::deploy::Stage;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Compose file not found: {0}")]
    #[diagnostic(
        code(deploy::config::missing_file),
        help("Run from the project root, or point at the file with --file")
    )]
    MissingComposeFile(PathBuf),

    #[error("Service '{service}' is not defined in {file}")]
    #[diagnostic(
        code(deploy::config::service_missing),
        help("Every topology service must appear under `services:` in the compose file")
    )]
    ServiceNotDefined { service: String, file: String },

    #[error("Container engine is not reachable")]
    #[diagnostic(
        code(deploy::engine::unreachable),
        help("Check that Docker is running with `docker ps`")
    )]
    EngineUnreachable,

    #[error("Docker Compose is not available")]
    #[diagnostic(
        code(deploy::engine::no_compose),
        help("Install the Compose plugin: https://docs.docker.com/compose/install/")
    )]
    ComposeUnavailable,

    #[error("Compose error: {0}")]
    #[diagnostic(code(deploy::compose::error))]
    Compose(#[from] ComposeError),

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    #[diagnostic(
        code(deploy::topology::circular),
        help("Services cannot depend on each other in a cycle. Review the depends_on sets")
    )]
    CircularDependency(Vec<String>),

    #[error("Service '{service}' depends on unknown service '{dependency}'")]
    #[diagnostic(code(deploy::topology::unknown_dependency))]
    UnknownDependency { service: String, dependency: String },

    #[error("A configuration snapshot already exists at {0}")]
    #[diagnostic(
        code(deploy::snapshot::exists),
        help("A previous deploy failed without being rolled back. Run `rollback` to restore it, or remove the file if you are certain the running configuration is good")
    )]
    SnapshotExists(PathBuf),

    #[error("No configuration snapshot found at {0}")]
    #[diagnostic(
        code(deploy::snapshot::missing),
        help("Nothing to roll back to. A snapshot only exists while a deploy is in flight or after one has failed")
    )]
    NoSnapshot(PathBuf),

    #[error("Another orchestration is already running (lock held on {0})")]
    #[diagnostic(
        code(deploy::lock::held),
        help("Wait for the other deploy/rollback to finish. The lock is released automatically when its process exits")
    )]
    LockHeld(PathBuf),

    #[error("Deploy failed during {stage}: {source}")]
    #[diagnostic(code(deploy::failed))]
    DeployFailed {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    #[error("Service '{service}' did not become ready within {attempts} attempts ({}s apart)", .interval.as_secs())]
    #[diagnostic(
        code(deploy::service::not_ready),
        help("Check the service logs with `docker compose logs <service>` or run `status`")
    )]
    ReadinessTimeout {
        service: String,
        attempts: u32,
        interval: Duration,
    },

    #[error("Database migration failed: {0}")]
    #[diagnostic(
        code(deploy::migration::failed),
        help("The schema may be partially migrated. Inspect the migration output before retrying")
    )]
    MigrationFailed(String),

    #[error("Verification failed for: {}", .0.join(", "))]
    #[diagnostic(
        code(deploy::verification::failed),
        help("One or more services are up but unhealthy. `status` shows per-service probe results")
    )]
    VerificationFailed(Vec<String>),

    #[error("Rollback could not bring the topology back up: {0}")]
    #[diagnostic(
        code(deploy::rollback::restart_failed),
        help("Manual intervention required. The restored compose file is in place; inspect service logs and start the stack by hand")
    )]
    RestartFailed(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::EngineUnreachable => {
                Some("Check that Docker is running: docker ps".to_string())
            }
            Error::ComposeUnavailable => {
                Some("Verify the Compose plugin with: docker compose version".to_string())
            }
            Error::MissingComposeFile(path) => Some(format!(
                "Expected the compose file at {}. Run from the project root or pass --file.",
                path.display()
            )),
            Error::SnapshotExists(path) => Some(format!(
                "Run `rollback` to restore {}, or delete it if the running configuration is known-good.",
                path.display()
            )),
            Error::NoSnapshot(_) => Some(
                "Snapshots are created by `deploy` and consumed on success or rollback. There is nothing to restore."
                    .to_string(),
            ),
            Error::LockHeld(path) => Some(format!(
                "Another deploy or rollback holds {}. Wait for it to finish.",
                path.display()
            )),
            Error::ReadinessTimeout { service, .. } => Some(format!(
                "Inspect the service with: docker compose logs {}",
                service
            )),
            Error::VerificationFailed(_) => {
                Some("Run `status` for per-service probe results.".to_string())
            }
            Error::DeployFailed { source, .. } => source.suggestion(),
            Error::CircularDependency(path) => {
                Some(format!("Break the cycle between: {}", path.join(", ")))
            }
            _ => None,
        }
    }
}
