//! Per-environment deployment target: which compose file drives the topology,
//! which env file feeds it, and where the snapshot and lock files live.

use crate::config::Topology;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default compose file name for the production target.
pub const PRODUCTION_COMPOSE_FILE: &str = "docker-compose.production.yml";

/// Name of the advisory lock file guarding deploy/rollback invocations.
const LOCK_FILE_NAME: &str = ".deploy.lock";

/// Suffix appended to the compose file name for the rollback snapshot.
const SNAPSHOT_SUFFIX: &str = ".backup";

#[derive(Debug, Clone)]
pub struct DeployTarget {
    pub work_dir: PathBuf,
    pub compose_file: PathBuf,
    pub env_file: Option<PathBuf>,
}

impl DeployTarget {
    /// The production target rooted at `work_dir`.
    pub fn production(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let compose_file = work_dir.join(PRODUCTION_COMPOSE_FILE);
        Self {
            work_dir,
            compose_file,
            env_file: None,
        }
    }

    /// Resolve a target from CLI overrides. Relative compose/env paths are
    /// interpreted against the work directory.
    pub fn resolve(
        work_dir: Option<PathBuf>,
        compose_file: Option<PathBuf>,
        env_file: Option<PathBuf>,
    ) -> Result<Self> {
        let work_dir = match work_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let anchor = |p: PathBuf| {
            if p.is_absolute() {
                p
            } else {
                work_dir.join(p)
            }
        };
        let compose_file = anchor(
            compose_file.unwrap_or_else(|| PathBuf::from(PRODUCTION_COMPOSE_FILE)),
        );
        let env_file = env_file.map(anchor);
        Ok(Self {
            work_dir,
            compose_file,
            env_file,
        })
    }

    /// Where the pre-deploy configuration snapshot lives.
    pub fn snapshot_path(&self) -> PathBuf {
        let mut name = self
            .compose_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| PRODUCTION_COMPOSE_FILE.to_string());
        name.push_str(SNAPSHOT_SUFFIX);
        self.compose_file.with_file_name(name)
    }

    /// Where the orchestration lock lives.
    pub fn lock_path(&self) -> PathBuf {
        self.work_dir.join(LOCK_FILE_NAME)
    }

    /// Precondition: the compose file must exist.
    pub fn ensure_compose_file(&self) -> Result<()> {
        if self.compose_file.is_file() {
            Ok(())
        } else {
            Err(Error::MissingComposeFile(self.compose_file.clone()))
        }
    }

    /// Precondition: the compose file must parse and define every service the
    /// topology expects. The file is otherwise opaque to the orchestrator.
    pub fn verify_services_defined(&self, topology: &Topology) -> Result<()> {
        let raw = std::fs::read_to_string(&self.compose_file)?;
        let doc: ComposeDoc = serde_yaml::from_str(&raw)?;
        for name in topology.service_names() {
            if !doc.services.contains_key(&name) {
                return Err(Error::ServiceNotDefined {
                    service: name,
                    file: self.compose_file.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// The slice of a compose file the orchestrator actually looks at.
#[derive(Debug, serde::Deserialize)]
struct ComposeDoc {
    #[serde(default)]
    services: HashMap<String, serde_yaml::Value>,
}
