//! The service topology: which services exist, what they depend on, how they
//! are probed, and in which phase they start.
//!
//! The topology is pure configuration — building one has no side effects, and
//! the production topology is fixed at compile time. Startup runs phase by
//! phase (infrastructure, migration, application, workers); shutdown is the
//! reverse of startup.

use crate::config::graph::DependencyGraph;
use crate::error::{Error, Result};
use serde::Serialize;

/// How a service proves it can actually serve, beyond its process running.
#[derive(Debug, Clone, Serialize)]
pub enum Probe {
    /// Run a command inside the service container; exit 0 means ready.
    Exec { command: String },
    /// GET a URL; 2xx means ready.
    Http { url: String },
}

/// A single long-running service in the topology.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSpec {
    pub name: String,
    /// Services that must be running before this one starts.
    pub depends_on: Vec<String>,
    /// Optional readiness probe. Services without one are gated on run state
    /// alone.
    pub probe: Option<Probe>,
}

impl ServiceSpec {
    fn new(name: &str, depends_on: &[&str], probe: Option<Probe>) -> Self {
        Self {
            name: name.to_string(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            probe,
        }
    }
}

/// A one-shot container run (`compose run --rm`), used for migrations.
#[derive(Debug, Clone, Serialize)]
pub struct OneShotStep {
    pub service: String,
    pub args: Vec<String>,
}

/// A command executed inside an already-running service (`compose exec`).
#[derive(Debug, Clone, Serialize)]
pub struct ExecStep {
    pub service: String,
    pub command: String,
}

/// The full deployment topology for one target.
///
/// Startup runs the phases in field order: infrastructure, then the one-shot
/// migration, then application, then workers. Shutdown is the reverse.
#[derive(Debug, Clone)]
pub struct Topology {
    pub infrastructure: Vec<ServiceSpec>,
    pub migration: OneShotStep,
    pub application: Vec<ServiceSpec>,
    pub workers: Vec<ServiceSpec>,
    /// Best-effort data backup, run against the old topology before it is
    /// stopped. Advisory: failure never blocks a deploy.
    pub backup: Option<ExecStep>,
    /// Deploy-time self-check against the new application. Advisory.
    pub self_check: Option<ExecStep>,
}

impl Topology {
    /// The production stack: postgres + redis, a django app behind traefik,
    /// and the celery workers with their monitoring UI.
    pub fn production() -> Self {
        Self {
            infrastructure: vec![
                ServiceSpec::new(
                    "postgres",
                    &[],
                    Some(Probe::Exec {
                        command: r#"pg_isready -U "${POSTGRES_USER:-postgres}""#.to_string(),
                    }),
                ),
                ServiceSpec::new(
                    "redis",
                    &[],
                    Some(Probe::Exec {
                        command: "redis-cli ping".to_string(),
                    }),
                ),
            ],
            migration: OneShotStep {
                service: "django".to_string(),
                args: vec![
                    "python".to_string(),
                    "manage.py".to_string(),
                    "migrate".to_string(),
                    "--noinput".to_string(),
                ],
            },
            application: vec![
                ServiceSpec::new(
                    "django",
                    &["postgres", "redis"],
                    Some(Probe::Exec {
                        command: "python manage.py check".to_string(),
                    }),
                ),
                ServiceSpec::new("traefik", &["django"], None),
            ],
            workers: vec![
                ServiceSpec::new("celeryworker", &["django"], None),
                ServiceSpec::new("celerybeat", &["django"], None),
                ServiceSpec::new(
                    "flower",
                    &["django"],
                    Some(Probe::Http {
                        url: "http://localhost:5555/healthcheck".to_string(),
                    }),
                ),
            ],
            backup: Some(ExecStep {
                service: "postgres".to_string(),
                command: "backup".to_string(),
            }),
            self_check: Some(ExecStep {
                service: "django".to_string(),
                command: "python manage.py check --deploy".to_string(),
            }),
        }
    }

    /// All long-running services, in startup order (phase by phase).
    pub fn startup_order(&self) -> Vec<&ServiceSpec> {
        self.infrastructure
            .iter()
            .chain(self.application.iter())
            .chain(self.workers.iter())
            .collect()
    }

    /// Shutdown order is the reverse of startup.
    pub fn shutdown_order(&self) -> Vec<&ServiceSpec> {
        let mut order = self.startup_order();
        order.reverse();
        order
    }

    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.startup_order().into_iter().find(|s| s.name == name)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.startup_order()
            .into_iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Check the structural invariants:
    ///
    /// - every `depends_on` entry names a known service,
    /// - the dependency relation is acyclic,
    /// - no service depends on one in a *later* phase (the phase order must be
    ///   a valid linearization of the dependency order),
    /// - the migration/backup/self-check steps reference known services.
    pub fn validate(&self) -> Result<()> {
        let mut graph = DependencyGraph::new();
        let all = self.startup_order();

        for spec in &all {
            graph.add_node(spec.name.clone());
        }
        for spec in &all {
            for dep in &spec.depends_on {
                if !graph.contains(dep) {
                    return Err(Error::UnknownDependency {
                        service: spec.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                graph.add_dependency(spec.name.clone(), dep.clone());
            }
        }
        graph.startup_order()?;

        let phase_index = |name: &str| -> usize {
            if self.infrastructure.iter().any(|s| s.name == name) {
                0
            } else if self.application.iter().any(|s| s.name == name) {
                1
            } else {
                2
            }
        };
        for spec in &all {
            for dep in &spec.depends_on {
                if phase_index(dep) > phase_index(&spec.name) {
                    return Err(Error::Config(format!(
                        "service '{}' depends on '{}', which starts in a later phase",
                        spec.name, dep
                    )));
                }
            }
        }

        let mut step_services = vec![&self.migration.service];
        step_services.extend(self.backup.iter().map(|s| &s.service));
        step_services.extend(self.self_check.iter().map(|s| &s.service));
        for step_service in step_services {
            if self.service(step_service).is_none() {
                return Err(Error::Config(format!(
                    "step references unknown service '{}'",
                    step_service
                )));
            }
        }

        Ok(())
    }
}
