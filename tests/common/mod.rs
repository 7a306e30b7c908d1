//! Shared test support: a scriptable in-memory runtime and small fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use empleos_deploy::config::{ExecStep, OneShotStep, Probe, ServiceSpec, Topology};
use empleos_deploy::runtime::{ComposeRuntime, ContainerStats, RunState};
use empleos_deploy::{DeploySettings, DeployTarget, Error, Result, RetryPolicy};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Knobs controlling how the mock engine behaves.
#[derive(Debug, Default)]
pub struct MockBehavior {
    pub fail_build: bool,
    pub fail_stop: bool,
    pub fail_backup: bool,
    pub fail_migration: bool,
    pub fail_self_check: bool,
    /// Services whose `start` always errors.
    pub fail_start: HashSet<String>,
    /// Services whose readiness probe never passes.
    pub never_ready: HashSet<String>,
    /// Services whose container exits right after starting.
    pub exit_after_start: HashSet<String>,
    /// Probe passes for the first N calls, then fails (service -> N).
    pub flaky_after: HashMap<String, u32>,
}

/// In-memory stand-in for the container engine. Records every mutating call
/// in order so tests can assert on sequencing.
pub struct MockRuntime {
    calls: Mutex<Vec<String>>,
    states: Mutex<HashMap<String, RunState>>,
    probe_counts: Mutex<HashMap<String, u32>>,
    logs: Mutex<HashMap<String, Vec<String>>>,
    stats: Mutex<Vec<ContainerStats>>,
    pub behavior: MockBehavior,
}

impl MockRuntime {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            states: Mutex::new(HashMap::new()),
            probe_counts: Mutex::new(HashMap::new()),
            logs: Mutex::new(HashMap::new()),
            stats: Mutex::new(Vec::new()),
            behavior,
        }
    }

    pub fn healthy() -> Self {
        Self::new(MockBehavior::default())
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Index of the first call starting with `prefix`; panics if absent.
    pub fn call_index(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .position(|c| c.starts_with(prefix))
            .unwrap_or_else(|| panic!("no call starting with '{prefix}' was recorded"))
    }

    pub fn set_state(&self, service: &str, state: RunState) {
        self.states
            .lock()
            .unwrap()
            .insert(service.to_string(), state);
    }

    pub fn set_logs(&self, service: &str, lines: &[&str]) {
        self.logs.lock().unwrap().insert(
            service.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
    }

    pub fn set_stats(&self, stats: Vec<ContainerStats>) {
        *self.stats.lock().unwrap() = stats;
    }
}

#[async_trait]
impl ComposeRuntime for MockRuntime {
    async fn engine_reachable(&self) -> bool {
        true
    }

    async fn compose_available(&self) -> bool {
        true
    }

    async fn build_images(&self) -> Result<()> {
        self.record("build".to_string());
        if self.behavior.fail_build {
            Err(Error::Config("image build failed".to_string()))
        } else {
            Ok(())
        }
    }

    async fn stop_all(&self, _grace: Duration) -> Result<()> {
        self.record("down".to_string());
        self.states.lock().unwrap().clear();
        if self.behavior.fail_stop {
            Err(Error::Config("stop failed".to_string()))
        } else {
            Ok(())
        }
    }

    async fn start_services(&self, services: &[String]) -> Result<()> {
        self.record(format!("up:{}", services.join(",")));
        for service in services {
            if self.behavior.fail_start.contains(service) {
                return Err(Error::Config(format!("failed to start '{service}'")));
            }
            let state = if self.behavior.exit_after_start.contains(service) {
                RunState::Exited
            } else {
                RunState::Running
            };
            self.states.lock().unwrap().insert(service.clone(), state);
        }
        Ok(())
    }

    async fn run_one_shot(&self, service: &str, args: &[String]) -> Result<()> {
        self.record(format!("run:{}:{}", service, args.join(" ")));
        if self.behavior.fail_migration {
            Err(Error::Config("one-shot run exited with code 1".to_string()))
        } else {
            Ok(())
        }
    }

    async fn exec(&self, service: &str, command: &str) -> Result<bool> {
        self.record(format!("exec:{}:{}", service, command));

        // Maintenance commands are dispatched by command text, like the real
        // containers would.
        if command == "backup" {
            return Ok(!self.behavior.fail_backup);
        }
        if command.contains("--deploy") {
            return Ok(!self.behavior.fail_self_check);
        }

        // Everything else is a readiness probe: it can only pass against a
        // running container.
        let running = self
            .states
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or(RunState::NotCreated)
            == RunState::Running;
        if !running {
            return Ok(false);
        }
        if self.behavior.never_ready.contains(service) {
            return Ok(false);
        }
        if let Some(&pass_limit) = self.behavior.flaky_after.get(service) {
            let mut counts = self.probe_counts.lock().unwrap();
            let count = counts.entry(service.to_string()).or_insert(0);
            *count += 1;
            return Ok(*count <= pass_limit);
        }
        Ok(true)
    }

    async fn service_state(&self, service: &str) -> RunState {
        self.states
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or(RunState::NotCreated)
    }

    async fn logs_tail(&self, service: &str, _lines: usize) -> Result<Vec<String>> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default())
    }

    async fn container_stats(&self) -> Result<Vec<ContainerStats>> {
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn storage_summary(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn disk_usage(&self) -> Result<String> {
        Ok(String::new())
    }
}

fn spec(name: &str, depends_on: &[&str], probe_command: Option<&str>) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        probe: probe_command.map(|c| Probe::Exec {
            command: c.to_string(),
        }),
    }
}

/// A compact four-service topology exercising all phases: two infrastructure
/// services, one application, one worker without a probe.
pub fn test_topology() -> Topology {
    Topology {
        infrastructure: vec![
            spec("db", &[], Some("db-ready")),
            spec("cache", &[], Some("cache-ready")),
        ],
        migration: OneShotStep {
            service: "app".to_string(),
            args: vec!["migrate".to_string()],
        },
        application: vec![spec("app", &["db", "cache"], Some("app-ready"))],
        workers: vec![spec("worker", &["app"], None)],
        backup: Some(ExecStep {
            service: "db".to_string(),
            command: "backup".to_string(),
        }),
        self_check: Some(ExecStep {
            service: "app".to_string(),
            command: "check --deploy".to_string(),
        }),
    }
}

pub const ORIGINAL_COMPOSE: &str = "services:\n  db: {}\n  cache: {}\n  app: {}\n  worker: {}\n";

/// Write a compose file for [`test_topology`] into `dir` and build a target
/// around it.
pub fn test_target(dir: &Path) -> DeployTarget {
    let target = DeployTarget::production(dir);
    std::fs::write(&target.compose_file, ORIGINAL_COMPOSE).unwrap();
    target
}

/// Millisecond-scale settings so polling ceilings are hit quickly.
pub fn fast_settings() -> DeploySettings {
    DeploySettings {
        stop_grace: Duration::from_millis(10),
        settle_delay: Duration::from_millis(5),
        readiness: RetryPolicy::new(3, Duration::from_millis(5)),
        verification: RetryPolicy::new(2, Duration::from_millis(5)),
    }
}
