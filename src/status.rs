//! The status inspector.
//!
//! Read-only: safe to run at any time, including while a deploy or rollback
//! is in flight (the picture may then be transiently inconsistent). For each
//! service it reports raw run state and, independently, the result of the
//! service's readiness probe. A container can be "running" yet failing its
//! probe, which is reported as degraded.

use crate::config::{DeployTarget, Topology};
use crate::error::Result;
use crate::healthcheck;
use crate::output::UserOutput;
use crate::runtime::{ComposeRuntime, RunState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// How many log lines per service the error scan looks at.
const LOG_TAIL_LINES: usize = 50;

/// Keywords that flag a log line as error-indicating. Case-insensitive
/// substring match. A heuristic, not a structured parse; error text that
/// uses none of these words will slip through.
pub const ERROR_VOCABULARY: &[&str] =
    &["error", "exception", "traceback", "critical", "fatal", "panic"];

/// Return the lines from `lines` that match the error vocabulary.
pub fn scan_for_errors(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            ERROR_VOCABULARY.iter().any(|word| lower.contains(word))
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: RunState,
    /// Probe result for services that define one; `None` when no probe is
    /// configured.
    pub probe_passed: Option<bool>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub log_errors: Vec<String>,
}

impl ServiceStatus {
    /// Raw state folded together with the probe: running + failing probe
    /// reads as degraded.
    pub fn effective_state(&self) -> RunState {
        if self.state == RunState::Running && self.probe_passed == Some(false) {
            RunState::Degraded
        } else {
            self.state
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.effective_state() == RunState::Degraded
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub services: Vec<ServiceStatus>,
    pub disk_usage: Option<String>,
    pub storage_usage: Option<String>,
}

impl StatusReport {
    pub fn degraded_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|s| s.is_degraded())
            .map(|s| s.name.as_str())
            .collect()
    }
}

pub struct StatusInspector {
    runtime: Arc<dyn ComposeRuntime>,
    topology: Topology,
    target: DeployTarget,
}

impl StatusInspector {
    pub fn new(
        runtime: Arc<dyn ComposeRuntime>,
        topology: Topology,
        target: DeployTarget,
    ) -> Self {
        Self {
            runtime,
            topology,
            target,
        }
    }

    /// Build a point-in-time report of the whole topology.
    ///
    /// Errors only when the topology cannot be queried at all (compose file
    /// missing, engine unreachable); per-service hiccups degrade to missing
    /// fields instead.
    pub async fn inspect(&self) -> Result<StatusReport> {
        self.target.ensure_compose_file()?;
        if !self.runtime.engine_reachable().await {
            return Err(crate::error::Error::EngineUnreachable);
        }

        let stats = self.runtime.container_stats().await.unwrap_or_default();

        let mut services = Vec::new();
        for spec in self.topology.startup_order() {
            let state = self.runtime.service_state(&spec.name).await;

            let probe_passed = match healthcheck::checker_for(spec, Arc::clone(&self.runtime))? {
                Some(checker) => Some(checker.check().await.unwrap_or(false)),
                None => None,
            };

            let (cpu, memory) = stats
                .iter()
                .find(|s| s.service == spec.name)
                .map(|s| (Some(s.cpu.clone()), Some(s.memory.clone())))
                .unwrap_or((None, None));

            let log_errors = if matches!(state, RunState::Running | RunState::Restarting) {
                match self.runtime.logs_tail(&spec.name, LOG_TAIL_LINES).await {
                    Ok(lines) => scan_for_errors(&lines),
                    Err(_) => Vec::new(),
                }
            } else {
                Vec::new()
            };

            services.push(ServiceStatus {
                name: spec.name.clone(),
                state,
                probe_passed,
                cpu,
                memory,
                log_errors,
            });
        }

        Ok(StatusReport {
            generated_at: Utc::now(),
            services,
            disk_usage: self.runtime.disk_usage().await.ok(),
            storage_usage: self.runtime.storage_summary().await.ok(),
        })
    }
}

/// Render the report as the operator-facing status table.
pub fn render(report: &StatusReport, out: &dyn UserOutput) {
    out.status("Service status:");
    out.status(&format!("{:-<72}", ""));
    out.status(&format!(
        "  {:<14} {:<12} {:<7} {:<10} {}",
        "SERVICE", "STATE", "PROBE", "CPU", "MEMORY"
    ));

    for service in &report.services {
        let state = service.effective_state();
        let icon = match state {
            RunState::Running => "+",
            RunState::Degraded => "!",
            RunState::Starting | RunState::Restarting => ".",
            RunState::Exited => "x",
            RunState::NotCreated | RunState::Unknown => "o",
        };
        let probe = match service.probe_passed {
            Some(true) => "pass",
            Some(false) => "fail",
            None => "-",
        };
        out.status(&format!(
            "{} {:<14} {:<12} {:<7} {:<10} {}",
            icon,
            service.name,
            state.to_string(),
            probe,
            service.cpu.as_deref().unwrap_or("-"),
            service.memory.as_deref().unwrap_or("-"),
        ));
    }

    let with_errors: Vec<_> = report
        .services
        .iter()
        .filter(|s| !s.log_errors.is_empty())
        .collect();
    if !with_errors.is_empty() {
        out.blank();
        out.warning("Recent log lines matching the error vocabulary:");
        for service in with_errors {
            for line in service.log_errors.iter().take(5) {
                out.warning(&format!("  {}: {}", service.name, line));
            }
        }
    }

    if let Some(ref disk) = report.disk_usage {
        out.blank();
        out.status("Disk usage:");
        for line in disk.lines() {
            out.status(&format!("  {}", line));
        }
    }
    if let Some(ref storage) = report.storage_usage {
        out.blank();
        out.status("Engine storage:");
        for line in storage.lines() {
            out.status(&format!("  {}", line));
        }
    }
}
