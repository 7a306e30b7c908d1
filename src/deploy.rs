//! The deploy orchestrator.
//!
//! A deploy walks a fixed sequence of steps, each a synchronization barrier:
//! snapshot the configuration, best-effort data backup, build, stop the old
//! topology, then bring the new one up phase by phase (infrastructure →
//! migration → application → workers) with a bounded readiness gate between
//! phases, verify everything, and only then discard the snapshot.
//!
//! Steps carry an explicit severity instead of a blanket failure trap: the
//! data backup and the post-deploy self-check are advisory (warn and
//! continue), everything else is fatal and triggers exactly one automatic
//! rollback to the snapshot.

use crate::config::{DeployTarget, ServiceSpec, Topology};
use crate::error::{Error, Result};
use crate::healthcheck;
use crate::output::UserOutput;
use crate::retry::{poll_until, RetryPolicy};
use crate::rollback::RollbackOrchestrator;
use crate::runtime::{ComposeRuntime, RunState};
use crate::snapshot::{ConfigSnapshot, OrchestrationLock};
use std::sync::Arc;
use std::time::Duration;

/// The deploy steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SnapshotConfig,
    DataBackup,
    BuildImages,
    StopTopology,
    StartInfrastructure,
    AwaitInfrastructure,
    Migrate,
    StartApplication,
    AwaitApplication,
    StartWorkers,
    VerifyTopology,
    SelfCheck,
    DiscardSnapshot,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::SnapshotConfig => "configuration snapshot",
            Stage::DataBackup => "data backup",
            Stage::BuildImages => "image build",
            Stage::StopTopology => "topology stop",
            Stage::StartInfrastructure => "infrastructure start",
            Stage::AwaitInfrastructure => "infrastructure readiness",
            Stage::Migrate => "database migration",
            Stage::StartApplication => "application start",
            Stage::AwaitApplication => "application readiness",
            Stage::StartWorkers => "worker start",
            Stage::VerifyTopology => "topology verification",
            Stage::SelfCheck => "post-deploy self-check",
            Stage::DiscardSnapshot => "snapshot cleanup",
        };
        f.write_str(s)
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Succeeded,
    /// Advisory failure: logged, deploy continues.
    Warned(String),
    /// Fatal failure: deploy aborts and rolls back.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub stage: Stage,
    pub outcome: StepOutcome,
}

/// In-memory record of one deploy invocation. Never persisted — after a
/// crash, the configuration snapshot on disk is the only evidence.
#[derive(Debug, Default)]
pub struct DeployReport {
    pub steps: Vec<StepRecord>,
    pub rollback_triggered: bool,
}

impl DeployReport {
    fn succeeded(&mut self, stage: Stage) {
        self.steps.push(StepRecord {
            stage,
            outcome: StepOutcome::Succeeded,
        });
    }

    fn warned(&mut self, stage: Stage, warning: String) {
        self.steps.push(StepRecord {
            stage,
            outcome: StepOutcome::Warned(warning),
        });
    }

    fn failed(&mut self, stage: Stage, error: Error) -> (Stage, Error) {
        self.steps.push(StepRecord {
            stage,
            outcome: StepOutcome::Failed(error.to_string()),
        });
        (stage, error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Warned(_)))
    }
}

/// Tunable knobs, all bounded. The defaults match the documented behavior:
/// 30s stop grace, 30×2s readiness ceiling, 5s settle, 10×2s verification.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub stop_grace: Duration,
    pub settle_delay: Duration,
    pub readiness: RetryPolicy,
    pub verification: RetryPolicy,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(30),
            settle_delay: Duration::from_secs(5),
            readiness: RetryPolicy::readiness(),
            verification: RetryPolicy::verification(),
        }
    }
}

pub struct DeployOrchestrator {
    runtime: Arc<dyn ComposeRuntime>,
    topology: Topology,
    target: DeployTarget,
    settings: DeploySettings,
    output: Arc<dyn UserOutput>,
}

impl DeployOrchestrator {
    pub fn new(
        runtime: Arc<dyn ComposeRuntime>,
        topology: Topology,
        target: DeployTarget,
        output: Arc<dyn UserOutput>,
    ) -> Self {
        Self {
            runtime,
            topology,
            target,
            settings: DeploySettings::default(),
            output,
        }
    }

    pub fn with_settings(mut self, settings: DeploySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run a full deploy.
    ///
    /// Precondition failures return before anything has been mutated. Once
    /// mutation starts, any fatal step triggers one automatic rollback and
    /// the error is returned as [`Error::DeployFailed`] naming the stage.
    pub async fn deploy(&self) -> Result<DeployReport> {
        self.topology.validate()?;
        self.preflight().await?;

        let _lock = OrchestrationLock::acquire(self.target.lock_path())?;
        let snapshot = ConfigSnapshot::for_target(&self.target);
        if snapshot.exists() {
            return Err(Error::SnapshotExists(snapshot.path().to_path_buf()));
        }

        let mut report = DeployReport::default();
        match self.run_steps(&snapshot, &mut report).await {
            Ok(()) => {
                self.output.success("Deployment completed successfully");
                Ok(report)
            }
            Err((stage, error)) => {
                self.output.error(&format!("{} failed: {}", stage, error));

                // A failed snapshot capture means nothing has been mutated
                // yet, and there is no snapshot to restore. Abort without
                // touching the running topology.
                if stage == Stage::SnapshotConfig {
                    return Err(Error::DeployFailed {
                        stage,
                        source: Box::new(error),
                    });
                }

                tracing::error!(stage = %stage, error = %error, "deploy failed, rolling back");
                report.rollback_triggered = true;

                let rollback = RollbackOrchestrator::new(
                    Arc::clone(&self.runtime),
                    self.topology.clone(),
                    self.target.clone(),
                    Arc::clone(&self.output),
                )
                .with_settings(self.settings.clone());

                self.output.status("Rolling back to the previous configuration...");
                match rollback.restore_and_restart(&snapshot).await {
                    Ok(()) => self
                        .output
                        .warning("Deploy failed; previous configuration restored"),
                    Err(rollback_error) => self.output.error(&format!(
                        "Rollback did not complete: {}",
                        rollback_error
                    )),
                }

                Err(Error::DeployFailed {
                    stage,
                    source: Box::new(error),
                })
            }
        }
    }

    /// Checks that must pass before any mutation. All read-only.
    async fn preflight(&self) -> Result<()> {
        self.output.progress("Container engine: ");
        if !self.runtime.engine_reachable().await {
            self.output.finish_progress("unreachable");
            return Err(Error::EngineUnreachable);
        }
        self.output.finish_progress("ok");

        self.output.progress("Compose tooling: ");
        if !self.runtime.compose_available().await {
            self.output.finish_progress("missing");
            return Err(Error::ComposeUnavailable);
        }
        self.output.finish_progress("ok");

        self.target.ensure_compose_file()?;
        self.target.verify_services_defined(&self.topology)?;
        Ok(())
    }

    async fn run_steps(
        &self,
        snapshot: &ConfigSnapshot,
        report: &mut DeployReport,
    ) -> std::result::Result<(), (Stage, Error)> {
        let out = self.output.as_ref();
        let runtime = &self.runtime;

        // 1. Configuration snapshot. Losing this loses the rollback target,
        //    so unlike the data backup it is fatal.
        out.status("Snapshotting the active configuration...");
        match snapshot.capture() {
            Ok(()) => report.succeeded(Stage::SnapshotConfig),
            Err(e) => return Err(report.failed(Stage::SnapshotConfig, e)),
        }

        // 2. Data backup, best effort: a stale backup beats a blocked deploy.
        out.status("Creating database backup (best effort)...");
        match self.data_backup().await {
            Ok(()) => report.succeeded(Stage::DataBackup),
            Err(warning) => {
                out.warning(&format!("Database backup failed: {}", warning));
                report.warned(Stage::DataBackup, warning);
            }
        }

        // 3. Build new artifacts while the old topology still serves.
        out.status("Building service images...");
        match runtime.build_images().await {
            Ok(()) => report.succeeded(Stage::BuildImages),
            Err(e) => return Err(report.failed(Stage::BuildImages, e)),
        }

        // 4. Stop the old topology. Downtime begins here.
        out.status(&format!(
            "Stopping current topology (grace {}s)...",
            self.settings.stop_grace.as_secs()
        ));
        match runtime.stop_all(self.settings.stop_grace).await {
            Ok(()) => report.succeeded(Stage::StopTopology),
            Err(e) => return Err(report.failed(Stage::StopTopology, e)),
        }

        // 5–6. Infrastructure up, then gate on its readiness.
        out.status("Starting infrastructure services...");
        match self.start_phase(&self.topology.infrastructure).await {
            Ok(()) => report.succeeded(Stage::StartInfrastructure),
            Err(e) => return Err(report.failed(Stage::StartInfrastructure, e)),
        }
        out.status("Waiting for infrastructure to become ready...");
        match await_services_ready(runtime, &self.topology.infrastructure, &self.settings.readiness)
            .await
        {
            Ok(()) => report.succeeded(Stage::AwaitInfrastructure),
            Err(e) => return Err(report.failed(Stage::AwaitInfrastructure, e)),
        }

        // 7. One-shot migration against ready infrastructure.
        out.status("Running database migrations...");
        let migration = &self.topology.migration;
        match runtime
            .run_one_shot(&migration.service, &migration.args)
            .await
        {
            Ok(()) => report.succeeded(Stage::Migrate),
            Err(e) => {
                return Err(report.failed(Stage::Migrate, Error::MigrationFailed(e.to_string())))
            }
        }

        // 8–9. Application + edge proxy, settle, then gate on readiness.
        out.status("Starting application services...");
        match self.start_phase(&self.topology.application).await {
            Ok(()) => report.succeeded(Stage::StartApplication),
            Err(e) => return Err(report.failed(Stage::StartApplication, e)),
        }
        tokio::time::sleep(self.settings.settle_delay).await;
        out.status("Waiting for the application to become ready...");
        match await_services_ready(runtime, &self.topology.application, &self.settings.readiness)
            .await
        {
            Ok(()) => report.succeeded(Stage::AwaitApplication),
            Err(e) => return Err(report.failed(Stage::AwaitApplication, e)),
        }

        // 10. Background workers last.
        out.status("Starting worker services...");
        match self.start_phase(&self.topology.workers).await {
            Ok(()) => report.succeeded(Stage::StartWorkers),
            Err(e) => return Err(report.failed(Stage::StartWorkers, e)),
        }

        // 11. All-or-nothing verification of the full topology.
        out.status("Verifying all services...");
        let all: Vec<ServiceSpec> = self.topology.startup_order().into_iter().cloned().collect();
        match verify_services(runtime, &all, &self.settings.verification).await {
            Ok(()) => report.succeeded(Stage::VerifyTopology),
            Err(e) => return Err(report.failed(Stage::VerifyTopology, e)),
        }

        // 12. Advisory self-check. A failure here is a diagnostic for the
        //     operator, not grounds to unwind a verified deploy.
        out.status("Running deployment self-check...");
        match self.self_check().await {
            Ok(()) => report.succeeded(Stage::SelfCheck),
            Err(warning) => {
                out.warning(&format!("Self-check reported problems: {}", warning));
                report.warned(Stage::SelfCheck, warning);
            }
        }

        // 13. Success: the snapshot is no longer a rollback target.
        match snapshot.discard() {
            Ok(()) => report.succeeded(Stage::DiscardSnapshot),
            Err(e) => {
                // The deploy itself succeeded; don't unwind it over a
                // housekeeping failure, but tell the operator the stale
                // snapshot must go.
                let warning = format!(
                    "could not remove snapshot {}: {} (remove it manually)",
                    snapshot.path().display(),
                    e
                );
                out.warning(&warning);
                report.warned(Stage::DiscardSnapshot, warning);
            }
        }

        Ok(())
    }

    async fn start_phase(&self, specs: &[ServiceSpec]) -> Result<()> {
        let names: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        self.runtime.start_services(&names).await
    }

    async fn data_backup(&self) -> std::result::Result<(), String> {
        let Some(step) = &self.topology.backup else {
            return Ok(());
        };
        match self.runtime.exec(&step.service, &step.command).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!(
                "'{}' in service '{}' exited non-zero",
                step.command, step.service
            )),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn self_check(&self) -> std::result::Result<(), String> {
        let Some(step) = &self.topology.self_check else {
            return Ok(());
        };
        match self.runtime.exec(&step.service, &step.command).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!(
                "'{}' in service '{}' exited non-zero",
                step.command, step.service
            )),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Gate on a phase: every service must reach `Running` *and* pass its probe
/// (when it has one) within the policy's ceiling.
pub(crate) async fn await_services_ready(
    runtime: &Arc<dyn ComposeRuntime>,
    specs: &[ServiceSpec],
    policy: &RetryPolicy,
) -> Result<()> {
    for spec in specs {
        if !service_becomes_ready(runtime, spec, policy).await? {
            return Err(Error::ReadinessTimeout {
                service: spec.name.clone(),
                attempts: policy.max_attempts,
                interval: policy.interval,
            });
        }
        tracing::info!(service = %spec.name, "service is ready");
    }
    Ok(())
}

/// Verification pass over the whole topology: like readiness, but collects
/// every failing service instead of stopping at the first.
pub(crate) async fn verify_services(
    runtime: &Arc<dyn ComposeRuntime>,
    specs: &[ServiceSpec],
    policy: &RetryPolicy,
) -> Result<()> {
    let mut failing = Vec::new();
    for spec in specs {
        if !service_becomes_ready(runtime, spec, policy).await? {
            failing.push(spec.name.clone());
        }
    }
    if failing.is_empty() {
        Ok(())
    } else {
        Err(Error::VerificationFailed(failing))
    }
}

async fn service_becomes_ready(
    runtime: &Arc<dyn ComposeRuntime>,
    spec: &ServiceSpec,
    policy: &RetryPolicy,
) -> Result<bool> {
    let checker = healthcheck::checker_for(spec, Arc::clone(runtime))?;
    let ready = poll_until(policy, || {
        let runtime = Arc::clone(runtime);
        let checker = checker.clone();
        let name = spec.name.clone();
        async move {
            if runtime.service_state(&name).await != RunState::Running {
                return false;
            }
            match checker {
                Some(c) => c.check().await.unwrap_or(false),
                None => true,
            }
        }
    })
    .await;
    Ok(ready)
}
