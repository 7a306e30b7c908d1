//! The rollback orchestrator.
//!
//! One code path serves both invocations: the deploy orchestrator's automatic
//! rollback (implicitly confirmed, lock already held) and the operator-driven
//! `rollback` binary (requires explicit confirmation, acquires the lock
//! itself). Rollback fails closed: no snapshot or no confirmation means no
//! mutation at all.

use crate::config::{DeployTarget, Topology};
use crate::deploy::{await_services_ready, verify_services, DeploySettings};
use crate::error::{Error, Result};
use crate::output::UserOutput;
use crate::runtime::ComposeRuntime;
use crate::snapshot::{ConfigSnapshot, OrchestrationLock};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The previous configuration was restored and the topology is back up.
    Completed,
    /// The operator declined; nothing was touched.
    Cancelled,
}

pub struct RollbackOrchestrator {
    runtime: Arc<dyn ComposeRuntime>,
    topology: Topology,
    target: DeployTarget,
    settings: DeploySettings,
    output: Arc<dyn UserOutput>,
}

impl RollbackOrchestrator {
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

    /// Whether a rollback target exists at all. Lets the interactive binary
    /// refuse before prompting the operator.
    pub fn snapshot_available(&self) -> bool {
        ConfigSnapshot::for_target(&self.target).exists()
    }

    /// Restore the pre-deploy snapshot and relaunch the topology.
    ///
    /// `confirmed = false` models an operator declining the prompt: the call
    /// returns [`RollbackOutcome::Cancelled`] without mutating anything.
    /// A missing snapshot is terminal ([`Error::NoSnapshot`]); so is a
    /// topology that will not come back up ([`Error::RestartFailed`]).
    pub async fn rollback(&self, confirmed: bool) -> Result<RollbackOutcome> {
        self.topology.validate()?;

        let snapshot = ConfigSnapshot::for_target(&self.target);
        if !snapshot.exists() {
            return Err(Error::NoSnapshot(snapshot.path().to_path_buf()));
        }

        if !confirmed {
            self.output.status("Rollback cancelled, nothing was changed");
            return Ok(RollbackOutcome::Cancelled);
        }

        let _lock = OrchestrationLock::acquire(self.target.lock_path())?;
        self.restore_and_restart(&snapshot).await?;
        Ok(RollbackOutcome::Completed)
    }

    /// The mutating half, shared with the deploy orchestrator's failure path
    /// (which already holds the orchestration lock and has its own snapshot
    /// handle).
    pub(crate) async fn restore_and_restart(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        let out = self.output.as_ref();

        out.status(&format!(
            "Stopping topology (grace {}s)...",
            self.settings.stop_grace.as_secs()
        ));
        self.runtime
            .stop_all(self.settings.stop_grace)
            .await
            .map_err(|e| Error::RestartFailed(format!("failed to stop topology: {}", e)))?;

        out.status("Restoring the previous configuration...");
        snapshot.restore()?;

        out.status("Restarting infrastructure services...");
        self.start_phase(&self.topology.infrastructure).await?;
        self.await_phase(&self.topology.infrastructure).await?;

        out.status("Restarting application services...");
        self.start_phase(&self.topology.application).await?;
        tokio::time::sleep(self.settings.settle_delay).await;
        self.await_phase(&self.topology.application).await?;

        out.status("Restarting worker services...");
        self.start_phase(&self.topology.workers).await?;

        out.status("Verifying restored topology...");
        let all: Vec<_> = self.topology.startup_order().into_iter().cloned().collect();
        verify_services(&self.runtime, &all, &self.settings.verification)
            .await
            .map_err(|e| Error::RestartFailed(e.to_string()))?;

        out.success("Rollback complete: previous configuration is running");
        Ok(())
    }

    async fn start_phase(&self, specs: &[crate::config::ServiceSpec]) -> Result<()> {
        let names: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        self.runtime
            .start_services(&names)
            .await
            .map_err(|e| Error::RestartFailed(e.to_string()))
    }

    async fn await_phase(&self, specs: &[crate::config::ServiceSpec]) -> Result<()> {
        await_services_ready(&self.runtime, specs, &self.settings.readiness)
            .await
            .map_err(|e| Error::RestartFailed(e.to_string()))
    }
}
