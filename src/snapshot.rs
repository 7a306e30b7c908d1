//! The configuration snapshot and the orchestration lock.
//!
//! The snapshot is the system's only persistent deploy state: a byte-for-byte
//! copy of the compose file taken before a deploy mutates anything. Its
//! presence on disk *is* the signal — "a deploy is in flight, or failed and
//! has not been rolled back". Steady state is no snapshot.

use crate::config::DeployTarget;
use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Handle to the pre-deploy copy of the compose file.
///
/// Lifecycle: [`capture`](Self::capture) at the start of a deploy,
/// then exactly one of [`discard`](Self::discard) (deploy succeeded) or
/// [`restore`](Self::restore) (rollback). Both consume the file.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    config_path: PathBuf,
    snapshot_path: PathBuf,
}

impl ConfigSnapshot {
    pub fn for_target(target: &DeployTarget) -> Self {
        Self {
            config_path: target.compose_file.clone(),
            snapshot_path: target.snapshot_path(),
        }
    }

    pub fn new(config_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.is_file()
    }

    /// Copy the active configuration aside. Refuses to overwrite an existing
    /// snapshot — that file is the rollback target of an earlier failed
    /// deploy, and clobbering it would destroy the safety net.
    pub fn capture(&self) -> Result<()> {
        if self.exists() {
            return Err(Error::SnapshotExists(self.snapshot_path.clone()));
        }
        std::fs::copy(&self.config_path, &self.snapshot_path)?;
        tracing::info!(
            snapshot = %self.snapshot_path.display(),
            "captured configuration snapshot"
        );
        Ok(())
    }

    /// Restore the snapshot over the active configuration, then consume it.
    /// The copy happens before the delete so a crash between the two leaves
    /// the snapshot in place rather than lost.
    pub fn restore(&self) -> Result<()> {
        if !self.exists() {
            return Err(Error::NoSnapshot(self.snapshot_path.clone()));
        }
        std::fs::copy(&self.snapshot_path, &self.config_path)?;
        std::fs::remove_file(&self.snapshot_path)?;
        tracing::info!(
            config = %self.config_path.display(),
            "restored configuration from snapshot"
        );
        Ok(())
    }

    /// Delete the snapshot (success path). Idempotent: discarding an absent
    /// snapshot is a no-op.
    pub fn discard(&self) -> Result<()> {
        match std::fs::remove_file(&self.snapshot_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Advisory exclusive lock detecting concurrent deploy/rollback invocations.
///
/// Held for the duration of an orchestration; released on drop (and by the
/// OS if the process dies). A second orchestration against the same target
/// fails fast with [`Error::LockHeld`] instead of racing on the snapshot.
pub struct OrchestrationLock {
    file: File,
    path: PathBuf,
}

impl OrchestrationLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| Error::LockHeld(path.clone()))?;
        Ok(Self { file, path })
    }
}

impl Drop for OrchestrationLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), "failed to release lock: {}", e);
        }
    }
}
