//! Deploy orchestrator behavior against a scripted runtime: phase ordering,
//! the advisory/fatal split, snapshot lifecycle, and automatic rollback.

mod common;

use common::{fast_settings, test_target, test_topology, MockBehavior, MockRuntime};
use empleos_deploy::deploy::StepOutcome;
use empleos_deploy::runtime::ComposeRuntime;
use empleos_deploy::{
    ConfigSnapshot, DeployOrchestrator, Error, QuietOutput, Stage,
};
use std::sync::Arc;

fn orchestrator_with(
    mock: &Arc<MockRuntime>,
    dir: &tempfile::TempDir,
) -> (DeployOrchestrator, empleos_deploy::DeployTarget) {
    let target = test_target(dir.path());
    let runtime: Arc<dyn ComposeRuntime> = Arc::clone(mock) as Arc<dyn ComposeRuntime>;
    let orchestrator = DeployOrchestrator::new(
        runtime,
        test_topology(),
        target.clone(),
        Arc::new(QuietOutput),
    )
    .with_settings(fast_settings());
    (orchestrator, target)
}

#[tokio::test]
async fn happy_path_runs_phases_strictly_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::healthy());
    let (orchestrator, target) = orchestrator_with(&mock, &dir);

    let report = orchestrator.deploy().await.expect("deploy should succeed");

    assert!(!report.rollback_triggered);
    assert_eq!(report.warnings().count(), 0);

    // Backup runs against the old topology, before anything is torn down.
    let backup = mock.call_index("exec:db:backup");
    let build = mock.call_index("build");
    let down = mock.call_index("down");
    let infra = mock.call_index("up:db,cache");
    let migrate = mock.call_index("run:app:migrate");
    let app = mock.call_index("up:app");
    let workers = mock.call_index("up:worker");

    assert!(backup < down, "backup must precede the stop");
    assert!(build < down, "build happens while the old topology serves");
    assert!(down < infra);
    assert!(infra < migrate, "migration only runs on ready infrastructure");
    assert!(migrate < app);
    assert!(app < workers, "workers start last");

    // Success consumes the snapshot; the compose file is untouched.
    assert!(!ConfigSnapshot::for_target(&target).exists());
    assert_eq!(
        std::fs::read_to_string(&target.compose_file).unwrap(),
        common::ORIGINAL_COMPOSE
    );
}

#[tokio::test]
async fn infra_readiness_timeout_rolls_back_once() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::new(MockBehavior {
        never_ready: ["db".to_string()].into(),
        ..Default::default()
    }));
    let (orchestrator, target) = orchestrator_with(&mock, &dir);

    let err = orchestrator.deploy().await.unwrap_err();
    match err {
        Error::DeployFailed { stage, source } => {
            assert_eq!(stage, Stage::AwaitInfrastructure);
            assert!(matches!(*source, Error::ReadinessTimeout { .. }));
        }
        other => panic!("expected DeployFailed, got {other:?}"),
    }

    // Exactly one rollback: the deploy's own stop plus the rollback's stop.
    assert_eq!(mock.count_calls("down"), 2);

    // The readiness gate probed the service a bounded number of times in
    // each direction (3 during deploy, 3 during the rollback's gate).
    assert_eq!(mock.count_calls("exec:db:db-ready"), 6);

    // The snapshot was consumed by the restore.
    assert!(!ConfigSnapshot::for_target(&target).exists());
    assert_eq!(
        std::fs::read_to_string(&target.compose_file).unwrap(),
        common::ORIGINAL_COMPOSE
    );
}

#[tokio::test]
async fn migration_failure_rolls_back_and_restores_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::new(MockBehavior {
        fail_migration: true,
        ..Default::default()
    }));
    let (orchestrator, target) = orchestrator_with(&mock, &dir);

    let err = orchestrator.deploy().await.unwrap_err();
    match err {
        Error::DeployFailed { stage, source } => {
            assert_eq!(stage, Stage::Migrate);
            assert!(matches!(*source, Error::MigrationFailed(_)));
        }
        other => panic!("expected DeployFailed, got {other:?}"),
    }

    assert_eq!(mock.count_calls("down"), 2);
    // Infrastructure came up twice (deploy, then rollback); the later phases
    // only ever started during the rollback's relaunch.
    assert_eq!(mock.count_calls("up:db,cache"), 2);
    assert_eq!(mock.count_calls("up:app"), 1);
    assert_eq!(mock.count_calls("up:worker"), 1);
    assert!(!ConfigSnapshot::for_target(&target).exists());
}

#[tokio::test]
async fn build_failure_rolls_back_before_any_stop() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::new(MockBehavior {
        fail_build: true,
        ..Default::default()
    }));
    let (orchestrator, _target) = orchestrator_with(&mock, &dir);

    let err = orchestrator.deploy().await.unwrap_err();
    assert!(matches!(
        err,
        Error::DeployFailed {
            stage: Stage::BuildImages,
            ..
        }
    ));

    // The old topology was still serving when the build failed; the only
    // stop comes from the rollback pass.
    assert_eq!(mock.count_calls("down"), 1);
}

#[tokio::test]
async fn application_start_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::new(MockBehavior {
        fail_start: ["app".to_string()].into(),
        ..Default::default()
    }));
    let (orchestrator, _target) = orchestrator_with(&mock, &dir);

    let err = orchestrator.deploy().await.unwrap_err();
    assert!(matches!(
        err,
        Error::DeployFailed {
            stage: Stage::StartApplication,
            ..
        }
    ));
    assert_eq!(mock.count_calls("down"), 2);
}

#[tokio::test]
async fn backup_failure_is_advisory_only() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::new(MockBehavior {
        fail_backup: true,
        ..Default::default()
    }));
    let (orchestrator, target) = orchestrator_with(&mock, &dir);

    let report = orchestrator
        .deploy()
        .await
        .expect("a failed backup must not block the deploy");

    assert!(!report.rollback_triggered);
    let warned: Vec<_> = report.warnings().map(|r| r.stage).collect();
    assert_eq!(warned, vec![Stage::DataBackup]);
    assert_eq!(mock.count_calls("down"), 1, "no rollback happened");
    assert!(!ConfigSnapshot::for_target(&target).exists());
}

#[tokio::test]
async fn self_check_failure_is_advisory_only() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::new(MockBehavior {
        fail_self_check: true,
        ..Default::default()
    }));
    let (orchestrator, target) = orchestrator_with(&mock, &dir);

    let report = orchestrator.deploy().await.expect("self-check is advisory");

    assert!(!report.rollback_triggered);
    assert!(report
        .warnings()
        .any(|r| matches!((r.stage, &r.outcome), (Stage::SelfCheck, StepOutcome::Warned(_)))));
    assert!(!ConfigSnapshot::for_target(&target).exists());
}

#[tokio::test]
async fn verification_treats_an_exited_service_as_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::new(MockBehavior {
        exit_after_start: ["worker".to_string()].into(),
        ..Default::default()
    }));
    let (orchestrator, _target) = orchestrator_with(&mock, &dir);

    let err = orchestrator.deploy().await.unwrap_err();
    match err {
        Error::DeployFailed { stage, source } => {
            assert_eq!(stage, Stage::VerifyTopology);
            match *source {
                Error::VerificationFailed(services) => {
                    assert_eq!(services, vec!["worker".to_string()]);
                }
                other => panic!("expected VerificationFailed, got {other:?}"),
            }
        }
        other => panic!("expected DeployFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn verification_treats_running_but_probe_failing_as_fatal() {
    let dir = tempfile::tempdir().unwrap();
    // The app passes its readiness gate (first probe call succeeds), then
    // starts failing: up in the process sense, degraded in practice.
    let mock = Arc::new(MockRuntime::new(MockBehavior {
        flaky_after: [("app".to_string(), 1)].into(),
        ..Default::default()
    }));
    let (orchestrator, _target) = orchestrator_with(&mock, &dir);

    let err = orchestrator.deploy().await.unwrap_err();
    match err {
        Error::DeployFailed { stage, source } => {
            assert_eq!(stage, Stage::VerifyTopology);
            assert!(matches!(*source, Error::VerificationFailed(_)));
        }
        other => panic!("expected DeployFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn pending_snapshot_blocks_a_new_deploy_without_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::healthy());
    let (orchestrator, target) = orchestrator_with(&mock, &dir);

    // Leave a snapshot behind, as a failed-and-unrolled-back deploy would.
    std::fs::write(target.snapshot_path(), "services:\n  old: {}\n").unwrap();

    let err = orchestrator.deploy().await.unwrap_err();
    assert!(matches!(err, Error::SnapshotExists(_)));

    // Fail-fast: nothing was built, stopped, or started.
    assert_eq!(mock.count_calls("build"), 0);
    assert_eq!(mock.count_calls("down"), 0);
    assert_eq!(mock.count_calls("up:"), 0);
    // The stale snapshot is untouched.
    assert_eq!(
        std::fs::read_to_string(target.snapshot_path()).unwrap(),
        "services:\n  old: {}\n"
    );
}

#[tokio::test]
async fn deploy_against_incomplete_compose_file_fails_in_preflight() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRuntime::healthy());
    let target = test_target(dir.path());
    std::fs::write(&target.compose_file, "services:\n  db: {}\n").unwrap();

    let runtime: Arc<dyn ComposeRuntime> = Arc::clone(&mock) as Arc<dyn ComposeRuntime>;
    let orchestrator = DeployOrchestrator::new(
        runtime,
        test_topology(),
        target,
        Arc::new(QuietOutput),
    )
    .with_settings(fast_settings());

    let err = orchestrator.deploy().await.unwrap_err();
    assert!(matches!(err, Error::ServiceNotDefined { .. }));
    assert!(mock.calls().is_empty(), "preflight must not mutate anything");
}
