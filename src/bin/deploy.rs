use clap::Parser;
use empleos_deploy::cli::{self, CommonArgs};
use empleos_deploy::{
    CliOutput, ComposeRuntime, DeployOrchestrator, DeploySettings, DockerCompose,
    StatusInspector, Topology, UserOutput,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "deploy")]
#[command(about = "Deploy the production stack, with automatic rollback on failure")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Grace period for draining the running topology before it is stopped
    #[arg(long, value_parser = cli::duration_arg)]
    grace: Option<Duration>,
}

#[tokio::main]
async fn main() {
    cli::init_tracing();
    let args = Cli::parse();
    if let Err(e) = run(args).await {
        cli::report_failure(&e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let target = args.common.target()?;
    let topology = Topology::production();
    let runtime: Arc<dyn ComposeRuntime> = Arc::new(DockerCompose::for_target(&target));
    let output: Arc<dyn UserOutput> = Arc::new(CliOutput);

    let mut settings = DeploySettings::default();
    if let Some(grace) = args.grace {
        settings.stop_grace = grace;
    }

    let orchestrator = DeployOrchestrator::new(
        Arc::clone(&runtime),
        topology.clone(),
        target.clone(),
        Arc::clone(&output),
    )
    .with_settings(settings);

    let report = orchestrator.deploy().await?;
    for record in report.warnings() {
        tracing::warn!(stage = %record.stage, "step finished with a warning");
    }

    // Close with a status table so the operator sees what is actually running.
    let inspector = StatusInspector::new(runtime, topology, target);
    if let Ok(status_report) = inspector.inspect().await {
        output.blank();
        empleos_deploy::status::render(&status_report, output.as_ref());
    }

    Ok(())
}
