use anyhow::anyhow;
use clap::Parser;
use empleos_deploy::cli::{self, CommonArgs};
use empleos_deploy::{
    CliOutput, ComposeRuntime, DeploySettings, DockerCompose, Error, RollbackOrchestrator,
    RollbackOutcome, Topology, UserOutput,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rollback")]
#[command(about = "Restore the pre-deploy configuration and restart the stack")]
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
    let runtime: Arc<dyn ComposeRuntime> = Arc::new(DockerCompose::for_target(&target));
    let output: Arc<dyn UserOutput> = Arc::new(CliOutput);

    let mut settings = DeploySettings::default();
    if let Some(grace) = args.grace {
        settings.stop_grace = grace;
    }

    let orchestrator =
        RollbackOrchestrator::new(runtime, Topology::production(), target.clone(), output)
            .with_settings(settings);

    // Fail closed before bothering the operator with a prompt.
    if !orchestrator.snapshot_available() {
        return Err(anyhow!(Error::NoSnapshot(target.snapshot_path())));
    }

    eprintln!("WARNING: this stops the running stack and restores the configuration");
    eprintln!("saved before the last deploy.");
    eprint!("Type 'yes' to continue: ");
    std::io::stderr().flush().ok();

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        answer.clear();
    }
    let confirmed = answer.trim() == "yes";

    // A declined prompt is a clean exit, not a failure.
    match orchestrator.rollback(confirmed).await? {
        RollbackOutcome::Completed | RollbackOutcome::Cancelled => Ok(()),
    }
}
