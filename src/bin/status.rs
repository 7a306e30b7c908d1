use clap::Parser;
use empleos_deploy::cli::{self, CommonArgs};
use empleos_deploy::{CliOutput, ComposeRuntime, DockerCompose, StatusInspector, Topology};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "status")]
#[command(about = "Inspect the running stack: run state, probes, resources, log errors")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Output the report as JSON
    #[arg(long)]
    json: bool,
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
    let inspector = StatusInspector::new(runtime, Topology::production(), target);

    let report = inspector.inspect().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        empleos_deploy::status::render(&report, &CliOutput);
    }
    Ok(())
}
