//! Shared plumbing for the three binaries.

use crate::config::{parse_duration, DeployTarget};
use crate::error::{Error, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Flags common to `deploy`, `rollback`, and `status`. All optional; with no
/// flags the binaries act on the production target in the current directory.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Compose file (defaults to docker-compose.production.yml)
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Working directory (defaults to the current directory)
    #[arg(short = 'w', long = "workdir")]
    pub workdir: Option<PathBuf>,

    /// Environment file passed through to compose
    #[arg(long = "env-file")]
    pub env_file: Option<PathBuf>,
}

impl CommonArgs {
    pub fn target(&self) -> Result<DeployTarget> {
        DeployTarget::resolve(
            self.workdir.clone(),
            self.file.clone(),
            self.env_file.clone(),
        )
    }
}

/// clap value parser for duration flags like `--grace 45s`.
pub fn duration_arg(s: &str) -> std::result::Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("invalid duration '{}' (try e.g. \"30s\", \"2m\")", s))
}

/// Initialize tracing to stderr; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Print a failure with its suggestion, if the error carries one.
pub fn report_failure(error: &anyhow::Error) {
    if let Some(known) = error.downcast_ref::<Error>() {
        eprintln!("Error: {}", known);
        if let Some(suggestion) = known.suggestion() {
            eprintln!("\nHint: {}", suggestion);
        }
    } else {
        eprintln!("Error: {:#}", error);
    }
}
