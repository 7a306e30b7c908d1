use std::io::Write;

/// Abstraction over user-facing output.
///
/// Orchestration modules use this trait instead of `println!`/`eprintln!` so
/// that output can be suppressed in tests and so every line carries the same
/// status tag the operator expects on a production console.
pub trait UserOutput: Send + Sync {
    /// Informational step message (e.g., "Stopping current topology...")
    fn status(&self, message: &str);

    /// Success message (e.g., "Deployment completed successfully")
    fn success(&self, message: &str);

    /// Warning message for advisory failures (e.g., "Database backup failed")
    fn warning(&self, message: &str);

    /// Error message for fatal failures
    fn error(&self, message: &str);

    /// Inline progress (no trailing newline). Call `finish_progress` after.
    fn progress(&self, message: &str);

    /// Finish an inline progress line with a result.
    fn finish_progress(&self, result: &str);

    /// A blank line separator.
    fn blank(&self);
}

/// Standard CLI output: writes tagged, colored lines to stdout/stderr.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("\x1b[34m[INFO]\x1b[0m {}", message);
    }

    fn success(&self, message: &str) {
        println!("\x1b[32m[ OK ]\x1b[0m {}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m[WARN]\x1b[0m {}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m[FAIL]\x1b[0m {}", message);
    }

    fn progress(&self, message: &str) {
        print!("{}", message);
        std::io::stdout().flush().ok();
    }

    fn finish_progress(&self, result: &str) {
        println!("{}", result);
    }

    fn blank(&self) {
        println!();
    }
}

/// Suppresses all output. Used in tests.
pub struct QuietOutput;

impl UserOutput for QuietOutput {
    fn status(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn progress(&self, _message: &str) {}
    fn finish_progress(&self, _result: &str) {}
    fn blank(&self) {}
}
