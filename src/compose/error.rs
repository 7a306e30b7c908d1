use std::fmt;
use std::time::Duration;

/// Structured error for `docker` / `docker compose` CLI operations.
#[derive(Debug)]
pub enum ComposeError {
    /// The command did not finish within its timeout.
    Timeout { command: String, timeout: Duration },

    /// The command ran but returned a non-zero exit.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// The binary could not be executed (not in PATH, permission denied).
    ExecFailed {
        command: String,
        source: std::io::Error,
    },

    /// The engine daemon is not responding.
    EngineUnavailable,
}

impl ComposeError {
    pub fn timeout(command: impl Into<String>, timeout: Duration) -> Self {
        ComposeError::Timeout {
            command: command.into(),
            timeout,
        }
    }

    pub fn failed(command: impl Into<String>, output: &std::process::Output) -> Self {
        ComposeError::CommandFailed {
            command: command.into(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        }
    }

    pub fn exec_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        ComposeError::ExecFailed {
            command: command.into(),
            source,
        }
    }
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::Timeout { command, timeout } => write!(
                f,
                "timed out running '{}' (exceeded {} seconds)",
                command,
                timeout.as_secs()
            ),
            ComposeError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => match exit_code {
                Some(code) => write!(f, "'{}' failed (exit code {}): {}", command, code, stderr),
                None => write!(f, "'{}' failed: {}", command, stderr),
            },
            ComposeError::ExecFailed { command, source } => {
                write!(f, "failed to execute '{}': {}", command, source)
            }
            ComposeError::EngineUnavailable => write!(f, "container engine is not responding"),
        }
    }
}

impl std::error::Error for ComposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComposeError::ExecFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
