use provisioner_core::TransportError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to render script template: {0}")]
    TemplateRender(String),

    #[error("failed to upload script: {0}")]
    Upload(String),

    #[error("error executing remote command: {0}")]
    TransportStart(TransportError),

    #[error("remote command did not run to completion\n{0}")]
    Incomplete(CommandReport),

    #[error("remote command exited with a non-zero status\n{0}")]
    NonZeroExit(CommandReport),

    #[error("remote command wrote to stderr\n{0}")]
    StderrNonEmpty(CommandReport),
}

/// Everything captured from a finished remote command, embedded in the error
/// that rejects it so the caller can diagnose the failure without re-running.
#[derive(Debug, Clone)]
pub struct CommandReport {
    pub command: String,
    pub vars: String,
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for CommandReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "exit status: {}", self.exit_status)?;
        writeln!(f, "vars: {}", self.vars)?;
        writeln!(f, "command: {}", self.command)?;
        writeln!(f, "stdout: {}", self.stdout)?;
        write!(f, "stderr: {}", self.stderr)
    }
}
