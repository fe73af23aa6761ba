use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("failed to start remote process: {0}")]
    Start(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A remote command line plus the caller-supplied sinks that receive its
/// output while it runs.
pub struct RemoteCmd<'a> {
    pub command: String,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

/// Completion signal for a remote command.
///
/// `exited == false` means the transport never observed process completion,
/// which is distinct from a non-zero `exit_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    pub exited: bool,
    pub exit_status: i32,
}

/// Abstract transport to the remote host. Implementations own connection
/// setup, authentication, and encryption; this crate only consumes the
/// upload and start/wait primitives.
///
/// A session is not assumed to support concurrent in-flight commands.
/// Callers must serialize calls against one session unless the
/// implementation documents otherwise.
pub trait Communicator {
    /// Upload file content to the given remote path.
    fn upload(&self, remote_path: &str, content: &mut dyn Read) -> Result<(), TransportError>;

    /// Start the command line and block until the remote process finishes,
    /// streaming its output into the sinks of `cmd`. Returns the completion
    /// signal. An `Err` means the process could not be started at all.
    fn start(&self, cmd: &mut RemoteCmd<'_>) -> Result<CommandStatus, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_status_serde_round_trip() {
        let status = CommandStatus {
            exited: true,
            exit_status: 42,
        };
        let json = serde_json::to_string(&status).unwrap();
        let back: CommandStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn transport_error_wraps_io() {
        let err: TransportError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(err.to_string().contains("missing"));
    }
}
