//! Remote privileged PowerShell execution over an abstract transport.
//!
//! The transport only offers "upload a file, start a process, wait for exit",
//! and network authentication cannot delegate credentials past one hop. To run
//! a command as a different identity than the one the transport authenticated,
//! this crate wraps the command in a generated script that registers and runs
//! a one-shot scheduled task under the supplied credentials on the remote host
//! itself, tails its output, and exits with the payload's exit code.
//!
//! [`run_command`] is the only entry point.

pub mod elevate;
pub mod error;
pub mod escape;
pub mod run;
pub mod template;
pub mod upload;

pub use elevate::ElevationContext;
pub use error::{CommandReport, RunError};
pub use run::{run_command, Elevation, ExecutionResult};
