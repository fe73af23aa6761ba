use crate::elevate::{create_elevated_command, ElevationContext};
use crate::error::{CommandReport, RunError};
use crate::template::create_command;
use crate::upload::upload_script;
use provisioner_core::{time_ordered_id, Communicator, RemoteCmd};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Credentials for running the payload as a different identity than the one
/// authenticating the transport session.
#[derive(Debug, Clone)]
pub struct Elevation {
    pub username: String,
    pub password: String,
}

/// What the transport observed of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exited: bool,
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Execute a command body on the remote host, optionally elevated.
///
/// Uploads the body as a script, composes the invocation (wrapping it in a
/// scheduled-task runner when `elevation` is supplied), runs it through the
/// transport's blocking start/wait primitive, and applies a strict result
/// policy: no completion signal, a non-zero exit status, or any non-whitespace
/// stderr content each reject the run with an error embedding everything
/// captured. Nothing is retried; retry policy belongs to the caller.
///
/// Uploaded scripts are not deleted afterwards; only the scheduled task's
/// stdout log is cleaned up, by the wrapper itself.
pub fn run_command(
    comm: &dyn Communicator,
    elevation: Option<&Elevation>,
    vars: &str,
    command: &str,
) -> Result<ExecutionResult, RunError> {
    let name = format!("terraform-{}", time_ordered_id());
    let file_name = format!("shell-{name}.ps1");

    let path = upload_script(comm, &file_name, command)?;

    let command_line = match elevation {
        None => create_command(vars, &path)?,
        Some(credentials) => {
            let ctx =
                ElevationContext::new(credentials.username.clone(), credentials.password.clone());
            create_elevated_command(comm, &ctx, vars, &path)?
        }
    };

    debug!("starting remote command: {}", command_line);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let status = {
        let mut cmd = RemoteCmd {
            command: command_line,
            stdout: &mut stdout,
            stderr: &mut stderr,
        };
        comm.start(&mut cmd).map_err(RunError::TransportStart)?
    };

    let result = ExecutionResult {
        exited: status.exited,
        exit_status: status.exit_status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    };

    check_result(result, vars, command)
}

/// Strict completion policy: even a clean exit is a failure if anything was
/// written to stderr. Leading/trailing whitespace is stripped before the
/// emptiness check.
fn check_result(
    result: ExecutionResult,
    vars: &str,
    command: &str,
) -> Result<ExecutionResult, RunError> {
    let report = |result: &ExecutionResult| CommandReport {
        command: command.to_string(),
        vars: vars.to_string(),
        exit_status: result.exit_status,
        stdout: result.stdout.clone(),
        stderr: result.stderr.clone(),
    };

    if !result.exited {
        return Err(RunError::Incomplete(report(&result)));
    }
    if result.exit_status != 0 {
        return Err(RunError::NonZeroExit(report(&result)));
    }
    if !result.stderr.trim().is_empty() {
        return Err(RunError::StderrNonEmpty(report(&result)));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exited: bool, exit_status: i32, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exited,
            exit_status,
            stdout: "output".to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn clean_result_passes() {
        let checked = check_result(result(true, 0, ""), "", "exit 0").unwrap();
        assert_eq!(checked.exit_status, 0);
    }

    #[test]
    fn whitespace_only_stderr_passes() {
        assert!(check_result(result(true, 0, " \r\n \t"), "", "exit 0").is_ok());
    }

    #[test]
    fn not_exited_is_incomplete_even_with_zero_status() {
        match check_result(result(false, 0, ""), "", "exit 0") {
            Err(RunError::Incomplete(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_zero_exit_takes_priority_over_stderr() {
        match check_result(result(true, 5, "boom"), "", "exit 5") {
            Err(RunError::NonZeroExit(report)) => assert_eq!(report.exit_status, 5),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn stderr_fails_a_successful_exit() {
        match check_result(result(true, 0, "warning text"), "$v=1", "noisy") {
            Err(RunError::StderrNonEmpty(report)) => {
                assert_eq!(report.stderr, "warning text");
                assert_eq!(report.vars, "$v=1");
                assert_eq!(report.command, "noisy");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn execution_result_serde_round_trip() {
        let original = result(true, 0, "");
        let json = serde_json::to_string(&original).unwrap();
        let back: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
