//! Privilege elevation through the remote host's task scheduler.
//!
//! The transport authenticates one identity and cannot delegate its
//! credentials another hop. To run as a second identity, the composed command
//! is encoded into a wrapper script that registers and runs a one-shot
//! scheduled task under that identity locally on the remote host, with the
//! credentials carried in the wrapper's payload.

use crate::error::RunError;
use crate::escape::{encode_command, escape_single_quotes, escape_xml};
use crate::template::{create_command, render, ELEVATED_COMMAND_TEMPLATE};
use crate::upload::upload_script;
use provisioner_core::{time_ordered_id, Communicator};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TASK_DESCRIPTION: &str = "Terraform elevated task";
pub const DEFAULT_EXECUTION_TIME_LIMIT: Duration = Duration::from_secs(2 * 60 * 60);

/// Identity and scheduling parameters for one elevated run.
#[derive(Debug, Clone)]
pub struct ElevationContext {
    pub username: String,
    pub password: String,
    /// Unique per invocation; a fresh time-ordered name keeps concurrent
    /// elevated tasks on the same host from colliding.
    pub task_name: String,
    pub task_description: String,
    /// Enforced by the remote scheduler, not by this subsystem.
    pub execution_time_limit: Duration,
}

impl ElevationContext {
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password,
            task_name: format!("terraform-{}", time_ordered_id()),
            task_description: DEFAULT_TASK_DESCRIPTION.to_string(),
            execution_time_limit: DEFAULT_EXECUTION_TIME_LIMIT,
        }
    }
}

/// ISO-8601 duration form the task-definition schema expects.
fn iso8601_duration(duration: Duration) -> String {
    format!("PT{}S", duration.as_secs())
}

/// Render the scheduled-task wrapper around an already composed command and
/// upload it. Returns the wrapper's remote path.
pub fn generate_elevated_runner(
    comm: &dyn Communicator,
    ctx: &ElevationContext,
    command: &str,
) -> Result<String, RunError> {
    debug!("building elevated runner for task {}", ctx.task_name);

    let username = escape_single_quotes(&ctx.username);
    let password = escape_single_quotes(&ctx.password);
    let task_name = escape_single_quotes(&ctx.task_name);
    let encoded_command = encode_command(command);
    let task_description = escape_xml(&ctx.task_description);
    let time_limit = escape_xml(&iso8601_duration(ctx.execution_time_limit));

    let wrapper = render(
        ELEVATED_COMMAND_TEMPLATE,
        &[
            ("username", username.as_str()),
            ("password", password.as_str()),
            ("task_name", task_name.as_str()),
            ("encoded_command", encoded_command.as_str()),
            ("task_description", task_description.as_str()),
            ("task_execution_time_limit", time_limit.as_str()),
        ],
    )?;

    let file_name = format!("elevated-shell-{}.ps1", ctx.task_name);
    upload_script(comm, &file_name, &wrapper)
}

/// Compose the direct command for the payload, wrap it for elevated
/// execution, and return a top-level command that merely invokes the
/// uploaded wrapper.
pub fn create_elevated_command(
    comm: &dyn Communicator,
    ctx: &ElevationContext,
    vars: &str,
    remote_path: &str,
) -> Result<String, RunError> {
    let command = create_command(vars, remote_path)?;
    let runner_path = generate_elevated_runner(comm, ctx, &command)?;
    create_command("", &runner_path)
}
