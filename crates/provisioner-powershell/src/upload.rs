use crate::error::RunError;
use provisioner_core::Communicator;
use std::io::Write;
use tracing::debug;

/// Materialize a command body as a remote file and return its canonical
/// remote path. The body is staged in a local scratch file so the transport
/// sees a stable byte stream; the scratch file is removed on every exit path
/// when the handle drops. Any local IO or transport failure aborts before a
/// remote command could run.
pub fn upload_script(
    comm: &dyn Communicator,
    file_name: &str,
    command: &str,
) -> Result<String, RunError> {
    let mut scratch = tempfile::NamedTempFile::new()
        .map_err(|e| RunError::Upload(format!("failed to prepare shell script: {e}")))?;
    scratch
        .write_all(command.as_bytes())
        .and_then(|()| scratch.flush())
        .map_err(|e| RunError::Upload(format!("failed to prepare shell script: {e}")))?;

    let mut reader = scratch
        .reopen()
        .map_err(|e| RunError::Upload(format!("failed to open shell script: {e}")))?;

    let remote_path = format!(r"%TEMP%\{file_name}");
    debug!(
        "uploading shell script to [{}] from [{}]",
        remote_path,
        scratch.path().display()
    );
    comm.upload(&remote_path, &mut reader)
        .map_err(|e| RunError::Upload(format!("failed to upload shell script: {e}")))?;

    Ok(remote_path)
}
