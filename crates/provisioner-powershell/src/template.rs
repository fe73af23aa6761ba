//! Script templates, compiled-once placeholder rendering, and the command
//! composer.
//!
//! Templates are immutable `const` strings; `${name}` placeholders are
//! substituted at render time. Runtime placeholders of the generated wrapper
//! (`{username}`, `{arguments}`) use bare braces and are left for the wrapper
//! itself to fill in on the remote host.

use crate::error::RunError;
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-z_]+)\}").expect("constant regex pattern is valid"));

/// One line that silences interactive progress UI, evaluates the variables
/// prelude (possibly empty), invokes the uploaded script, and propagates its
/// last exit code as the process exit code.
pub const EXECUTE_COMMAND_TEMPLATE: &str = r#"& { if (Test-Path variable:global:ProgressPreference){$ProgressPreference='SilentlyContinue'};${vars};&"${path}";exit $LastExitCode }"#;

/// Self-elevating wrapper script. Runs without special privileges and uses
/// the local task scheduler to execute an encoded command under the supplied
/// identity: register a one-shot task, start it, poll it out of the queued
/// state, tail its stdout log monotonically until it reports ready, recover
/// `LastTaskResult` as the payload's exit code, and clean up.
///
/// The encoded command runs under `cmd /C powershell -EncodedCommand`, so
/// `LastTaskResult` is the payload's own exit code, never the wrapper's.
pub const ELEVATED_COMMAND_TEMPLATE: &str = r#"
function Get-TempFilePath($fileName) {
  $path = $env:TEMP
  if (!$path) {
    $path = 'c:\windows\Temp\'
  }
  return Join-Path -Path $path -ChildPath $fileName
}

function Read-NewOutputLines($outFile, $currentLine) {
  if (Test-Path $outFile) {
    get-content $outFile | select -skip $currentLine | %{
      $currentLine += 1
      Write-Host "$_"
    }
  }
  return $currentLine
}

function Get-SanitizedFileName($fileName) {
  return $fileName.Replace(' ', '_').Replace('&', 'and').Replace('{', '(').Replace('}', ')').Replace('~', '-').Replace('#', '').Replace('%', '')
}

function Invoke-AsScheduledTask($username, $password, $taskName, $encodedCommand)
{
  $stdoutFile = Get-TempFilePath("$(Get-SanitizedFileName($taskName))_stdout.log")
  if (Test-Path $stdoutFile) {
    Remove-Item $stdoutFile | Out-Null
  }
  $taskXml = @'
<?xml version="1.0" encoding="UTF-16"?>
<Task version="1.2" xmlns="http://schemas.microsoft.com/windows/2004/02/mit/task">
    <RegistrationInfo>
        <Description>${task_description}</Description>
    </RegistrationInfo>
    <Principals>
        <Principal id="Author">
        <UserId>{username}</UserId>
        <LogonType>Password</LogonType>
        <RunLevel>HighestAvailable</RunLevel>
        </Principal>
    </Principals>
    <Settings>
        <MultipleInstancesPolicy>IgnoreNew</MultipleInstancesPolicy>
        <DisallowStartIfOnBatteries>false</DisallowStartIfOnBatteries>
        <StopIfGoingOnBatteries>false</StopIfGoingOnBatteries>
        <AllowHardTerminate>true</AllowHardTerminate>
        <StartWhenAvailable>false</StartWhenAvailable>
        <RunOnlyIfNetworkAvailable>false</RunOnlyIfNetworkAvailable>
        <IdleSettings>
        <StopOnIdleEnd>false</StopOnIdleEnd>
        <RestartOnIdle>false</RestartOnIdle>
        </IdleSettings>
        <AllowStartOnDemand>true</AllowStartOnDemand>
        <Enabled>true</Enabled>
        <Hidden>false</Hidden>
        <RunOnlyIfIdle>false</RunOnlyIfIdle>
        <WakeToRun>false</WakeToRun>
        <ExecutionTimeLimit>${task_execution_time_limit}</ExecutionTimeLimit>
        <Priority>4</Priority>
    </Settings>
    <Actions Context="Author">
        <Exec>
        <Command>cmd</Command>
        <Arguments>{arguments}</Arguments>
        </Exec>
    </Actions>
</Task>
'@
  $arguments = '/C powershell.exe -NoProfile -ExecutionPolicy Bypass -EncodedCommand ' + $encodedCommand + ' *> "' + $stdoutFile + '"'
  $taskXml = $taskXml.Replace('{arguments}', $arguments.Replace('&', '&amp;').Replace('<', '&lt;').Replace('>', '&gt;').Replace('"', '&quot;').Replace('''', '&apos;'))
  $taskXml = $taskXml.Replace('{username}', $username.Replace('&', '&amp;').Replace('<', '&lt;').Replace('>', '&gt;').Replace('"', '&quot;').Replace('''', '&apos;'))

  $schedule = New-Object -ComObject 'Schedule.Service'
  $schedule.Connect()
  $task = $schedule.NewTask($null)
  $task.XmlText = $taskXml
  $folder = $schedule.GetFolder('\')
  $exitCode = -1
  try {
    $folder.RegisterTaskDefinition($taskName, $task, 6, $username, $password, 1, $null) | Out-Null
    $registeredTask = $folder.GetTask("\$taskName")
    $registeredTask.Run($null) | Out-Null
    $timeout = 10
    $sec = 0
    while ((!($registeredTask.state -eq 4)) -and ($sec -lt $timeout)) {
      Start-Sleep -s 1
      $sec++
    }
    $stdoutCurrentLine = 0
    do {
      Start-Sleep -m 100
      $stdoutCurrentLine = Read-NewOutputLines $stdoutFile $stdoutCurrentLine
    } while (!($registeredTask.state -eq 3))
    Start-Sleep -m 100
    $exitCode = $registeredTask.LastTaskResult
    $stdoutCurrentLine = Read-NewOutputLines $stdoutFile $stdoutCurrentLine
  } finally {
    if (Test-Path $stdoutFile) {
      Remove-Item $stdoutFile | Out-Null
    }
    try {
      $folder.DeleteTask($taskName, 0)
    } catch { }
    [System.Runtime.Interopservices.Marshal]::ReleaseComObject($schedule) | Out-Null
  }
  return $exitCode
}

$username = '${username}'.Replace('\.\\', $env:computername+'\')
$password = '${password}'
$taskName = '${task_name}'
$encodedCommand = '${encoded_command}'
$exitCode = Invoke-AsScheduledTask -username $username -password $password -taskName $taskName -encodedCommand $encodedCommand
exit $exitCode
"#;

/// Substitute `${name}` placeholders in a template. A placeholder with no
/// matching value fails the render; values are never rescanned.
pub fn render(template: &str, values: &[(&str, &str)]) -> Result<String, RunError> {
    let mut missing: Option<String> = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => (*value).to_string(),
            None => {
                missing = Some(name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(RunError::TemplateRender(format!(
            "no value for placeholder '{name}'"
        ))),
        None => Ok(rendered.into_owned()),
    }
}

/// Compose the single line that sources the variables prelude and invokes
/// the script at `remote_path`. Tolerates an empty prelude.
pub fn create_command(vars: &str, remote_path: &str) -> Result<String, RunError> {
    render(
        EXECUTE_COMMAND_TEMPLATE,
        &[("vars", vars), ("path", remote_path)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composed_command_matches_expected_line() {
        let command = create_command("$env:FOO='bar'", r"%TEMP%\shell-abc.ps1").unwrap();
        assert_eq!(
            command,
            r#"& { if (Test-Path variable:global:ProgressPreference){$ProgressPreference='SilentlyContinue'};$env:FOO='bar';&"%TEMP%\shell-abc.ps1";exit $LastExitCode }"#
        );
    }

    #[test]
    fn composed_command_tolerates_empty_prelude() {
        let command = create_command("", r"C:\Windows\Temp\Test.ps1").unwrap();
        assert!(command.contains(r#";;&"C:\Windows\Temp\Test.ps1";"#));
        assert!(command.ends_with("exit $LastExitCode }"));
    }

    #[test]
    fn render_rejects_unknown_placeholder() {
        let err = render("run ${nope} now", &[("vars", "x")]).unwrap_err();
        match err {
            RunError::TemplateRender(msg) => assert!(msg.contains("nope")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn render_does_not_rescan_substituted_values() {
        // A value containing placeholder syntax must land verbatim.
        let out = render("a ${vars} z", &[("vars", "${path}")]).unwrap();
        assert_eq!(out, "a ${path} z");
    }

    #[test]
    fn elevated_template_has_only_known_placeholders() {
        let values = [
            ("username", "u"),
            ("password", "p"),
            ("task_name", "t"),
            ("encoded_command", "e"),
            ("task_description", "d"),
            ("task_execution_time_limit", "PT2H"),
        ];
        let rendered = render(ELEVATED_COMMAND_TEMPLATE, &values).unwrap();
        assert!(!rendered.contains("${"));
        // Runtime placeholders stay behind for the wrapper itself.
        assert!(rendered.contains("{username}"));
        assert!(rendered.contains("{arguments}"));
    }
}
