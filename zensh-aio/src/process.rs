// zensh-aio/src/process.rs
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use tracing::{debug, error};
use zensh_common::error::{Result, ZenshError};

/// Runs an external command to completion and captures its output.
///
/// A non-zero exit is not an error here; callers inspect `status`.
pub fn run_command(
    command: &str,
    args: &[&str],
    cwd: Option<&Path>,
    envs: Option<&HashMap<String, String>>,
) -> Result<Output> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        command,
        args,
        cwd,
        envs.map(|e| e.keys().collect::<Vec<_>>())
    );
    let mut cmd = Command::new(command);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.envs(env_map);
    }
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    match cmd.output() {
        Ok(output) => {
            if !output.status.success() {
                debug!("Command failed with status: {}", output.status);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) => {
            error!("Failed to execute command {}: {}", command, e);
            Err(ZenshError::Io(Arc::new(e)))
        }
    }
}

/// Like [`run_command`], but a non-zero exit becomes `CommandExecError`
/// carrying the first line of stderr (or of stdout when stderr is empty).
pub fn run_checked(
    command: &str,
    args: &[&str],
    cwd: Option<&Path>,
    envs: Option<&HashMap<String, String>>,
) -> Result<Output> {
    let output = run_command(command, args, cwd, envs)?;
    if output.status.success() {
        return Ok(output);
    }
    // Some tools report failures on stdout only.
    let message = if output.stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        String::from_utf8_lossy(&output.stderr)
    };
    let first_line = message.lines().map(str::trim).find(|l| !l.is_empty());
    Err(ZenshError::CommandExecError(match first_line {
        Some(line) => format!("{} {}: {}", command, args.join(" "), line),
        None => format!("{} {}: {}", command, args.join(" "), output.status),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let out = run_command("sh", &["-c", "echo hello"], None, None).unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
    }

    #[test]
    fn passes_environment_and_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let mut envs = HashMap::new();
        envs.insert("ZENSH_TEST_VALUE".to_string(), "42".to_string());
        let out = run_command(
            "sh",
            &["-c", "printf '%s' \"$ZENSH_TEST_VALUE\"; pwd >&2"],
            Some(tmp.path()),
            Some(&envs),
        )
        .unwrap();
        assert_eq!(out.stdout, b"42");
        assert!(!out.stderr.is_empty());
    }

    #[test]
    fn checked_failure_reports_first_stderr_line() {
        let err = run_checked("sh", &["-c", "echo first >&2; echo second >&2; exit 3"], None, None)
            .unwrap_err();
        match err {
            ZenshError::CommandExecError(msg) => {
                assert!(msg.ends_with(": first"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_io_error() {
        let res = run_command("zensh-definitely-not-a-program", &[], None, None);
        assert!(matches!(res, Err(ZenshError::Io(_))));
    }
}
