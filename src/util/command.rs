use crate::error::{Error, Result};
use std::io;
use std::process::{Command, Output};
use tracing::debug;

/// Run `cmd` to completion and return its stdout. A spawn failure (tool not
/// installed, not executable) or a non-zero exit is `ToolInvocationFailed`;
/// the latter carries the exit status and trimmed stderr.
pub fn run(tool: &str, cmd: &mut Command) -> Result<Vec<u8>> {
    debug!(tool, "spawning");
    check_output(tool, cmd.output())
}

pub fn check_output(tool: &str, result: io::Result<Output>) -> Result<Vec<u8>> {
    let out = result.map_err(|e| Error::tool(tool, e.to_string()))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(Error::tool(tool, format!("{}: {}", out.status, stderr.trim())));
    }
    Ok(out.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(code: i32, stdout: &[u8], stderr: &[u8]) -> io::Result<Output> {
        Ok(Output {
            // Wait status: exit code in the high byte.
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
        })
    }

    #[test]
    fn success_returns_stdout() {
        assert_eq!(check_output("df", output(0, b"rows\n", b"")).unwrap(), b"rows\n");
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let err = check_output("df", output(1, b"partial\n", b"df: /x: No such file or directory\n")).unwrap_err();
        match err {
            Error::ToolInvocationFailed { tool, reason } => {
                assert_eq!(tool, "df");
                assert!(reason.contains("exit status: 1"), "{reason}");
                assert!(reason.ends_with("df: /x: No such file or directory"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn spawn_error_is_tool_failure() {
        let err = check_output("lsblk", Err(io::Error::new(io::ErrorKind::NotFound, "not found"))).unwrap_err();
        assert!(matches!(err, Error::ToolInvocationFailed { ref tool, .. } if tool == "lsblk"));
    }

    #[test]
    fn missing_program_is_tool_failure() {
        let err = run("usbvol-no-such-tool", &mut Command::new("usbvol-no-such-tool")).unwrap_err();
        assert!(matches!(err, Error::ToolInvocationFailed { .. }));
    }

    #[test]
    fn failing_program_reports_its_stderr() {
        let err = run("sh", Command::new("sh").args(["-c", "echo boom >&2; exit 3"])).unwrap_err();
        match err {
            Error::ToolInvocationFailed { reason, .. } => assert!(reason.ends_with("boom"), "{reason}"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
