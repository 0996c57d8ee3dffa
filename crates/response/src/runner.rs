//! External tool invocation.

use std::process::Command;

use crate::errors::{ResponseError, ResponseResult};

/// Runs a system tool to completion and returns its stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> ResponseResult<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> ResponseResult<String> {
        tracing::debug!(program, ?args, "running system tool");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => ResponseError::ToolNotFound(program.to_string()),
                _ => ResponseError::execution(program, format!("spawn failed: {err}")),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if !stderr.is_empty() {
            stderr
        } else if !stdout.is_empty() {
            stdout
        } else {
            format!("command exited with status {}", output.status)
        };
        Err(ResponseError::execution(program, detail))
    }
}

/// Convenience for building owned argument lists.
pub(crate) fn args<const N: usize>(values: [&str; N]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn success_returns_trimmed_stdout() {
        let out = SystemCommandRunner
            .run("sh", &args(["-c", "echo ready"]))
            .expect("sh runs");
        assert_eq!(out, "ready");
    }

    #[test]
    fn failure_prefers_stderr_detail() {
        let err = SystemCommandRunner
            .run("sh", &args(["-c", "echo out; echo boom >&2; exit 3"]))
            .expect_err("non-zero exit");
        match err {
            ResponseError::ExecutionFailure { tool, detail } => {
                assert_eq!(tool, "sh");
                assert_eq!(detail, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_binary_is_tool_not_found() {
        let err = SystemCommandRunner
            .run("/nonexistent/iocguard-tool", &[])
            .expect_err("spawn fails");
        assert!(
            matches!(&err, ResponseError::ToolNotFound(tool) if tool == "/nonexistent/iocguard-tool"),
            "{err}"
        );
    }
}
