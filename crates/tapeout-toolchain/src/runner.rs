//! Bounded-time tool process execution.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tapeout_core::ToolchainError;
use tokio::process::Command;
use tracing::debug;

use crate::command::ToolCommand;

/// Captured result of one tool process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub tool: String,

    /// Exit code; -1 when the process was killed by a signal.
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub success: bool,
}

impl ToolOutput {
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Stdout followed by stderr; some tools report results on either.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    fn stderr_tail(&self) -> String {
        let lines: Vec<&str> = self.stderr.lines().rev().take(5).collect();
        lines.into_iter().rev().collect::<Vec<_>>().join("\n")
    }
}

pub struct ToolRunner;

impl ToolRunner {
    /// Run `command` to completion. A non-zero exit is returned as output,
    /// not as an error.
    pub async fn execute(command: &ToolCommand) -> Result<ToolOutput, ToolchainError> {
        let start = Instant::now();

        let Some((exe, args)) = command.command.split_first() else {
            return Err(ToolchainError::invocation(&command.name, "empty command"));
        };

        let mut cmd = Command::new(exe);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        debug!(tool = %command.name, command = ?command.command, "spawning tool");
        let child = cmd.spawn().map_err(|e| {
            ToolchainError::invocation(&command.name, format!("failed to spawn {}: {}", exe, e))
        })?;

        let output = if command.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(command.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| ToolchainError::Timeout {
                operation: command.name.clone(),
                after_secs: command.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        }
        .map_err(|e| ToolchainError::invocation(&command.name, e.to_string()))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let result = ToolOutput {
            tool: command.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
        };
        debug!(
            tool = %command.name,
            exit_code = result.exit_code,
            duration_ms = duration_ms,
            "tool finished"
        );
        Ok(result)
    }

    /// Like [`ToolRunner::execute`], but a non-zero exit is an `Invocation` error.
    pub async fn execute_checked(command: &ToolCommand) -> Result<ToolOutput, ToolchainError> {
        let output = Self::execute(command).await?;
        if output.passed() {
            return Ok(output);
        }
        Err(ToolchainError::invocation(
            &command.name,
            format!("exit code {}: {}", output.exit_code, output.stderr_tail()),
        ))
    }
}
