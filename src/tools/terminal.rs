//! Terminal/shell command execution tool.
//!
//! The command string is handed to the host shell as-is, without any
//! sandboxing or filtering. Only run the crew in an environment where the
//! model is allowed to execute arbitrary commands.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use super::Tool;

/// Wall-clock ceiling for a single command.
pub const SHELL_TIMEOUT_SECS: u64 = 120;

/// Exit status shells use when the executable does not exist.
const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Run a shell command.
pub struct RunCommand {
    timeout: Duration,
}

impl RunCommand {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(SHELL_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Execute `command` and describe the outcome as text.
    pub async fn run(&self, command: &str, workspace: &Path) -> String {
        tracing::info!("Executing shell command: {}", command);

        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let result = tokio::time::timeout(
            self.timeout,
            Command::new(shell)
                .arg(shell_arg)
                .arg(command)
                .current_dir(workspace)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match result {
            Err(_) => {
                tracing::warn!("Shell command timed out: {}", command);
                return format!(
                    "Command '{}' timed out after {} seconds. This is expected for server \
                     commands that run continuously. Assume the server is running and proceed.",
                    command,
                    self.timeout.as_secs()
                );
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return command_not_found();
            }
            Ok(Err(e)) => return format!("An unexpected error occurred: {}", e),
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        match output.status.code() {
            Some(0) => {
                let mut result = String::from("Command executed.\n");
                if !stdout.is_empty() {
                    result.push_str(&format!("Stdout:\n{}\n", stdout));
                }
                if !stderr.is_empty() {
                    result.push_str(&format!("Stderr:\n{}\n", stderr));
                }
                result
            }
            Some(EXIT_COMMAND_NOT_FOUND) => command_not_found(),
            code => {
                let code = code.map_or_else(|| "terminated by signal".to_string(), |c| c.to_string());
                format!(
                    "Error executing command: `{}`.\nReturn code: {}\nStdout: {}\nStderr: {}",
                    command, code, stdout, stderr
                )
            }
        }
    }
}

impl Default for RunCommand {
    fn default() -> Self {
        Self::new()
    }
}

fn command_not_found() -> String {
    "Error: Command not found. Ensure the command and its dependencies (like Node.js/npx) \
     are installed and in the system's PATH."
        .to_string()
}

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Executes a command in the shell. Crucial for starting necessary servers or running scripts. Input must be a valid shell command as a single string."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let command = args["command"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'command' argument"))?;

        Ok(self.run(command, workspace).await)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn workspace() -> tempfile::TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    #[test]
    fn default_timeout_is_two_minutes() {
        assert_eq!(RunCommand::new().timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn stdout_is_reported_and_empty_stderr_omitted() {
        let ws = workspace();
        let out = RunCommand::new().run("printf X", ws.path()).await;
        assert!(out.starts_with("Command executed.\n"));
        assert!(out.contains("Stdout:\nX"));
        assert!(!out.contains("Stderr:"));
    }

    #[tokio::test]
    async fn stderr_section_present_when_written() {
        let ws = workspace();
        let out = RunCommand::new().run("echo warn 1>&2", ws.path()).await;
        assert!(out.contains("Stderr:\nwarn"));
        assert!(!out.contains("Stdout:"));
    }

    #[tokio::test]
    async fn timeout_returns_message_instead_of_error() {
        let ws = workspace();
        let tool = RunCommand::with_timeout(Duration::from_secs(1));
        let started = Instant::now();
        let out = tool.run("sleep 30", ws.path()).await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(out.contains("timed out after 1 seconds"));
        assert!(out.contains("Assume the server is running"));
    }

    #[tokio::test]
    async fn missing_executable_is_named() {
        let ws = workspace();
        let out = RunCommand::new()
            .run("definitely-not-a-real-binary-xyz --version", ws.path())
            .await;
        assert!(out.starts_with("Error: Command not found."));
    }

    #[tokio::test]
    async fn failing_command_reports_code_and_streams() {
        let ws = workspace();
        let out = RunCommand::new()
            .run("echo partial; echo boom 1>&2; exit 3", ws.path())
            .await;
        assert!(out.contains("Return code: 3"));
        assert!(out.contains("Stdout: partial"));
        assert!(out.contains("Stderr: boom"));
    }

    #[tokio::test]
    async fn runs_inside_workspace() {
        let ws = workspace();
        std::fs::write(ws.path().join("marker.txt"), "here").unwrap();
        let out = RunCommand::new().run("cat marker.txt", ws.path()).await;
        assert!(out.contains("here"));
    }

    #[tokio::test]
    async fn missing_argument_is_an_error() {
        let ws = workspace();
        let result = RunCommand::new().execute(json!({}), ws.path()).await;
        assert!(result.is_err());
    }
}
