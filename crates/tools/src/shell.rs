//! Shell tools: run allowlisted commands without a shell.
//!
//! The command string is tokenized and checked by [`CommandPolicy`]; the
//! program is spawned directly so shell metacharacters have no effect.

use async_trait::async_trait;
use memloop_core::error::ToolError;
use memloop_core::tool::{Tool, ToolOutput};
use memloop_security::{CommandPolicy, CommandRejected};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Per-stream capture limit. A command that writes more is killed.
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

struct Finished {
    stdout: Captured,
    stderr: Captured,
    status: ExitStatus,
}

async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Captured> {
    let mut bytes = Vec::new();
    if let Some(reader) = reader {
        let mut limited = reader.take(MAX_OUTPUT_BYTES as u64 + 1);
        limited.read_to_end(&mut bytes).await?;
    }
    let truncated = bytes.len() > MAX_OUTPUT_BYTES;
    bytes.truncate(MAX_OUTPUT_BYTES);
    Ok(Captured { bytes, truncated })
}

/// Drain both pipes under the capture limit, then reap the child.
async fn collect(child: &mut Child) -> std::io::Result<Finished> {
    let stdout = read_capped(child.stdout.take());
    let stderr = read_capped(child.stderr.take());
    tokio::pin!(stdout, stderr);

    let mut out = None;
    let mut err = None;
    while out.is_none() || err.is_none() {
        let captured = tokio::select! {
            r = &mut stdout, if out.is_none() => out.insert(r?),
            r = &mut stderr, if err.is_none() => err.insert(r?),
        };
        // The other pipe only reaches EOF once the process is gone.
        if captured.truncated {
            let _ = child.start_kill();
        }
    }

    let status = child.wait().await?;
    Ok(Finished {
        stdout: out.unwrap_or_default(),
        stderr: err.unwrap_or_default(),
        status,
    })
}

/// Execute an allowlisted command and report its output.
pub struct ExecuteCommandTool {
    policy: CommandPolicy,
}

impl ExecuteCommandTool {
    pub fn new(policy: CommandPolicy) -> Self {
        Self { policy }
    }

    fn format_output(stdout: &str, stderr: &str, exit_code: Option<i32>) -> String {
        let mut sections = Vec::new();
        if !stdout.trim().is_empty() {
            sections.push("STDOUT:".to_string());
            sections.push(stdout.trim().to_string());
        }
        if !stderr.trim().is_empty() {
            sections.push("STDERR:".to_string());
            sections.push(stderr.trim().to_string());
        }
        match exit_code {
            Some(0) => {}
            Some(code) => sections.push(format!("Exit code: {code}")),
            None => sections.push("Exit code: terminated by signal".to_string()),
        }

        if sections.is_empty() {
            "Command completed with no output.".into()
        } else {
            sections.join("\n")
        }
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Only pre-approved commands may run; \
         use list_allowed_commands to see them."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command line to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Maximum execution time in seconds (default: 30)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let command = input["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;
        let timeout_secs = input["timeout"].as_u64().unwrap_or(DEFAULT_TIMEOUT_SECS);

        let argv = match self.policy.check(command) {
            Ok(argv) => argv,
            Err(CommandRejected::NotAllowed { .. }) => {
                let allowed: Vec<&str> = self.policy.allowed().collect();
                return Ok(ToolOutput::error(format!(
                    "Error: Command '{command}' not allowed. Allowed commands are: {}",
                    allowed.join(", ")
                )));
            }
            Err(e) => return Ok(ToolOutput::error(format!("Error: {e}"))),
        };

        debug!(command = %command, timeout_secs, "Executing command");

        let mut child = match Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return Ok(ToolOutput::error(format!("Error executing command: {e}"))),
        };

        match tokio::time::timeout(Duration::from_secs(timeout_secs), collect(&mut child)).await {
            Err(_) => {
                warn!(command = %command, timeout_secs, "Command timed out");
                Ok(ToolOutput::error(format!(
                    "Error: Command timed out after {timeout_secs} seconds"
                )))
            }
            Ok(Err(e)) => Ok(ToolOutput::error(format!("Error executing command: {e}"))),
            Ok(Ok(finished)) => {
                let truncated = finished.stdout.truncated || finished.stderr.truncated;
                let stdout = String::from_utf8_lossy(&finished.stdout.bytes);
                let stderr = String::from_utf8_lossy(&finished.stderr.bytes);
                let code = finished.status.code();
                if code != Some(0) {
                    warn!(command = %command, exit_code = ?code, truncated, "Command failed");
                }
                let mut text = Self::format_output(&stdout, &stderr, code);
                if truncated {
                    text.push_str(&format!(
                        "\n[Output exceeded {MAX_OUTPUT_BYTES} bytes; command was stopped]"
                    ));
                }
                Ok(if finished.status.success() && !truncated {
                    ToolOutput::success(text)
                } else {
                    ToolOutput::error(text)
                })
            }
        }
    }
}

/// List what `execute_command` will accept.
pub struct ListAllowedCommandsTool {
    policy: CommandPolicy,
}

impl ListAllowedCommandsTool {
    pub fn new(policy: CommandPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ListAllowedCommandsTool {
    fn name(&self) -> &str {
        "list_allowed_commands"
    }

    fn description(&self) -> &str {
        "List all allowed commands."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn cacheable(&self) -> bool {
        true
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::success(
            self.policy.allowed().collect::<Vec<_>>().join("\n"),
        ))
    }
}
