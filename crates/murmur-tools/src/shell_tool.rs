use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use murmur_core::{PermissionLevel, Tool, ToolSchemaInfo};
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{info, warn};

use crate::workspace::Workspace;

/// Fragments refused no matter how the tool is configured.
const DENIED_FRAGMENTS: &[&str] = &[
    "rm -rf /",
    "rm -fr /",
    "mkfs",
    "dd if=",
    ":(){",
    "shutdown",
    "reboot",
    "> /dev/",
];

/// Operators that chain a second command past the allow-list check.
const CHAIN_OPERATORS: &[&str] = &[";", "&&", "||", "|", "`", "$("];

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_OUTPUT_CAP: usize = 32 * 1024;

/// Which commands the shell tool will run.
#[derive(Clone, Default)]
pub struct CommandPolicy {
    /// Extra substrings to refuse, on top of the built-in list.
    pub deny: Vec<String>,
    /// When non-empty, only these executables may run, and command
    /// chaining is refused outright.
    pub allow: Vec<String>,
}

impl CommandPolicy {
    fn check(&self, command: &str) -> Result<()> {
        let lowered = command.to_lowercase();
        for fragment in DENIED_FRAGMENTS {
            if lowered.contains(fragment) {
                bail!("refusing '{}': contains denied fragment '{}'", command, fragment);
            }
        }
        for fragment in &self.deny {
            if lowered.contains(&fragment.to_lowercase()) {
                bail!("refusing '{}': denied by policy ('{}')", command, fragment);
            }
        }
        if !self.allow.is_empty() {
            let executable = command.split_whitespace().next().unwrap_or("");
            if !self.allow.iter().any(|a| a == executable) {
                bail!(
                    "executable '{}' is not on the allow list {:?}",
                    executable,
                    self.allow
                );
            }
            for op in CHAIN_OPERATORS {
                if command.contains(op) {
                    bail!("chaining operator '{}' is refused while an allow list is active", op);
                }
            }
        }
        Ok(())
    }
}

/// Runs a shell command with its working directory pinned to the workspace
/// root. Each call carries its own timeout; output is clipped so one noisy
/// command cannot flood the conversation.
pub struct ShellTool {
    workspace: Arc<Workspace>,
    policy: CommandPolicy,
    output_cap: usize,
    dry_run: bool,
}

impl ShellTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            policy: CommandPolicy::default(),
            output_cap: DEFAULT_OUTPUT_CAP,
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: CommandPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_output_cap(mut self, bytes: usize) -> Self {
        self.output_cap = bytes;
        self
    }

    /// Validate and log commands without running anything.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    fn clip(&self, raw: &[u8]) -> String {
        let text = String::from_utf8_lossy(raw);
        if text.len() <= self.output_cap {
            return text.into_owned();
        }
        let mut cut = self.output_cap;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}\n[output clipped at {} bytes]",
            &text[..cut],
            self.output_cap
        )
    }
}

#[async_trait]
impl Tool for ShellTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let command = input["command"]
            .as_str()
            .context("missing required field 'command'")?;
        let timeout_ms = input["timeout_ms"].as_u64().unwrap_or(DEFAULT_TIMEOUT_MS);

        self.policy.check(command)?;

        if self.dry_run {
            warn!(command, "dry-run: command validated but not executed");
            return Ok(json!({
                "exit_code": 0,
                "stdout": format!("[dry-run] {}", command),
                "stderr": "",
            }));
        }

        info!(command, timeout_ms, "Running shell command");

        let running = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(self.workspace.root())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_millis(timeout_ms), running)
            .await
            .map_err(|_| anyhow!("command timed out after {} ms", timeout_ms))?
            .context("failed to spawn shell")?;

        Ok(json!({
            "exit_code": output.status.code().unwrap_or(-1),
            "stdout": self.clip(&output.stdout),
            "stderr": self.clip(&output.stderr),
        }))
    }

    fn name(&self) -> &str {
        "shell"
    }

    fn schema(&self) -> ToolSchemaInfo {
        ToolSchemaInfo {
            name: "shell".to_string(),
            description: "Run a shell command in the workspace directory".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Shell command to run; the working directory is the workspace root"
                    },
                    "timeout_ms": {
                        "type": "integer",
                        "description": "Kill the command after this many milliseconds (default 30000)"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Execute
    }
}
