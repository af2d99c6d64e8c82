use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use murmur_core::{PermissionLevel, Tool, ToolSchemaInfo};
use serde_json::{json, Value};

use crate::workspace::Workspace;

/// How many leading bytes are sniffed for a NUL before treating a file as
/// binary.
const BINARY_SNIFF_BYTES: usize = 4096;

/// Reads a UTF-8 file from the workspace, optionally windowed by line.
///
/// `start_line` is 1-based; `max_lines = 0` means "to the end". The result
/// is the raw text, with a trailing marker when the window clipped it.
pub struct ReadFileTool {
    workspace: Arc<Workspace>,
}

impl ReadFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let supplied = input["path"]
            .as_str()
            .context("missing required field 'path'")?;
        let start_line = input["start_line"].as_u64().unwrap_or(1).max(1) as usize;
        let max_lines = input["max_lines"].as_u64().unwrap_or(0) as usize;

        let path = self.workspace.resolve(supplied)?;
        if !path.is_file() {
            bail!("no such file in the workspace: {}", supplied);
        }
        self.workspace.check_readable(&path).await?;

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read '{}'", supplied))?;
        let sniff = bytes.len().min(BINARY_SNIFF_BYTES);
        if bytes[..sniff].contains(&0) {
            bail!("refusing to read binary file: {}", supplied);
        }
        let text = String::from_utf8(bytes)
            .with_context(|| format!("'{}' is not valid UTF-8", supplied))?;

        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();
        let first = (start_line - 1).min(total);
        let last = if max_lines == 0 {
            total
        } else {
            (first + max_lines).min(total)
        };

        if first >= last && total > 0 {
            return Ok(Value::String(format!(
                "[window: start_line {} is past the end of the file ({} lines)]",
                start_line, total
            )));
        }
        let mut body = lines[first..last].join("\n");
        if first > 0 || last < total {
            body.push_str(&format!(
                "\n[window: lines {}-{} of {}]",
                first + 1,
                last,
                total
            ));
        }
        Ok(Value::String(body))
    }

    fn name(&self) -> &str {
        "read_file"
    }

    fn schema(&self) -> ToolSchemaInfo {
        ToolSchemaInfo {
            name: "read_file".to_string(),
            description: "Read a UTF-8 file from the workspace, optionally a line window"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the workspace root" },
                    "start_line": { "type": "integer", "description": "First line to return, 1-based (default 1)" },
                    "max_lines": { "type": "integer", "description": "Line count to return; 0 reads to the end" }
                },
                "required": ["path"]
            }),
        }
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::ReadOnly
    }
}
