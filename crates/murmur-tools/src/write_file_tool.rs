use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use murmur_core::{PermissionLevel, Tool, ToolSchemaInfo};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::workspace::Workspace;

/// Writes a file inside the workspace.
///
/// The default mode replaces the whole file atomically (temp file in the
/// same directory, then rename), so a crashed write never leaves a partial
/// file behind. `append: true` switches to appending in place.
pub struct WriteFileTool {
    workspace: Arc<Workspace>,
}

impl WriteFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let supplied = input["path"]
            .as_str()
            .context("missing required field 'path'")?;
        let content = input["content"]
            .as_str()
            .context("missing required field 'content'")?;
        let append = input["append"].as_bool().unwrap_or(false);

        let path = self.workspace.resolve(supplied)?;
        let created = !path.exists();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create directory '{}'", parent.display()))?;
        }

        if append {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .with_context(|| format!("cannot open '{}' for append", supplied))?;
            file.write_all(content.as_bytes())
                .await
                .with_context(|| format!("failed to append to '{}'", supplied))?;
            file.flush().await?;
        } else {
            let dir = path.parent().unwrap_or_else(|| self.workspace.root());
            let mut staged = tempfile::NamedTempFile::new_in(dir)
                .context("cannot stage temp file for atomic write")?;
            staged.write_all(content.as_bytes())?;
            staged.flush()?;
            staged
                .persist(&path)
                .with_context(|| format!("failed to replace '{}'", supplied))?;
        }

        Ok(json!({
            "path": supplied,
            "bytes": content.len(),
            "mode": if append { "append" } else { "replace" },
            "created": created,
        }))
    }

    fn name(&self) -> &str {
        "write_file"
    }

    fn schema(&self) -> ToolSchemaInfo {
        ToolSchemaInfo {
            name: "write_file".to_string(),
            description: "Write or append to a file inside the workspace".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the workspace root" },
                    "content": { "type": "string", "description": "Text to write" },
                    "append": { "type": "boolean", "description": "Append instead of replacing (default false)" }
                },
                "required": ["path", "content"]
            }),
        }
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Write
    }
}
