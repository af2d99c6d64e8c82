use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use murmur_core::{PermissionLevel, Tool, ToolSchemaInfo};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone)]
struct TaskItem {
    id: usize,
    description: String,
    done: bool,
}

/// In-memory work tracker shared by a swarm's agents. Using it counts as
/// task-list activity for the engine's maintenance-reminder suppression.
pub struct TaskListTool {
    tasks: Mutex<Vec<TaskItem>>,
}

impl TaskListTool {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }
}

impl Default for TaskListTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for TaskListTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let action = input["action"]
            .as_str()
            .context("Missing required field 'action'")?;
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| anyhow::anyhow!("task list lock poisoned"))?;

        match action {
            "add" => {
                let description = input["description"]
                    .as_str()
                    .context("Action 'add' requires a 'description'")?;
                let id = tasks.len() + 1;
                tasks.push(TaskItem {
                    id,
                    description: description.to_string(),
                    done: false,
                });
                debug!(id, description, "Task added");
                Ok(json!({ "id": id, "status": "added" }))
            }
            "complete" => {
                let id = input["id"]
                    .as_u64()
                    .context("Action 'complete' requires an 'id'")? as usize;
                let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
                    bail!("No task with id {}", id);
                };
                task.done = true;
                Ok(json!({ "id": id, "status": "completed" }))
            }
            "list" => {
                let items: Vec<Value> = tasks
                    .iter()
                    .map(|t| {
                        json!({
                            "id": t.id,
                            "description": t.description,
                            "done": t.done,
                        })
                    })
                    .collect();
                Ok(json!({ "tasks": items }))
            }
            other => bail!("Unknown action '{}'. Use add, complete, or list", other),
        }
    }

    fn name(&self) -> &str {
        "task_list"
    }

    fn schema(&self) -> ToolSchemaInfo {
        ToolSchemaInfo {
            name: "task_list".to_string(),
            description: "Track work items: add tasks, complete them, list the current state"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["add", "complete", "list"],
                        "description": "What to do"
                    },
                    "description": { "type": "string", "description": "Task text (for add)" },
                    "id": { "type": "integer", "description": "Task id (for complete)" }
                },
                "required": ["action"]
            }),
        }
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::ReadOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_complete_list_cycle() {
        let tool = TaskListTool::new();

        let added = tool
            .execute(json!({"action": "add", "description": "write report"}))
            .await
            .unwrap();
        assert_eq!(added["id"], 1);

        tool.execute(json!({"action": "complete", "id": 1}))
            .await
            .unwrap();

        let listed = tool.execute(json!({"action": "list"})).await.unwrap();
        assert_eq!(listed["tasks"][0]["done"], true);
    }

    #[tokio::test]
    async fn unknown_action_fails() {
        let tool = TaskListTool::new();
        assert!(tool.execute(json!({"action": "purge"})).await.is_err());
    }

    #[tokio::test]
    async fn completing_missing_task_fails() {
        let tool = TaskListTool::new();
        let err = tool
            .execute(json!({"action": "complete", "id": 7}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No task with id 7"));
    }
}
