pub mod read_file_tool;
pub mod shell_tool;
pub mod task_list_tool;
pub mod workspace;
pub mod write_file_tool;

pub use read_file_tool::ReadFileTool;
pub use shell_tool::{CommandPolicy, ShellTool};
pub use task_list_tool::TaskListTool;
pub use workspace::Workspace;
pub use write_file_tool::WriteFileTool;

use anyhow::Result;
use murmur_core::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;

/// Register the full built-in set (shell, read/write file, task list)
/// confined to one workspace root.
pub fn register_builtin_tools(
    registry: &ToolRegistry,
    root: PathBuf,
    max_file_bytes: u64,
    policy: CommandPolicy,
) -> Result<()> {
    let workspace = Arc::new(Workspace::new(root, max_file_bytes)?);
    registry.register(Arc::new(ShellTool::new(workspace.clone()).with_policy(policy)));
    registry.register(Arc::new(ReadFileTool::new(workspace.clone())));
    registry.register(Arc::new(WriteFileTool::new(workspace)));
    registry.register(Arc::new(TaskListTool::new()));
    Ok(())
}
