pub mod provider;
pub mod retry;
pub mod types;

pub use provider::ModelProvider;
pub use retry::{complete_with_retry, RetryPolicy};
pub use types::{
    Content, GenerateConfig, Message, ModelResponse, Role, StopReason, ToolCall, ToolResult,
    ToolSchema, Usage,
};
