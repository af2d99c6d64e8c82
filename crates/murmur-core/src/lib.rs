pub mod admission;
pub mod agent;
pub mod error;
pub mod hooks;
pub mod llm;
pub mod swarm;
pub mod tool;

pub use admission::{AdmissionController, AdmissionTicket};
pub use agent::{AgentCore, AgentDefinition, Conversation, TurnOutcome, DELEGATE_PREFIX};
pub use error::MurmurError;
pub use hooks::{
    FnHook, HookCallable, HookContext, HookDefinition, HookEvent, HookExecutor, HookHandler,
    HookRegistry, HookResult,
};
pub use llm::{
    Content, GenerateConfig, Message, ModelProvider, ModelResponse, RetryPolicy, Role, StopReason,
    ToolCall, ToolResult, ToolSchema, Usage,
};
pub use swarm::{Swarm, SwarmBuilder};
pub use tool::{PermissionLevel, Tool, ToolRegistry, ToolSchemaInfo};

/// Initialize structured JSON logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
