use anyhow::Result;
use async_trait::async_trait;

use super::types::{GenerateConfig, Message, ModelResponse, ToolSchema};

/// The narrow model-call boundary. The engine is agnostic to the transport
/// behind it; vendor HTTP clients live outside this crate and implement
/// this trait.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Submit a conversation, receive either a final message or tool-call
    /// requests.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        config: &GenerateConfig,
    ) -> Result<ModelResponse>;

    /// Provider model name for logging/tracking
    fn model_name(&self) -> &str;
}
