use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role in conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Content within a message - text, tool call, or tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    /// Mixed content blocks (assistant can return text + tool calls)
    Mixed {
        parts: Vec<Content>,
    },
}

/// A requested tool invocation. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub parameters: Value,
}

/// Outcome of one tool invocation, fed back into the conversation and
/// into `post_tool_use` hooks. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: Some(content.into()),
            success: true,
            error: None,
        }
    }

    pub fn err(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: None,
            success: false,
            error: Some(error.into()),
        }
    }

    /// The text the model sees: content on success, error otherwise.
    pub fn text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("")
    }
}

/// Conversation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn system(text: &str) -> Self {
        Self {
            role: Role::System,
            content: Content::Text {
                text: text.to_string(),
            },
        }
    }

    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            content: Content::Text {
                text: text.to_string(),
            },
        }
    }

    pub fn assistant(content: Content) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn assistant_text(text: &str) -> Self {
        Self::assistant(Content::Text {
            text: text.to_string(),
        })
    }

    /// Tool results ride back as user-role messages (what providers expect).
    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            role: Role::User,
            content: Content::ToolResult(result),
        }
    }
}

/// Tool schema for model function calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema for tool parameters
    pub input_schema: Value,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// Token usage info
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// One model completion: either a final answer or tool-call requests.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: Content,
    pub stop_reason: StopReason,
    pub usage: Usage,
    pub model: String,
}

/// Config for one completion request
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: Option<String>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 4096,
            temperature: 0.7,
            system_prompt: None,
        }
    }
}

impl Content {
    /// Extract all tool calls from content
    pub fn extract_tool_calls(&self) -> Vec<&ToolCall> {
        match self {
            Content::ToolCall(tc) => vec![tc],
            Content::Mixed { parts } => parts
                .iter()
                .filter_map(|p| match p {
                    Content::ToolCall(tc) => Some(tc),
                    _ => None,
                })
                .collect(),
            _ => vec![],
        }
    }

    /// Extract text from content
    pub fn extract_text(&self) -> String {
        match self {
            Content::Text { text } => text.clone(),
            Content::Mixed { parts } => parts
                .iter()
                .filter_map(|p| match p {
                    Content::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_tool_calls_from_mixed_content() {
        let content = Content::Mixed {
            parts: vec![
                Content::Text {
                    text: "Let me check.".into(),
                },
                Content::ToolCall(ToolCall {
                    id: "tc1".into(),
                    name: "read_file".into(),
                    parameters: json!({"path": "a.txt"}),
                }),
                Content::ToolCall(ToolCall {
                    id: "tc2".into(),
                    name: "shell".into(),
                    parameters: json!({"cmd": "ls"}),
                }),
            ],
        };

        let calls = content.extract_tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(content.extract_text(), "Let me check.");
    }

    #[test]
    fn tool_result_text_prefers_content_then_error() {
        let call = ToolCall {
            id: "tc1".into(),
            name: "shell".into(),
            parameters: json!({}),
        };
        assert_eq!(ToolResult::ok(&call, "out").text(), "out");
        assert_eq!(ToolResult::err(&call, "bad").text(), "bad");
        assert!(!ToolResult::err(&call, "bad").success);
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total += Usage {
            input_tokens: 10,
            output_tokens: 5,
        };
        total += Usage {
            input_tokens: 3,
            output_tokens: 2,
        };
        assert_eq!(total.total(), 20);
    }
}
