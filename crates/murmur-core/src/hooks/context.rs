use std::collections::HashMap;

use serde_json::Value;

use crate::llm::{ToolCall, ToolResult};

use super::events::HookEvent;

/// Mutable record handed to every hook in one chain execution.
///
/// Created fresh per event firing and discarded afterwards. `metadata` is
/// the only field hooks are expected to mutate to pass state to later hooks
/// in the same chain.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub event: HookEvent,
    pub agent_name: String,
    pub tool_call: Option<ToolCall>,
    pub tool_result: Option<ToolResult>,
    pub delegation_target: Option<String>,
    pub delegation_result: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl HookContext {
    pub fn new(event: HookEvent, agent_name: &str) -> Self {
        Self {
            event,
            agent_name: agent_name.to_string(),
            tool_call: None,
            tool_result: None,
            delegation_target: None,
            delegation_result: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_call = Some(call);
        self
    }

    pub fn with_tool_result(mut self, result: ToolResult) -> Self {
        self.tool_result = Some(result);
        self
    }

    pub fn with_delegation_target(mut self, target: &str) -> Self {
        self.delegation_target = Some(target.to_string());
        self
    }

    pub fn with_delegation_result(mut self, result: &str) -> Self {
        self.delegation_result = Some(result.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// The tool name matchers filter on, when this context carries one.
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_call
            .as_ref()
            .map(|c| c.name.as_str())
            .or_else(|| self.tool_result.as_ref().map(|r| r.tool_name.as_str()))
            .or(self.delegation_target.as_deref())
    }
}
