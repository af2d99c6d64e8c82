use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::llm::ToolSchema;

/// How much a tool can touch. Agents carry a ceiling; tools above it are
/// refused with a corrective result instead of executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PermissionLevel {
    ReadOnly,
    Write,
    Execute,
}

/// Declared shape of a tool: name, description, JSON-Schema parameters.
#[derive(Debug, Clone)]
pub struct ToolSchemaInfo {
    pub name: String,
    pub description: String,
    /// JSON Schema with `properties` and a `required` list
    pub parameters: Value,
}

impl ToolSchemaInfo {
    pub fn required(&self) -> Vec<String> {
        self.parameters["required"]
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn optional(&self) -> Vec<String> {
        let required = self.required();
        self.parameters["properties"]
            .as_object()
            .map(|props| {
                props
                    .keys()
                    .filter(|k| !required.contains(k))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The shape the model boundary consumes.
    pub fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.parameters.clone(),
        }
    }
}

/// Async Tool trait
/// Note: Uses async_trait for trait object compatibility with DashMap storage
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute tool with input, returns result
    async fn execute(&self, input: Value) -> Result<Value>;

    /// Tool name for registration
    fn name(&self) -> &str;

    /// Parameter schema exposed to the model
    fn schema(&self) -> ToolSchemaInfo;

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::ReadOnly
    }
}

/// Registry of tools, shared across a swarm.
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|e| e.key().clone()).collect()
    }

    /// Schemas to advertise to the model. Empty filter means all tools.
    pub fn schemas(&self, filter: &[String]) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .filter(|e| filter.is_empty() || filter.contains(e.key()))
            .map(|e| e.value().schema().to_schema())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check an invocation against the tool's required parameters.
///
/// Returns the corrective message the core feeds back to the model instead
/// of failing the turn: missing names plus the full required/optional set.
pub fn missing_parameters(schema: &ToolSchemaInfo, input: &Value) -> Option<String> {
    let missing: Vec<String> = schema
        .required()
        .into_iter()
        .filter(|name| input.get(name).map(Value::is_null).unwrap_or(true))
        .collect();

    if missing.is_empty() {
        return None;
    }

    let required = schema.required().join(", ");
    let optional = schema.optional();
    let optional = if optional.is_empty() {
        "none".to_string()
    } else {
        optional.join(", ")
    };

    Some(format!(
        "Tool '{}' was called without required parameter(s): {}. \
         Required parameters: {}. Optional parameters: {}. \
         Call the tool again with all required parameters.",
        schema.name,
        missing.join(", "),
        required,
        optional
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ToolSchemaInfo {
        ToolSchemaInfo {
            name: "write_file".into(),
            description: "Write a file".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" },
                    "append": { "type": "boolean" }
                },
                "required": ["path", "content"]
            }),
        }
    }

    #[test]
    fn complete_input_passes() {
        let input = json!({"path": "a.txt", "content": "hi"});
        assert!(missing_parameters(&schema(), &input).is_none());
    }

    #[test]
    fn missing_required_lists_full_parameter_set() {
        let input = json!({"path": "a.txt"});
        let msg = missing_parameters(&schema(), &input).unwrap();
        assert!(msg.contains("content"));
        assert!(msg.contains("Required parameters: path, content"));
        assert!(msg.contains("Optional parameters: append"));
    }

    #[test]
    fn null_counts_as_missing() {
        let input = json!({"path": "a.txt", "content": null});
        assert!(missing_parameters(&schema(), &input).is_some());
    }

    #[test]
    fn schema_required_optional_split() {
        let s = schema();
        assert_eq!(s.required(), vec!["path", "content"]);
        assert_eq!(s.optional(), vec!["append"]);
    }

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        async fn execute(&self, input: Value) -> Result<Value> {
            Ok(input)
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn schema(&self) -> ToolSchemaInfo {
            ToolSchemaInfo {
                name: "echo".into(),
                description: "Echo input back".into(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            }
        }
    }

    #[test]
    fn registry_register_and_filter() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.schemas(&[]).len(), 1);
        assert_eq!(registry.schemas(&["other".to_string()]).len(), 0);
    }
}
