use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message role in conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Tool call request from LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function_name: String,
    /// Either a JSON object or a JSON-encoded string, as sent by the endpoint
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: &str, function_name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            function_name: function_name.to_string(),
            arguments,
        }
    }

    /// Normalize arguments into a JSON object.
    ///
    /// A string payload is parsed as JSON; `null` and the empty string count as
    /// "no arguments". Anything that does not end up as an object is an error.
    pub fn normalized_arguments(&self) -> Result<Map<String, Value>, String> {
        normalize_arguments(&self.arguments)
    }
}

pub(crate) fn normalize_arguments(raw: &Value) -> Result<Map<String, Value>, String> {
    match raw {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!("expected a JSON object, got {}", type_name(&other))),
            Err(e) => Err(format!("arguments are not valid JSON: {}", e)),
        },
        other => Err(format!("expected a JSON object, got {}", type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Conversation message
///
/// A `tool` message always carries the tool name and the call id it answers.
/// An `assistant` message that requests tools carries `tool_calls` and no content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, text: &str) -> Self {
        Self {
            role,
            content: Some(text.to_string()),
            tool_calls: None,
            name: None,
            tool_call_id: None,
        }
    }

    pub fn system(text: &str) -> Self {
        Self::text(Role::System, text)
    }

    pub fn user(text: &str) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: &str) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Assistant message requesting a single tool call
    pub fn assistant_tool_call(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(vec![call]),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: &str, name: &str, output: &str) -> Self {
        Self {
            role: Role::Tool,
            content: Some(output.to_string()),
            tool_calls: None,
            name: Some(name.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }
}

/// Tool schema for LLM function calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema for tool parameters
    pub input_schema: Value,
}

/// Token usage info
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Generation options sent alongside the history
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 128,
            temperature: 0.8,
            top_p: 0.9,
        }
    }
}

/// Decoded chat completion
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub message: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl ChatResponse {
    pub fn text(message: &str) -> Self {
        Self {
            message: message.to_string(),
            tool_calls: Vec::new(),
            finish_reason: Some("stop".to_string()),
            usage: None,
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            message: String::new(),
            tool_calls,
            finish_reason: Some("tool_calls".to_string()),
            usage: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Model identifier as reported by the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelListResponse {
    pub models: Vec<ModelInfo>,
}

/// Decoded endpoint payload; exactly one shape per payload
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Chat(ChatResponse),
    ModelList(ModelListResponse),
}
