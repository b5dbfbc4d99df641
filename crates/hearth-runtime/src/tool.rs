use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::dispatch::ToolCallResult;
use crate::llm::ToolSchema;

/// Validation or upstream failure inside a tool.
///
/// Never crashes a turn: the dispatcher turns it into tool-message text.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid value '{value}' for '{field}', expected one of: {}", .allowed.join(", "))]
    InvalidChoice {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl ToolError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ToolError::InvalidArguments(msg.into())
    }
}

/// What a tool hands back to the conversation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Aggregated per-entity outcome
    Result(ToolCallResult),
    /// Tool-specific structured data
    Data(Value),
    /// Tool-specific scalar text
    Text(String),
}

impl ToolOutput {
    pub fn is_success(&self) -> bool {
        match self {
            ToolOutput::Result(r) => r.success,
            ToolOutput::Data(_) | ToolOutput::Text(_) => true,
        }
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOutput::Result(r) => write!(f, "{}", r),
            ToolOutput::Data(v) => write!(f, "{}", v),
            ToolOutput::Text(t) => f.write_str(t),
        }
    }
}

/// Async Tool trait
/// Note: Uses async_trait for trait object compatibility with the registry map
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name for registration
    fn name(&self) -> &str;

    /// Description and JSON parameter schema advertised to the model
    fn schema(&self) -> ToolSchema;

    /// Execute with arguments already normalized to a JSON object
    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError>;
}
