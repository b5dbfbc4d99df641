use async_trait::async_trait;
use hearth_runtime::{Tool, ToolError, ToolOutput, ToolSchema};
use serde_json::{json, Map, Value};

/// Reports the configured household member the assistant is talking to
pub struct CurrentUserTool {
    user: String,
}

impl CurrentUserTool {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.trim().to_string(),
        }
    }
}

#[async_trait]
impl Tool for CurrentUserTool {
    fn name(&self) -> &str {
        "hass_get_current_user"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hass_get_current_user".to_string(),
            description: "Get the name of the current user.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(&self, _args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        if self.user.is_empty() {
            return Ok(ToolOutput::Text("The current user is unknown.".to_string()));
        }
        Ok(ToolOutput::Text(self.user.clone()))
    }
}
