pub mod domains;
pub mod result;

pub use domains::{
    call_by_domain, execute_for_entities, execute_for_entity, partition_by_domain, split_domain,
    DomainGroups,
};
pub use result::ToolCallResult;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::llm::types::normalize_arguments;
use crate::llm::ToolSchema;
use crate::tool::{Tool, ToolError, ToolOutput};

/// Tool-message content for calls naming an unregistered tool
pub const TOOL_DOES_NOT_EXIST: &str = "The requested tool does not exist.";

/// Static name → tool mapping, filled once at startup
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name; duplicate names are rejected
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            bail!("Tool '{}' is already registered", name);
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Result of dispatching one tool call
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// No tool with that name; nothing was invoked
    NotFound,
    /// Arguments failed validation; nothing was forwarded downstream
    Rejected(String),
    /// A collaborator failed while the tool was running
    Failed(String),
    Completed(ToolOutput),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            DispatchOutcome::Completed(output) => output.is_success(),
            _ => false,
        }
    }

    /// Text placed in the tool message
    pub fn content(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::NotFound => f.write_str(TOOL_DOES_NOT_EXIST),
            DispatchOutcome::Rejected(reason) => write!(f, "Failure, {}", reason),
            DispatchOutcome::Failed(_) => {
                f.write_str("Failure, an error occurred while running the tool")
            }
            DispatchOutcome::Completed(output) => write!(f, "{}", output),
        }
    }
}

/// Validates tool arguments and runs registered tools
pub struct ToolDispatcher {
    registry: ToolRegistry,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    /// Normalize `raw_arguments` and run the named tool.
    ///
    /// Never fails: unknown tools, malformed arguments and collaborator errors
    /// all come back as an outcome the conversation can report to the model.
    pub async fn dispatch(&self, tool_name: &str, raw_arguments: &Value) -> DispatchOutcome {
        let Some(tool) = self.registry.get(tool_name) else {
            warn!(tool = tool_name, "Tool not found");
            return DispatchOutcome::NotFound;
        };

        let args = match normalize_arguments(raw_arguments) {
            Ok(args) => args,
            Err(reason) => {
                warn!(tool = tool_name, reason = %reason, "Malformed tool arguments");
                return DispatchOutcome::Rejected(format!("invalid arguments: {}", reason));
            }
        };

        info!(tool = tool_name, "Executing tool");

        match tool.execute(args).await {
            Ok(output) => {
                info!(tool = tool_name, success = output.is_success(), "Tool completed");
                DispatchOutcome::Completed(output)
            }
            Err(ToolError::Upstream(e)) => {
                error!(tool = tool_name, error = %e, "Tool execution failed");
                DispatchOutcome::Failed(e.to_string())
            }
            Err(e) => {
                warn!(tool = tool_name, error = %e, "Tool call rejected");
                DispatchOutcome::Rejected(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTool {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echo the 'text' argument".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match args.get("text").and_then(Value::as_str) {
                Some(text) => Ok(ToolOutput::Text(text.to_string())),
                None => Err(ToolError::invalid("'text' is required")),
            }
        }
    }

    fn dispatcher() -> (ToolDispatcher, Arc<EchoTool>) {
        let tool = Arc::new(EchoTool {
            calls: AtomicUsize::new(0),
        });
        let mut registry = ToolRegistry::new();
        registry.register(tool.clone()).unwrap();
        (ToolDispatcher::new(registry), tool)
    }

    #[tokio::test]
    async fn test_unknown_tool_invokes_nothing() {
        let (dispatcher, tool) = dispatcher();
        let outcome = dispatcher.dispatch("missing", &json!({})).await;
        assert_eq!(outcome, DispatchOutcome::NotFound);
        assert_eq!(outcome.content(), TOOL_DOES_NOT_EXIST);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_string_arguments_are_normalized() {
        let (dispatcher, _) = dispatcher();
        let outcome = dispatcher.dispatch("echo", &json!(r#"{"text":"hi"}"#)).await;
        assert_eq!(outcome, DispatchOutcome::Completed(ToolOutput::Text("hi".into())));
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_rejected() {
        let (dispatcher, tool) = dispatcher();
        let outcome = dispatcher.dispatch("echo", &json!("{not json")).await;
        assert!(matches!(outcome, DispatchOutcome::Rejected(_)));
        assert!(outcome.content().starts_with("Failure, invalid arguments"));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validation_error_is_rejected() {
        let (dispatcher, _) = dispatcher();
        let outcome = dispatcher.dispatch("echo", &json!({})).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Rejected("invalid arguments: 'text' is required".into())
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        let tool = Arc::new(EchoTool {
            calls: AtomicUsize::new(0),
        });
        registry.register(tool.clone()).unwrap();
        assert!(registry.register(tool).is_err());
        assert_eq!(registry.names(), vec!["echo".to_string()]);
    }
}
