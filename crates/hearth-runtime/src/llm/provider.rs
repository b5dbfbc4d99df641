use async_trait::async_trait;
use tracing::warn;

use super::error::LlmError;
use super::types::{ChatResponse, GenerateConfig, Message, ModelListResponse, ToolSchema};

/// LLM endpoint abstraction - the conversation engine only talks to this trait
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Submit the full ordered history and return the decoded completion
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        config: &GenerateConfig,
    ) -> Result<ChatResponse, LlmError>;

    /// Enumerate models served by the endpoint
    async fn list_models(&self) -> Result<ModelListResponse, LlmError>;

    /// Liveness check: the model-list call succeeds and returns at least one model.
    /// Never fails; errors are logged and reported as `false`.
    async fn heartbeat(&self) -> bool {
        match self.list_models().await {
            Ok(list) => !list.models.is_empty(),
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Heartbeat failed");
                false
            }
        }
    }

    /// Provider model name for logging/tracking
    fn model_name(&self) -> &str;
}
