//! Shared test helpers: mock collaborators and a test AppState factory.
#![allow(dead_code)] // helpers used across multiple test crates

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use hearth_runtime::llm::{
    ChatResponse, GenerateConfig, LLMProvider, LlmError, Message, ModelInfo, ModelListResponse,
    ToolSchema,
};
use hearth_runtime::{
    ConversationEngine, EngineConfig, EntityDirectory, EntityState, ExposedEntities,
    MiniJinjaRenderer, ToolDispatcher, ToolRegistry,
};
use serde_json::Value;

use hearth_gateway::AppState;

/// Mock LLM provider that returns canned responses (no network)
pub struct MockLLMProvider {
    pub fail: bool,
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolSchema],
        _config: &GenerateConfig,
    ) -> Result<ChatResponse, LlmError> {
        if self.fail {
            return Err(LlmError::ProtocolJson {
                status: 500,
                payload: serde_json::json!({"message": "model crashed"}),
            });
        }
        Ok(ChatResponse::text("mock response"))
    }

    async fn list_models(&self) -> Result<ModelListResponse, LlmError> {
        Ok(ModelListResponse {
            models: vec![ModelInfo {
                id: "mock".into(),
                owned_by: None,
            }],
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Directory with no exposed entities
pub struct EmptyHome;

#[async_trait]
impl EntityDirectory for EmptyHome {
    async fn exposed_entities(&self) -> Result<ExposedEntities> {
        Ok(ExposedEntities::default())
    }

    async fn entity_state(&self, _entity_id: &str) -> Result<Option<EntityState>> {
        Ok(None)
    }
}

fn state_with(provider: MockLLMProvider) -> AppState {
    let engine = ConversationEngine::new(
        EngineConfig::default(),
        Arc::new(provider),
        Arc::new(ToolDispatcher::new(ToolRegistry::new())),
        Arc::new(EmptyHome),
        Arc::new(MiniJinjaRenderer::new()),
    );
    AppState::new(Arc::new(engine))
}

/// Build a test AppState backed by a mock LLM that always answers.
pub fn make_test_state() -> AppState {
    state_with(MockLLMProvider { fail: false })
}

/// Build a test AppState whose LLM always fails.
pub fn make_failing_state() -> AppState {
    state_with(MockLLMProvider { fail: true })
}

pub fn parse(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}
