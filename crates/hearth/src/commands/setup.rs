use crate::config::Config;
use anyhow::{Context, Result};
use hearth_adapters::{register_home_tools, HomeAssistantClient};
use hearth_runtime::{
    ActionExecutor, ChatClient, ConversationEngine, EntityDirectory, LLMProvider,
    MiniJinjaRenderer, PromptRenderer, ToolDispatcher, ToolRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the LLM client from config (API key falls back to HEARTH_LLM_API_KEY)
pub fn build_provider(config: &Config) -> Result<Arc<ChatClient>> {
    let mut client = ChatClient::new(&config.llm.base_url, &config.llm.model)
        .context("Failed to create LLM client")?
        .with_timeout(Duration::from_secs(config.llm.timeout_secs));
    if let Some(key) = config.llm.api_key() {
        client = client.with_api_key(&key);
    }
    Ok(Arc::new(client))
}

/// Wire the LLM client, Home Assistant collaborators and tool catalogue into an engine
pub async fn build_engine(config: &Config) -> Result<ConversationEngine> {
    let provider = build_provider(config)?;
    if !provider.heartbeat().await {
        warn!(
            base_url = %provider.base_url(),
            "LLM endpoint did not answer the heartbeat; conversations will fail until it is reachable"
        );
    }

    let token = config.home_assistant.token()?;
    let hass = Arc::new(
        HomeAssistantClient::new(&config.home_assistant.url, &token)?
            .with_expose_domains(config.home_assistant.expose_domains.clone()),
    );
    let executor: Arc<dyn ActionExecutor> = hass.clone();
    let directory: Arc<dyn EntityDirectory> = hass.clone();

    let mut registry = ToolRegistry::new();
    register_home_tools(
        &mut registry,
        executor,
        directory.clone(),
        &config.conversation.current_user,
    )?;
    info!(tools = registry.len(), "Tool catalogue registered");

    let renderer: Arc<dyn PromptRenderer> = if config.conversation.remote_templates {
        hass
    } else {
        Arc::new(MiniJinjaRenderer::new())
    };

    Ok(ConversationEngine::new(
        config.engine_config()?,
        provider,
        Arc::new(ToolDispatcher::new(registry)),
        directory,
        renderer,
    ))
}
