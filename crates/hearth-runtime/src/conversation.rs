use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::dispatch::ToolDispatcher;
use crate::host::{EntityDirectory, PromptRenderer, TemplateError};
use crate::llm::{GenerateConfig, LLMProvider, LlmError, Message, ToolCall};
use crate::prompt::{template_variables, DEFAULT_PROMPT_SYSTEM};
use crate::session::{Session, SessionStore};

/// Spoken when the LLM endpoint could not be reached or answered with an error
pub const API_ERROR_RESPONSE: &str = "There was an error communicating with the API.";

/// Spoken when the system prompt could not be built
pub const PROMPT_ERROR_RESPONSE: &str =
    "I had a problem with my system prompt, please check the logs for more information.";

/// Spoken when the model keeps requesting tools past `max_iterations`
pub const LOOP_LIMIT_RESPONSE: &str =
    "Sorry, that took too many steps to complete. Please try asking in a different way.";

// ============================================================================
// EngineConfig
// ============================================================================

/// What to do with the remaining tool calls of a response after one fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailurePolicy {
    /// Run every requested call; failures are reported to the model
    #[default]
    Continue,
    /// Skip the calls that follow an unsuccessful one and re-submit right away
    AbortRemaining,
}

/// Conversation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Home name exposed to the prompt as `ha_name`
    #[serde(default = "default_ha_name")]
    pub ha_name: String,
    /// System prompt template
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Model requested from the endpoint
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Max model submissions per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub on_tool_failure: ToolFailurePolicy,
}

fn default_ha_name() -> String {
    "Home".to_string()
}

fn default_prompt() -> String {
    DEFAULT_PROMPT_SYSTEM.to_string()
}

fn default_max_tokens() -> u32 {
    128
}

fn default_temperature() -> f32 {
    0.8
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_iterations() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ha_name: default_ha_name(),
            prompt: default_prompt(),
            model: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_iterations: default_max_iterations(),
            on_tool_failure: ToolFailurePolicy::default(),
        }
    }
}

impl EngineConfig {
    fn generate_config(&self) -> GenerateConfig {
        GenerateConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

// ============================================================================
// ConversationEngine
// ============================================================================

/// Result of one user turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub speech: String,
    pub session_id: String,
}

/// Session summary as of its last finished turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    pub message_count: usize,
    /// A turn is in flight on this session
    pub busy: bool,
}

#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("tool loop exceeded {0} iterations")]
    IterationLimit(usize),
}

/// Turn engine: prompt → LLM → tool calls → dispatch → re-submit, until the
/// model answers with plain text.
pub struct ConversationEngine {
    config: EngineConfig,
    provider: Arc<dyn LLMProvider>,
    dispatcher: Arc<ToolDispatcher>,
    directory: Arc<dyn EntityDirectory>,
    renderer: Arc<dyn PromptRenderer>,
    sessions: SessionStore,
}

impl ConversationEngine {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn LLMProvider>,
        dispatcher: Arc<ToolDispatcher>,
        directory: Arc<dyn EntityDirectory>,
        renderer: Arc<dyn PromptRenderer>,
    ) -> Self {
        Self {
            config,
            provider,
            dispatcher,
            directory,
            renderer,
            sessions: SessionStore::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Copy of a session's history, if the session exists
    pub async fn history(&self, session_id: &str) -> Option<Vec<Message>> {
        let handle = self.sessions.get(session_id)?;
        let session = handle.lock().await;
        Some(session.messages.clone())
    }

    /// Message count and turn status without waiting for an in-flight turn
    pub fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        let handle = self.sessions.get(session_id)?;
        let message_count = self.sessions.committed_count(session_id)?;
        let busy = handle.try_lock().is_err();
        Some(SessionInfo {
            message_count,
            busy,
        })
    }

    /// Run one user turn. Never fails: every error ends in a fixed apology.
    pub async fn process(&self, session_id: Option<&str>, text: &str, language: &str) -> TurnOutcome {
        let handle = match session_id.and_then(|id| self.sessions.get(id)) {
            Some(handle) => handle,
            None => {
                let mut session = Session::new();
                match self.generate_prompt(language).await {
                    Ok(prompt) => session.add_message(Message::system(&prompt)),
                    Err(e) => {
                        error!(session_id = %session.id, error = %e, "Failed to render system prompt");
                        return TurnOutcome {
                            speech: PROMPT_ERROR_RESPONSE.to_string(),
                            session_id: session.id,
                        };
                    }
                }
                info!(session_id = %session.id, "Started new conversation");
                self.sessions.insert(session)
            }
        };

        // Held for the whole turn: one turn in flight per session
        let mut session = handle.lock().await;
        session.add_message(Message::user(text));

        let speech = match self.resolve(&mut session).await {
            Ok(answer) => answer,
            Err(TurnError::Llm(e)) => {
                error!(session_id = %session.id, kind = e.kind(), error = %e, "LLM request failed");
                API_ERROR_RESPONSE.to_string()
            }
            Err(e @ TurnError::IterationLimit(_)) => {
                warn!(session_id = %session.id, error = %e, "Stopping tool loop");
                LOOP_LIMIT_RESPONSE.to_string()
            }
        };

        self.sessions.commit(&session);
        TurnOutcome {
            speech,
            session_id: session.id.clone(),
        }
    }

    async fn generate_prompt(&self, language: &str) -> Result<String, TemplateError> {
        let exposed = self
            .directory
            .exposed_entities()
            .await
            .map_err(|e| TemplateError(format!("entity snapshot: {:#}", e)))?;
        let variables = template_variables(&self.config.ha_name, language, &exposed, Local::now());
        self.renderer.render(&self.config.prompt, &variables).await
    }

    /// Resolution loop; returns the final assistant text
    async fn resolve(&self, session: &mut Session) -> Result<String, TurnError> {
        let tools = self.dispatcher.schemas();
        let gen_config = self.config.generate_config();

        for iteration in 0..self.config.max_iterations {
            let response = self
                .provider
                .chat(&session.messages, &tools, &gen_config)
                .await?;

            let usage = response.usage.clone().unwrap_or_default();
            info!(
                session_id = %session.id,
                model = self.provider.model_name(),
                iteration,
                finish_reason = ?response.finish_reason,
                tool_calls = response.tool_calls.len(),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "LLM response received"
            );

            if !response.has_tool_calls() {
                session.add_message(Message::assistant(&response.message));
                return Ok(response.message);
            }

            self.run_tool_calls(session, response.tool_calls).await;
        }

        Err(TurnError::IterationLimit(self.config.max_iterations))
    }

    /// Dispatch each call in order, appending its request and result
    async fn run_tool_calls(&self, session: &mut Session, calls: Vec<ToolCall>) {
        let total = calls.len();
        for (idx, call) in calls.into_iter().enumerate() {
            debug!(tool = %call.function_name, call_id = %call.id, "Dispatching tool call");
            let outcome = self
                .dispatcher
                .dispatch(&call.function_name, &call.arguments)
                .await;

            let (id, name) = (call.id.clone(), call.function_name.clone());
            session.add_message(Message::assistant_tool_call(call));
            session.add_message(Message::tool(&id, &name, &outcome.content()));

            if !outcome.is_success() && self.config.on_tool_failure == ToolFailurePolicy::AbortRemaining {
                let skipped = total - idx - 1;
                if skipped > 0 {
                    warn!(tool = %name, call_id = %id, skipped, "Tool failed, skipping remaining calls");
                }
                break;
            }
        }
    }
}
