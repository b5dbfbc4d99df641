pub mod conversation;
pub mod dispatch;
pub mod host;
pub mod llm;
pub mod prompt;
pub mod session;
pub mod tool;

pub use conversation::{
    ConversationEngine, EngineConfig, SessionInfo, ToolFailurePolicy, TurnOutcome, API_ERROR_RESPONSE,
    LOOP_LIMIT_RESPONSE, PROMPT_ERROR_RESPONSE,
};
pub use dispatch::{
    DispatchOutcome, ToolCallResult, ToolDispatcher, ToolRegistry, TOOL_DOES_NOT_EXIST,
};
pub use host::{
    ActionExecutor, ActionOutcome, EntityDirectory, EntityState, ExposedEntities, ExposedEntity,
    PromptRenderer, TemplateError,
};
pub use llm::{
    ApiResponse, ChatClient, ChatResponse, GenerateConfig, LLMProvider, LlmError, Message,
    ModelInfo, ModelListResponse, Role, ToolCall, ToolSchema, Usage,
};
pub use prompt::{MiniJinjaRenderer, DEFAULT_PROMPT_SYSTEM};
pub use session::{Session, SessionStore};
pub use tool::{Tool, ToolError, ToolOutput};

/// Initialize structured JSON logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
