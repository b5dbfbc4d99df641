pub mod client;
pub mod decoder;
pub mod error;
pub mod provider;
pub mod types;

pub use client::ChatClient;
pub use decoder::{decode, detect_shape, WireShape};
pub use error::LlmError;
pub use provider::LLMProvider;
pub use types::{
    ApiResponse, ChatResponse, GenerateConfig, Message, ModelInfo, ModelListResponse, Role,
    ToolCall, ToolSchema, Usage,
};
