use serde::{Deserialize, Serialize};

/// One user utterance for the conversation engine
#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub text: String,
    /// Omit to start a new conversation
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub speech: String,
    pub conversation_id: String,
}

/// Conversation info as of the last finished turn
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub conversation_id: String,
    pub message_count: usize,
    /// A turn is currently running on this conversation
    pub busy: bool,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
}
