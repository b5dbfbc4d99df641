use std::time::Duration;

use serde_json::Value;

/// Failure categories of the LLM client.
///
/// The conversation engine catches every variant and turns it into a fixed
/// apology; the detail only goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Connection refused, DNS failure, socket errors
    #[error("transport error while talking to the server: {0}")]
    Transport(String),

    #[error("timeout after {0:?} while talking to the server")]
    Timeout(Duration),

    /// JSON error envelope returned with a non-success status
    #[error("server returned an error (status {status}): {payload}")]
    ProtocolJson { status: u16, payload: Value },

    /// Anything else, including payloads the decoder does not recognize
    #[error("client error: {0}")]
    Client(String),
}

impl LlmError {
    pub fn client(msg: impl Into<String>) -> Self {
        LlmError::Client(msg.into())
    }

    /// Short machine-friendly label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Transport(_) => "transport",
            LlmError::Timeout(_) => "timeout",
            LlmError::ProtocolJson { .. } => "protocol_json",
            LlmError::Client(_) => "client",
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_request() || e.is_body() {
            LlmError::Transport(e.to_string())
        } else {
            LlmError::Client(e.to_string())
        }
    }
}
