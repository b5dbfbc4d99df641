use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method};
use serde_json::{json, Value};
use tracing::debug;

use super::decoder::decode;
use super::error::LlmError;
use super::provider::LLMProvider;
use super::types::*;

const CHAT_PATH: &str = "/v1/chat/completions";
const MODELS_PATH: &str = "/v1/models";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for OpenAI-compatible chat endpoints (vLLM, Ollama, llama.cpp server)
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self, LlmError> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::client(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: model.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        if !key.is_empty() {
            self.api_key = Some(key.to_string());
        }
        self
    }

    /// Upper bound for every request, including reading the body
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the chat request body
    fn build_request_body(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        config: &GenerateConfig,
    ) -> Value {
        let model = if config.model.is_empty() {
            &self.model
        } else {
            &config.model
        };

        let api_messages: Vec<Value> = messages.iter().map(message_to_api).collect();

        let mut body = json!({
            "model": model,
            "messages": api_messages,
            "stream": false,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
        });

        if !tools.is_empty() {
            let api_tools: Vec<Value> = tools.iter().map(tool_to_api).collect();
            body["tools"] = json!(api_tools);
        }

        body
    }

    /// Issue one request under the timeout and return the parsed JSON body.
    ///
    /// Non-success statuses carrying a JSON `error` envelope become
    /// `ProtocolJson`; everything else that goes wrong is classified here.
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, LlmError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "LLM request");

        let mut req = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json; charset=UTF-8");
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let exchange = async move {
            let response = req.send().await.map_err(|e| self.classify(e))?;
            let status = response.status();
            let text = response.text().await.map_err(|e| self.classify(e))?;
            Ok::<_, LlmError>((status, text))
        };

        let (status, text) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))??;

        if !status.is_success() {
            if let Ok(Value::Object(mut envelope)) = serde_json::from_str::<Value>(&text) {
                if let Some(payload) = envelope.remove("error") {
                    return Err(LlmError::ProtocolJson {
                        status: status.as_u16(),
                        payload,
                    });
                }
            }
            return Err(LlmError::client(format!("HTTP {}: {}", status, text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| LlmError::client(format!("response is not valid JSON: {}", e)))
    }

    fn classify(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::from(e)
        }
    }
}

/// Convert a history message to the OpenAI wire format
fn message_to_api(msg: &Message) -> Value {
    let mut api = json!({ "role": msg.role.as_str() });

    match &msg.tool_calls {
        Some(calls) if !calls.is_empty() => {
            let calls: Vec<Value> = calls
                .iter()
                .map(|tc| {
                    // Wire format wants arguments as a JSON-encoded string
                    let arguments = match &tc.arguments {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.function_name,
                            "arguments": arguments,
                        }
                    })
                })
                .collect();
            api["tool_calls"] = json!(calls);
        }
        _ => {
            api["content"] = json!(msg.content.clone().unwrap_or_default());
        }
    }

    if let Some(name) = &msg.name {
        api["name"] = json!(name);
    }
    if let Some(id) = &msg.tool_call_id {
        api["tool_call_id"] = json!(id);
    }

    api
}

/// Convert ToolSchema to OpenAI function calling format
fn tool_to_api(tool: &ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

#[async_trait]
impl LLMProvider for ChatClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        config: &GenerateConfig,
    ) -> Result<ChatResponse, LlmError> {
        let body = self.build_request_body(messages, tools, config);
        let payload = self.request(Method::POST, CHAT_PATH, Some(&body)).await?;

        match decode(&payload)? {
            ApiResponse::Chat(chat) => Ok(chat),
            ApiResponse::ModelList(_) => Err(LlmError::client(
                "expected a chat completion, got a model list",
            )),
        }
    }

    async fn list_models(&self) -> Result<ModelListResponse, LlmError> {
        let payload = self.request(Method::GET, MODELS_PATH, None).await?;

        match decode(&payload)? {
            ApiResponse::ModelList(list) => Ok(list),
            ApiResponse::Chat(_) => Err(LlmError::client(
                "expected a model list, got a chat completion",
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on an ephemeral port
    async fn serve_once(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn client(url: &str) -> ChatClient {
        ChatClient::new(url, "functionary")
            .unwrap()
            .with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_build_request_body() {
        let client = ChatClient::new("http://localhost:8000/", "functionary").unwrap();
        let messages = vec![Message::system("Be helpful"), Message::user("Hello")];
        let tools = vec![ToolSchema {
            name: "hass_turn_on".into(),
            description: "Turn on".into(),
            input_schema: json!({"type": "object"}),
        }];

        let body = client.build_request_body(&messages, &tools, &GenerateConfig::default());

        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(body["model"], "functionary");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["tools"][0]["function"]["name"], "hass_turn_on");
        assert_eq!(body["max_tokens"], 128);
    }

    #[test]
    fn test_tool_messages_on_the_wire() {
        let call = ToolCall::new("call_1", "hass_turn_on", json!({"entity_ids": ["light.a"]}));
        let assistant = message_to_api(&Message::assistant_tool_call(call));
        assert_eq!(assistant["role"], "assistant");
        assert!(assistant.get("content").is_none());
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            r#"{"entity_ids":["light.a"]}"#
        );

        let tool = message_to_api(&Message::tool("call_1", "hass_turn_on", "Success"));
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["name"], "hass_turn_on");
        assert_eq!(tool["tool_call_id"], "call_1");
        assert_eq!(tool["content"], "Success");
    }

    #[tokio::test]
    async fn test_chat_decodes_completion() {
        let body = json!({
            "object": "chat.completion",
            "choices": [{"message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}]
        })
        .to_string();
        let url = serve_once("HTTP/1.1 200 OK", body).await;

        let resp = client(&url)
            .chat(&[Message::user("hello")], &[], &GenerateConfig::default())
            .await
            .unwrap();
        assert_eq!(resp.message, "hi");
        assert!(resp.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_error_envelope_is_protocol_json_error() {
        let body = json!({"error": {"message": "model not found", "code": 404}}).to_string();
        let url = serve_once("HTTP/1.1 404 Not Found", body).await;

        let err = client(&url).list_models().await.unwrap_err();
        match err {
            LlmError::ProtocolJson { status, payload } => {
                assert_eq!(status, 404);
                assert_eq!(payload["message"], "model not found");
            }
            other => panic!("expected ProtocolJson, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_is_client_error() {
        let url = serve_once("HTTP/1.1 500 Internal Server Error", "boom".to_string()).await;
        let err = client(&url).list_models().await.unwrap_err();
        assert!(matches!(err, LlmError::Client(_)));
    }

    #[tokio::test]
    async fn test_unrecognized_payload_is_client_error() {
        let url = serve_once("HTTP/1.1 200 OK", json!({"status": "ok"}).to_string()).await;
        let err = client(&url).list_models().await.unwrap_err();
        assert!(matches!(err, LlmError::Client(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the socket open without ever answering
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = ChatClient::new(&format!("http://{}", addr), "m")
            .unwrap()
            .with_timeout(Duration::from_millis(200));
        let err = client.list_models().await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let client = client(&format!("http://{}", addr));

        let err = client.list_models().await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
        assert!(!client.heartbeat().await);
    }

    #[tokio::test]
    async fn test_heartbeat_requires_a_model() {
        let url = serve_once(
            "HTTP/1.1 200 OK",
            json!({"object": "list", "data": [{"id": "m", "object": "model"}]}).to_string(),
        )
        .await;
        assert!(client(&url).heartbeat().await);

        let url = serve_once("HTTP/1.1 200 OK", json!({"models": []}).to_string()).await;
        assert!(!client(&url).heartbeat().await);
    }
}
