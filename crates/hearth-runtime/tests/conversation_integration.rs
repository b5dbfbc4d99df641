use anyhow::Result;
use async_trait::async_trait;
use hearth_runtime::dispatch::execute_for_entities;
use hearth_runtime::{
    ActionExecutor, ActionOutcome, ChatClient, ConversationEngine, EngineConfig, EntityDirectory,
    EntityState, ExposedEntities, ExposedEntity, MiniJinjaRenderer, Role, Tool, ToolDispatcher,
    ToolError, ToolOutput, ToolRegistry, ToolSchema, API_ERROR_RESPONSE,
};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read one HTTP request and return its body
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                return String::from_utf8_lossy(&buf[header_end + 4..]).to_string();
            }
        }
    }
    String::new()
}

/// Answer successive connections with the given JSON bodies, recording request bodies
async fn serve_sequence(bodies: Vec<Value>) -> (String, Arc<Mutex<Vec<Value>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    tokio::spawn(async move {
        for body in bodies {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            recorder
                .lock()
                .unwrap()
                .push(serde_json::from_str(&request).unwrap_or(Value::Null));
            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{}", addr), seen)
}

fn completion(message: Value) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "functionary",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 42, "completion_tokens": 7}
    })
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ActionExecutor for Recorder {
    async fn call_action(
        &self,
        entity_ids: &[String],
        domain: &str,
        action: &str,
        _data: Option<Map<String, Value>>,
    ) -> Result<ActionOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}.{} {}", domain, action, entity_ids.join(",")));
        Ok(ActionOutcome::ok())
    }

    async fn query_action(
        &self,
        _entity_ids: &[String],
        _domain: &str,
        _action: &str,
        _data: Option<Map<String, Value>>,
    ) -> Result<Value> {
        Ok(Value::Null)
    }
}

struct TurnOn(Arc<Recorder>);

#[async_trait]
impl Tool for TurnOn {
    fn name(&self) -> &str {
        "hass_turn_on"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hass_turn_on".into(),
            description: "Turn on entities".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"entity_ids": {"type": "array", "items": {"type": "string"}}},
                "required": ["entity_ids"]
            }),
        }
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let ids: Vec<String> = serde_json::from_value(args.get("entity_ids").cloned().unwrap_or_default())
            .map_err(|e| ToolError::invalid(e.to_string()))?;
        Ok(ToolOutput::Result(
            execute_for_entities(self.0.as_ref(), &ids, &["light"], "turn_on", None).await,
        ))
    }
}

struct Kitchen;

#[async_trait]
impl EntityDirectory for Kitchen {
    async fn exposed_entities(&self) -> Result<ExposedEntities> {
        let mut exposed = ExposedEntities::default();
        exposed.add_to_area(
            "Kitchen",
            ExposedEntity {
                entity_id: "light.kitchen".into(),
                name: "Kitchen Light".into(),
                state: Some("off".into()),
                attributes: Map::new(),
                aliases: vec![],
            },
        );
        Ok(exposed)
    }

    async fn entity_state(&self, _entity_id: &str) -> Result<Option<EntityState>> {
        Ok(None)
    }
}

fn engine(url: &str, recorder: Arc<Recorder>) -> ConversationEngine {
    let client = ChatClient::new(url, "functionary")
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(TurnOn(recorder))).unwrap();
    ConversationEngine::new(
        EngineConfig {
            model: "functionary".into(),
            ..EngineConfig::default()
        },
        Arc::new(client),
        Arc::new(ToolDispatcher::new(registry)),
        Arc::new(Kitchen),
        Arc::new(MiniJinjaRenderer::new()),
    )
}

#[tokio::test]
async fn test_turn_over_http_with_tool_call() {
    let (url, seen) = serve_sequence(vec![
        completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "hass_turn_on", "arguments": "{\"entity_ids\": [\"light.kitchen\"]}"}
            }]
        })),
        completion(json!({"role": "assistant", "content": "The kitchen light is on."})),
    ])
    .await;

    let recorder = Arc::new(Recorder::default());
    let engine = engine(&url, recorder.clone());
    let outcome = engine.process(None, "turn on the kitchen light", "en").await;

    assert_eq!(outcome.speech, "The kitchen light is on.");
    assert_eq!(*recorder.calls.lock().unwrap(), vec!["light.turn_on light.kitchen".to_string()]);

    let requests = seen.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    let first = &requests[0]["messages"];
    assert_eq!(first[0]["role"], "system");
    assert!(first[0]["content"]
        .as_str()
        .unwrap()
        .contains("light.kitchen Kitchen Light - off"));
    assert_eq!(requests[0]["tools"][0]["function"]["name"], "hass_turn_on");

    // Second submission carries the tool exchange
    let second = requests[1]["messages"].as_array().unwrap();
    assert_eq!(second.len(), 4);
    assert_eq!(second[2]["tool_calls"][0]["id"], "call_1");
    assert_eq!(second[3]["role"], "tool");
    assert_eq!(second[3]["tool_call_id"], "call_1");
    assert_eq!(second[3]["content"], "Success");

    let history = engine.history(&outcome.session_id).await.unwrap();
    assert_eq!(history.last().unwrap().role, Role::Assistant);
    assert_eq!(history.len(), 5);
}

#[tokio::test]
async fn test_unreachable_endpoint_returns_apology() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let engine = engine(&url, Arc::new(Recorder::default()));
    let outcome = engine.process(None, "hello", "en").await;
    assert_eq!(outcome.speech, API_ERROR_RESPONSE);

    // A retry on the same session continues the same history
    let retry = engine.process(Some(&outcome.session_id), "hello again", "en").await;
    assert_eq!(retry.session_id, outcome.session_id);
    let roles: Vec<Role> = engine
        .history(&outcome.session_id)
        .await
        .unwrap()
        .iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::User]);
}
