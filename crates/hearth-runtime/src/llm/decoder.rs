//! Structural decoding of endpoint payloads.
//!
//! The endpoint does not declare which kind of payload it returns, so the
//! decoder inspects the JSON first (`detect_shape`) and only then extracts typed
//! fields. New wire formats are added as a `WireShape` variant plus an arm in
//! `detect_shape` and `decode`.

use serde_json::{Map, Value};

use super::error::LlmError;
use super::types::{ApiResponse, ChatResponse, ModelInfo, ModelListResponse, ToolCall, Usage};

const MODEL_OBJECT: &str = "model";
const CHAT_COMPLETION_OBJECT: &str = "chat.completion";

/// Payload shapes understood by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// `{"object": "list", "data": [{"id": .., "object": "model"}]}`
    TaggedModelList,
    /// `{"object": "chat.completion", "choices": [..]}`
    ChatCompletion,
    /// Ollama native `/api/tags`: `{"models": [{"name": .., "model": ..}]}`
    FlatModelList,
    /// Ollama native `/api/chat`: `{"message": {..}, "done": true}`
    FlatChat,
}

/// Decide which shape a payload has, if any
pub fn detect_shape(payload: &Value) -> Option<WireShape> {
    let obj = payload.as_object()?;

    if model_entries(obj).is_some_and(|entries| entries.iter().any(is_tagged_model)) {
        return Some(WireShape::TaggedModelList);
    }
    if obj.get("object").and_then(Value::as_str) == Some(CHAT_COMPLETION_OBJECT) {
        return Some(WireShape::ChatCompletion);
    }
    if let Some(Value::Array(entries)) = obj.get("models") {
        if entries.iter().all(|e| e.get("name").is_some_and(Value::is_string)) {
            return Some(WireShape::FlatModelList);
        }
    }
    if obj.get("message").is_some_and(Value::is_object) && obj.contains_key("done") {
        return Some(WireShape::FlatChat);
    }
    None
}

/// Decode a payload into exactly one typed response
pub fn decode(payload: &Value) -> Result<ApiResponse, LlmError> {
    let shape = detect_shape(payload)
        .ok_or_else(|| LlmError::client("unknown response object"))?;

    match shape {
        WireShape::TaggedModelList => decode_tagged_models(payload).map(ApiResponse::ModelList),
        WireShape::ChatCompletion => decode_chat_completion(payload).map(ApiResponse::Chat),
        WireShape::FlatModelList => decode_flat_models(payload).map(ApiResponse::ModelList),
        WireShape::FlatChat => decode_flat_chat(payload).map(ApiResponse::Chat),
    }
}

fn model_entries(obj: &Map<String, Value>) -> Option<&Vec<Value>> {
    obj.get("data")
        .and_then(Value::as_array)
        .or_else(|| obj.get("models").and_then(Value::as_array))
}

fn is_tagged_model(entry: &Value) -> bool {
    entry.get("object").and_then(Value::as_str) == Some(MODEL_OBJECT)
}

fn decode_tagged_models(payload: &Value) -> Result<ModelListResponse, LlmError> {
    let entries = payload
        .as_object()
        .and_then(model_entries)
        .ok_or_else(|| LlmError::client("model list without entries"))?;

    let models = entries
        .iter()
        .filter(|e| is_tagged_model(e))
        .map(|e| {
            let id = e
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::client("model object without id"))?;
            Ok(ModelInfo {
                id: id.to_string(),
                owned_by: e.get("owned_by").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect::<Result<Vec<_>, LlmError>>()?;

    Ok(ModelListResponse { models })
}

fn decode_flat_models(payload: &Value) -> Result<ModelListResponse, LlmError> {
    let models = payload["models"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e["name"].as_str())
                .map(|name| ModelInfo {
                    id: name.to_string(),
                    owned_by: None,
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(ModelListResponse { models })
}

fn decode_chat_completion(payload: &Value) -> Result<ChatResponse, LlmError> {
    let choice = payload["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| LlmError::client("no choices in chat completion"))?;

    let message = choice
        .get("message")
        .filter(|m| m.is_object())
        .ok_or_else(|| LlmError::client("chat completion choice without message"))?;

    let usage = payload.get("usage").and_then(|u| {
        Some(Usage {
            input_tokens: token_count(u.get("prompt_tokens")?)?,
            output_tokens: token_count(u.get("completion_tokens")?)?,
        })
    });

    Ok(ChatResponse {
        message: message["content"].as_str().unwrap_or_default().to_string(),
        tool_calls: decode_tool_calls(message)?,
        finish_reason: choice["finish_reason"].as_str().map(str::to_string),
        usage,
    })
}

/// Token counter clamped to `u32::MAX`
fn token_count(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn decode_flat_chat(payload: &Value) -> Result<ChatResponse, LlmError> {
    let message = &payload["message"];

    let usage = match (
        token_count(&payload["prompt_eval_count"]),
        token_count(&payload["eval_count"]),
    ) {
        (Some(input_tokens), Some(output_tokens)) => Some(Usage {
            input_tokens,
            output_tokens,
        }),
        _ => None,
    };

    Ok(ChatResponse {
        message: message["content"].as_str().unwrap_or_default().to_string(),
        tool_calls: decode_tool_calls(message)?,
        finish_reason: payload["done_reason"].as_str().map(str::to_string),
        usage,
    })
}

fn decode_tool_calls(message: &Value) -> Result<Vec<ToolCall>, LlmError> {
    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    calls
        .iter()
        .enumerate()
        .map(|(idx, call)| {
            let function = call
                .get("function")
                .ok_or_else(|| LlmError::client("tool call without function"))?;
            let name = function["name"]
                .as_str()
                .ok_or_else(|| LlmError::client("tool call without function name"))?;
            // Flat-shape calls carry no id; synthesize a stable one per response
            let id = call["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", idx));
            Ok(ToolCall {
                id,
                function_name: name.to_string(),
                arguments: function.get("arguments").cloned().unwrap_or(Value::Null),
            })
        })
        .collect()
}
