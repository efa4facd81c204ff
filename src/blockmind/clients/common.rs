//! Shared utilities used across provider client implementations.
//!
//! Both cloud providers and the local provider serialise messages the same
//! way and parse the same assistant-message object shape
//! (`{content, tool_calls}`); the helpers here keep that logic in one place,
//! together with a tuned shared [`reqwest`] client.

use lazy_static::lazy_static;
use serde_json::{json, Value};
use std::time::Duration;

use crate::blockmind::provider::{
    ChatMessage, ChatRole, NativeToolCall, ProviderError, ToolDefinition,
};

lazy_static! {
    /// Shared HTTP client with persistent connection pooling.
    ///
    /// A single client instance keeps TLS sessions and DNS lookups warm,
    /// which matters when every companion conversation turns into a burst of
    /// provider requests.  Per-request timeouts are applied by the callers
    /// from configuration.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = {
        reqwest::ClientBuilder::new()
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build shared HTTP client")
    };
}

/// Borrow the lazily initialised shared [`reqwest::Client`].
pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// Serialise messages to the OpenAI wire format.
///
/// | [`ChatRole`] variant | Wire representation |
/// |---|---|
/// | `System` | `{"role":"system","content":"..."}` |
/// | `User` | `{"role":"user","content":"..."}` |
/// | `Assistant` with tool_calls | `{"role":"assistant","content":null,"tool_calls":[...]}` |
/// | `Assistant` without tool_calls | `{"role":"assistant","content":"..."}` |
/// | `Tool { call_id }` | `{"role":"tool","tool_call_id":"<id>","content":"..."}` |
pub fn encode_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| match &msg.role {
            ChatRole::System => json!({
                "role": "system",
                "content": msg.content.as_ref()
            }),
            ChatRole::User => json!({
                "role": "user",
                "content": msg.content.as_ref()
            }),
            ChatRole::Assistant => {
                if msg.tool_calls.is_empty() {
                    json!({
                        "role": "assistant",
                        "content": msg.content.as_ref()
                    })
                } else {
                    let tool_calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": serde_json::to_string(&tc.arguments)
                                        .unwrap_or_else(|_| "{}".to_string())
                                }
                            })
                        })
                        .collect();
                    json!({
                        "role": "assistant",
                        "content": Value::Null,
                        "tool_calls": tool_calls
                    })
                }
            }
            ChatRole::Tool { call_id } => json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": msg.content.as_ref()
            }),
        })
        .collect()
}

/// Serialise the tools array.
pub fn encode_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters_schema
                }
            })
        })
        .collect()
}

/// Parse an assistant message object (`{content, tool_calls}`) shared by both
/// wire formats.  The cloud shape nests call arguments as a JSON string under
/// `function.arguments`; the local shape may supply them as an object.
/// Unknown fields are ignored.
pub fn decode_assistant_message(message: &Value) -> ChatMessage {
    let content: std::sync::Arc<str> = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(std::sync::Arc::from)
        .unwrap_or_else(|| std::sync::Arc::from(""));

    let tool_calls: Vec<NativeToolCall> = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let func = tc.get("function")?;
                    let name = func.get("name")?.as_str()?.to_string();
                    let arguments = match func.get("arguments") {
                        Some(Value::String(raw)) => serde_json::from_str(raw)
                            .unwrap_or(Value::Object(serde_json::Map::new())),
                        Some(obj @ Value::Object(_)) => obj.clone(),
                        _ => Value::Object(serde_json::Map::new()),
                    };
                    let id = tc
                        .get("id")
                        .and_then(|i| i.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                    Some(NativeToolCall { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    ChatMessage {
        role: ChatRole::Assistant,
        content,
        tool_calls,
    }
}

/// Map an HTTP error status to the matching [`ProviderError`].
pub fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    if status.as_u16() == 429 {
        ProviderError::RateLimited
    } else if status.is_client_error() {
        ProviderError::BadRequest(format!("HTTP {} — {}", status, truncate(body, 300)))
    } else {
        ProviderError::Transport(format!("HTTP {} — {}", status, truncate(body, 300)))
    }
}

/// Map a reqwest transport error; timeouts are distinguished because the
/// fallback policy treats them like rate limits.
pub fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(err.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
