//! Shared primitives for provider-agnostic chat-completion clients.
//!
//! The dispatcher talks to every provider through the [`ProviderClient`]
//! trait and the lightweight data types in this module.  Concrete wire
//! implementations live in [`crate::blockmind::clients`]; the trait
//! deliberately excludes conversation bookkeeping, which belongs to the
//! dispatcher.
//!
//! All implementations must be thread-safe (`Send + Sync`) so they can be
//! shared between async tasks.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A single tool call returned by the model in a native function-calling
/// response.  Providers assign an opaque id so the tool result can be
/// correlated back in a follow-up tool-role message.
#[derive(Debug, Clone)]
pub struct NativeToolCall {
    /// Provider-assigned call id, e.g. `"call_abc123"`.
    pub id: String,
    /// Tool name matching one of the [`ToolDefinition`]s sent in the request.
    pub name: String,
    /// Parsed JSON arguments supplied by the model for this call.
    pub arguments: serde_json::Value,
}

/// Provider-agnostic tool schema passed along with a chat request.
/// Serialised as an OpenAI-compatible `tools` array entry before
/// transmission.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    /// One-line description surfaced to the model to aid tool selection.
    pub description: String,
    /// JSON Schema object describing the accepted parameters.
    pub parameters_schema: serde_json::Value,
}

/// Role of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    /// A tool-result message correlating with a prior assistant
    /// [`NativeToolCall`].  Serialises as
    /// `{"role":"tool","tool_call_id":"<id>","content":"..."}`.
    Tool { call_id: String },
}

/// One chat message.  Content is stored as `Arc<str>` so histories can be
/// cheaply cloned across the dispatcher and its workers.
#[derive(Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Arc<str>,
    /// Non-empty only on assistant messages where the provider returned
    /// function-calling results.
    pub tool_calls: Vec<NativeToolCall>,
}

impl ChatMessage {
    pub fn system(content: impl AsRef<str>) -> Self {
        Self {
            role: ChatRole::System,
            content: Arc::from(content.as_ref()),
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl AsRef<str>) -> Self {
        Self {
            role: ChatRole::User,
            content: Arc::from(content.as_ref()),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl AsRef<str>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: Arc::from(content.as_ref()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl AsRef<str>) -> Self {
        Self {
            role: ChatRole::Tool {
                call_id: call_id.into(),
            },
            content: Arc::from(content.as_ref()),
            tool_calls: Vec::new(),
        }
    }
}

impl fmt::Debug for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatMessage")
            .field("role", &self.role)
            .field("content", &self.content)
            .field("tool_calls", &self.tool_calls.len())
            .finish()
    }
}

/// Logical payload every provider consumes.
#[derive(Debug)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolDefinition],
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A provider response: assistant text, tool calls, or both.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: ChatMessage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }
}

/// Errors a provider request can produce.  `RateLimited`, `Timeout` and
/// `Transport` drive the fallback chain; the rest short-circuit it.
#[derive(Debug, Clone)]
pub enum ProviderError {
    RateLimited,
    Timeout,
    Transport(String),
    BadRequest(String),
    Parse(String),
}

impl ProviderError {
    /// Whether the fallback chain should try the next provider.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Timeout | ProviderError::Transport(_)
        )
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::RateLimited => write!(f, "provider rate limited (HTTP 429)"),
            ProviderError::Timeout => write!(f, "provider request timed out"),
            ProviderError::Transport(msg) => write!(f, "transport failure: {}", msg),
            ProviderError::BadRequest(msg) => write!(f, "provider rejected request: {}", msg),
            ProviderError::Parse(msg) => write!(f, "unparseable provider response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Trait-driven abstraction over one concrete chat-completion provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Send one request/response chat completion with native tools exposed.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ProviderError>;

    /// Short label for logs and tests ("primary", "fallback", "local").
    fn label(&self) -> &str;

    /// Identifier used to select the upstream model (e.g. `"gpt-4.1-mini"`).
    fn model_name(&self) -> &str;
}
