//! Local chat provider (`/api/chat`).
//!
//! The final rung of the fallback chain.  The request body differs from the
//! cloud shape (options instead of top-level sampling fields, `stream:false`)
//! and the response nests the assistant message under `message` instead of
//! `choices[0].message`.  No API key, no rate limit; the dispatcher always
//! tries it before surfacing failure.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::blockmind::clients::common::{
    classify_status, classify_transport, decode_assistant_message, encode_messages, encode_tools,
    get_shared_http_client,
};
use crate::blockmind::provider::{ChatRequest, ChatResponse, ProviderClient, ProviderError};

/// Client for a locally hosted chat API.
pub struct LocalChatClient {
    base_url: String,
    model: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl LocalChatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout,
            http: get_shared_http_client().clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ProviderClient for LocalChatClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": encode_messages(request.messages),
            "tools": encode_tools(request.tools),
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        let url = self.endpoint();
        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            let err = classify_status(status, &text);
            if log::log_enabled!(log::Level::Error) {
                log::error!("local provider: HTTP {} from {}: {}", status, url, err);
            }
            return Err(err);
        }

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let message = parsed
            .get("message")
            .ok_or_else(|| ProviderError::Parse("no message in response".to_string()))?;

        Ok(ChatResponse {
            message: decode_assistant_message(message),
        })
    }

    fn label(&self) -> &str {
        "local"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
