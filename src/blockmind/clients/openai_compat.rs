//! Cloud provider client speaking the OpenAI chat-completions wire format.
//!
//! Both the primary and the fallback cloud providers are instances of this
//! client with different endpoint/key/model triples; the dispatcher composes
//! them into a fallback chain.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::blockmind::clients::common::{
    classify_status, classify_transport, decode_assistant_message, encode_messages, encode_tools,
    get_shared_http_client,
};
use crate::blockmind::provider::{ChatRequest, ChatResponse, ProviderClient, ProviderError};

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiCompatClient {
    label: String,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        label: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
            http: get_shared_http_client().clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": encode_messages(request.messages),
            "tools": encode_tools(request.tools),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let url = self.endpoint();
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
                log::error!("{} provider: HTTP {} from {}: {}", self.label, status, url, err);
            }
            return Err(err);
        }

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let message = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ProviderError::Parse("no choices in response".to_string()))?;

        Ok(ChatResponse {
            message: decode_assistant_message(message),
        })
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
