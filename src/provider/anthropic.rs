//! Anthropic Messages API provider
//!
//! Plain text completions only: the engine parses structure out of the
//! reply itself, so tool use and streaming are not needed. The adapter
//! performs no automatic retry — transient failures surface typed and the
//! retry policy stays with the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CapabilityProvider, GeneratedContent, ProviderError, StructuredPrompt};
use crate::config::ProviderConfig;
use crate::domain::Role;

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicProvider {
    /// Create a provider from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        debug!(model = %config.model, "from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    /// Build the request body for the Messages API
    fn build_request_body(&self, prompt: &StructuredPrompt) -> serde_json::Value {
        debug!(%self.model, %prompt.max_tokens, "build_request_body: called");
        let mut messages: Vec<serde_json::Value> = prompt
            .turns
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": match turn.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": turn.content,
                })
            })
            .collect();

        // The API requires at least one message; a prompt with no prior
        // turns sends its instruction as the sole user message instead.
        if messages.is_empty() {
            messages.push(serde_json::json!({
                "role": "user",
                "content": prompt.instruction,
            }));
            return serde_json::json!({
                "model": self.model,
                "max_tokens": prompt.max_tokens.min(self.max_tokens),
                "messages": messages,
            });
        }

        serde_json::json!({
            "model": self.model,
            "max_tokens": prompt.max_tokens.min(self.max_tokens),
            "system": prompt.instruction,
            "messages": messages,
        })
    }

    /// Pull the text out of an API response
    fn parse_response(&self, api_response: MessagesResponse) -> Result<GeneratedContent, ProviderError> {
        debug!("parse_response: called");
        let text = api_response
            .content
            .into_iter()
            .find_map(|block| match block {
                ApiContentBlock::Text { text } => Some(text),
            })
            .ok_or_else(|| ProviderError::InvalidResponse("no text block in reply".to_string()))?;

        Ok(GeneratedContent { text })
    }
}

#[async_trait]
impl CapabilityProvider for AnthropicProvider {
    async fn generate(&self, prompt: StructuredPrompt) -> Result<GeneratedContent, ProviderError> {
        debug!(%self.model, turn_count = prompt.turns.len(), "generate: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&prompt);

        let response = self
            .http
            .post(url)
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            debug!("generate: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);

            return Err(ProviderError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "generate: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!("status {}: {}", status, text)));
        }

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        self.parse_response(api_response)
    }
}

// Messages API response types

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ApiContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}
