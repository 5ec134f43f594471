use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::llm::{LlmProvider, LlmRequest, LlmResponse, MessageRole, TokenUsage};
use crate::domain::workflow::HttpMethod;
use crate::infrastructure::llm::http_client::HttpClientTrait;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic Messages API. System messages are lifted into the top-level
/// `system` field; only user/assistant turns go in `messages`.
#[derive(Debug)]
pub struct AnthropicProvider<C: HttpClientTrait> {
    client: Arc<C>,
    api_key: String,
    base_url: String,
}

impl<C: HttpClientTrait> AnthropicProvider<C> {
    pub fn new(client: Arc<C>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, request: &LlmRequest) -> MessagesRequest {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();
        for message in &request.messages {
            match message.role {
                MessageRole::System => system_parts.push(message.content.clone()),
                MessageRole::User => messages.push(WireMessage {
                    role: "user",
                    content: message.content.clone(),
                }),
                MessageRole::Assistant => messages.push(WireMessage {
                    role: "assistant",
                    content: message.content.clone(),
                }),
            }
        }
        MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for AnthropicProvider<C> {
    async fn complete(&self, request: &LlmRequest) -> DomainResult<LlmResponse> {
        let body = serde_json::to_value(self.build_request(request))?;
        let headers = vec![
            ("x-api-key".to_string(), self.api_key.clone()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ];
        let response = self
            .client
            .request(
                HttpMethod::Post,
                &format!("{}/v1/messages", self.base_url),
                &headers,
                Some(&body),
            )
            .await?;
        if !response.is_success() {
            return Err(DomainError::provider(format!(
                "anthropic returned status {}: {}",
                response.status, response.body
            )));
        }

        let parsed: MessagesResponse = serde_json::from_value(response.body).map_err(|err| {
            DomainError::provider(format!("anthropic returned unexpected body: {err}"))
        })?;
        let content = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if content.is_empty() {
            return Err(DomainError::provider("anthropic returned no text content"));
        }
        let mut result = LlmResponse::new(
            content,
            parsed.model.unwrap_or_else(|| request.model.clone()),
        );
        if let Some(usage) = parsed.usage {
            result = result.with_usage(TokenUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            });
        }
        Ok(result)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}
