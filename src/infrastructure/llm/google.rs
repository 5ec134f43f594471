use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::llm::{LlmProvider, LlmRequest, LlmResponse, MessageRole, TokenUsage};
use crate::domain::workflow::HttpMethod;
use crate::infrastructure::llm::http_client::HttpClientTrait;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

/// Google Gemini `generateContent`. Assistant turns map to the `model`
/// role; the API key travels as a query parameter.
#[derive(Debug)]
pub struct GoogleProvider<C: HttpClientTrait> {
    client: Arc<C>,
    api_key: String,
    base_url: String,
}

impl<C: HttpClientTrait> GoogleProvider<C> {
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

    fn build_request(&self, request: &LlmRequest) -> GenerateContentRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();
        for message in &request.messages {
            match message.role {
                MessageRole::System => system_parts.push(Part {
                    text: Some(message.content.clone()),
                }),
                MessageRole::User | MessageRole::Assistant => contents.push(Content {
                    role: Some(
                        if message.role == MessageRole::User { "user" } else { "model" }
                            .to_string(),
                    ),
                    parts: vec![Part {
                        text: Some(message.content.clone()),
                    }],
                }),
            }
        }
        let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };
        GenerateContentRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(Content {
                    role: None,
                    parts: system_parts,
                })
            },
            generation_config,
        }
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for GoogleProvider<C> {
    async fn complete(&self, request: &LlmRequest) -> DomainResult<LlmResponse> {
        let body = serde_json::to_value(self.build_request(request))?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );
        let response = self
            .client
            .request(HttpMethod::Post, &url, &[], Some(&body))
            .await?;
        if !response.is_success() {
            return Err(DomainError::provider(format!(
                "google returned status {}: {}",
                response.status, response.body
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_value(response.body)
            .map_err(|err| DomainError::provider(format!("google returned unexpected body: {err}")))?;
        let content = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if content.is_empty() {
            return Err(DomainError::provider("google returned no text content"));
        }
        let mut result = LlmResponse::new(content, request.model.clone());
        if let Some(usage) = parsed.usage_metadata {
            result = result.with_usage(TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            });
        }
        Ok(result)
    }

    fn provider_name(&self) -> &str {
        "google"
    }
}
