use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::llm::{LlmProvider, LlmRequest, LlmResponse, MessageRole, TokenUsage};
use crate::domain::workflow::HttpMethod;
use crate::infrastructure::llm::http_client::HttpClientTrait;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    pub model: Option<String>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

pub(crate) fn wire_messages(request: &LlmRequest) -> Vec<WireMessage> {
    request
        .messages
        .iter()
        .map(|message| WireMessage {
            role: match message.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            },
            content: message.content.clone(),
        })
        .collect()
}

pub(crate) fn parse_completion(
    provider: &str,
    fallback_model: &str,
    body: serde_json::Value,
) -> DomainResult<LlmResponse> {
    let completion: ChatCompletionResponse = serde_json::from_value(body)
        .map_err(|err| DomainError::provider(format!("{provider} returned unexpected body: {err}")))?;
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| DomainError::provider(format!("{provider} returned no completion")))?;
    let mut response = LlmResponse::new(
        content,
        completion.model.unwrap_or_else(|| fallback_model.to_string()),
    );
    if let Some(usage) = completion.usage {
        response = response.with_usage(TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        });
    }
    Ok(response)
}

/// OpenAI chat completions.
#[derive(Debug)]
pub struct OpenAiProvider<C: HttpClientTrait> {
    client: Arc<C>,
    api_key: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiProvider<C> {
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
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for OpenAiProvider<C> {
    async fn complete(&self, request: &LlmRequest) -> DomainResult<LlmResponse> {
        let body = serde_json::to_value(ChatCompletionRequest {
            model: request.model.clone(),
            messages: wire_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        })?;
        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )];
        let response = self
            .client
            .request(
                HttpMethod::Post,
                &format!("{}/chat/completions", self.base_url),
                &headers,
                Some(&body),
            )
            .await?;
        if !response.is_success() {
            return Err(DomainError::provider(format!(
                "open_ai returned status {}: {}",
                response.status, response.body
            )));
        }
        parse_completion("open_ai", &request.model, response.body)
    }

    fn provider_name(&self) -> &str {
        "open_ai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ChatMessage;
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use serde_json::json;

    fn request() -> LlmRequest {
        LlmRequest::new("gpt-4o", vec![ChatMessage::user("hi")]).with_temperature(0.1)
    }

    #[tokio::test]
    async fn test_complete_parses_response() {
        let client = Arc::new(MockHttpClient::new());
        client.push_response(
            200,
            json!({
                "model": "gpt-4o-2024-08-06",
                "choices": [{"message": {"role": "assistant", "content": "hello"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            }),
        );
        let provider = OpenAiProvider::new(client.clone(), "sk-test");

        let response = provider.complete(&request()).await.unwrap();
        assert_eq!(response.content, "hello");
        assert_eq!(response.model, "gpt-4o-2024-08-06");
        assert_eq!(response.usage.unwrap().total_tokens, 5);

        let sent = client.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.ends_with("/chat/completions"));
        assert_eq!(
            sent[0].headers[0],
            ("Authorization".to_string(), "Bearer sk-test".to_string())
        );
        assert_eq!(sent[0].body.as_ref().unwrap()["temperature"], json!(0.1));
    }

    #[tokio::test]
    async fn test_error_status_surfaces_body() {
        let client = Arc::new(MockHttpClient::new());
        client.push_response(401, json!({"error": {"message": "bad key"}}));
        let provider = OpenAiProvider::new(client, "sk-bad");

        let err = provider.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn test_empty_choices_rejected() {
        let client = Arc::new(MockHttpClient::new());
        client.push_response(200, json!({"choices": []}));
        let provider = OpenAiProvider::new(client, "sk-test");

        assert!(provider.complete(&request()).await.is_err());
    }
}
