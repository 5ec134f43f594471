use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::domain::workflow::HttpMethod;
use crate::infrastructure::llm::http_client::HttpClientTrait;
use crate::infrastructure::llm::openai::{ChatCompletionRequest, parse_completion, wire_messages};

pub const API_VERSION: &str = "2024-02-01";

/// Azure-hosted OpenAI deployments. Same wire format as OpenAI, but the
/// model names a deployment and the key travels in an `api-key` header.
#[derive(Debug)]
pub struct AzureOpenAiProvider<C: HttpClientTrait> {
    client: Arc<C>,
    api_key: String,
    /// Resource endpoint, e.g. `https://myresource.openai.azure.com`.
    endpoint: String,
}

impl<C: HttpClientTrait> AzureOpenAiProvider<C> {
    pub fn new(client: Arc<C>, api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for AzureOpenAiProvider<C> {
    async fn complete(&self, request: &LlmRequest) -> DomainResult<LlmResponse> {
        let body = serde_json::to_value(ChatCompletionRequest {
            model: request.model.clone(),
            messages: wire_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        })?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={API_VERSION}",
            self.endpoint, request.model
        );
        let headers = vec![("api-key".to_string(), self.api_key.clone())];
        let response = self
            .client
            .request(HttpMethod::Post, &url, &headers, Some(&body))
            .await?;
        if !response.is_success() {
            return Err(DomainError::provider(format!(
                "azure_open_ai returned status {}: {}",
                response.status, response.body
            )));
        }
        parse_completion("azure_open_ai", &request.model, response.body)
    }

    fn provider_name(&self) -> &str {
        "azure_open_ai"
    }
}
