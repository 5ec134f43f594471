use std::fmt::Debug;
use std::sync::Arc;

use crate::domain::credential::ProviderKind;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::llm::LlmProvider;
use crate::infrastructure::llm::anthropic::AnthropicProvider;
use crate::infrastructure::llm::azure_openai::AzureOpenAiProvider;
use crate::infrastructure::llm::google::GoogleProvider;
use crate::infrastructure::llm::http_client::HttpClient;
use crate::infrastructure::llm::openai::OpenAiProvider;

/// Builds a provider for one call, from an unsealed credential.
pub trait ProviderFactory: Send + Sync + Debug {
    fn create(
        &self,
        kind: ProviderKind,
        api_key: &str,
        endpoint: Option<&str>,
    ) -> DomainResult<Arc<dyn LlmProvider>>;
}

/// Production factory backed by one shared reqwest client.
#[derive(Debug)]
pub struct HttpProviderFactory {
    client: Arc<HttpClient>,
}

impl HttpProviderFactory {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        api_key: &str,
        endpoint: Option<&str>,
    ) -> DomainResult<Arc<dyn LlmProvider>> {
        Ok(match kind {
            ProviderKind::OpenAi => {
                let mut provider = OpenAiProvider::new(self.client.clone(), api_key);
                if let Some(endpoint) = endpoint {
                    provider = provider.with_base_url(endpoint);
                }
                Arc::new(provider)
            }
            ProviderKind::AzureOpenAi => {
                let endpoint = endpoint.ok_or_else(|| {
                    DomainError::configuration("azure_open_ai credentials require an endpoint")
                })?;
                Arc::new(AzureOpenAiProvider::new(self.client.clone(), api_key, endpoint))
            }
            ProviderKind::Anthropic => {
                let mut provider = AnthropicProvider::new(self.client.clone(), api_key);
                if let Some(endpoint) = endpoint {
                    provider = provider.with_base_url(endpoint);
                }
                Arc::new(provider)
            }
            ProviderKind::Google => {
                let mut provider = GoogleProvider::new(self.client.clone(), api_key);
                if let Some(endpoint) = endpoint {
                    provider = provider.with_base_url(endpoint);
                }
                Arc::new(provider)
            }
        })
    }
}
