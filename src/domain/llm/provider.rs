use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::error::DomainResult;
use crate::domain::llm::request::LlmRequest;
use crate::domain::llm::response::LlmResponse;

/// A chat-completion backend. Implementations translate [`LlmRequest`]
/// to the provider's wire format and normalize the response.
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    async fn complete(&self, request: &LlmRequest) -> DomainResult<LlmResponse>;

    fn provider_name(&self) -> &str;
}
