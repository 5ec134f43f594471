use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::workflow::HttpMethod;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP response reduced to what callers need: the status code and a
/// JSON body. Non-JSON bodies come back as a JSON string.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub status: u16,
    pub body: Value,
}

impl JsonResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Thin HTTP seam so providers and webhook steps can be tested without
/// a network.
#[async_trait]
pub trait HttpClientTrait: Send + Sync + Debug {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> DomainResult<JsonResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> DomainResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> DomainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DomainError::internal(format!("http client init failed: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> DomainResult<JsonResponse> {
        let mut builder = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Delete => self.client.delete(url),
        };
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| DomainError::provider(format!("request to {url} failed: {err}")))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|err| DomainError::provider(format!("reading response body failed: {err}")))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(JsonResponse { status, body })
    }
}
