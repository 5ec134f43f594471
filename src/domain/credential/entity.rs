use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::slug::validate_slug;
use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::user::UserId;

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    AzureOpenAi,
    Anthropic,
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "open_ai",
            ProviderKind::AzureOpenAi => "azure_open_ai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
        }
    }

    /// Whether a credential for this provider must carry an endpoint.
    pub fn requires_endpoint(&self) -> bool {
        matches!(self, ProviderKind::AzureOpenAi)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialId(String);

impl CredentialId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        validate_slug("credential", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CredentialId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CredentialId> for String {
    fn from(id: CredentialId) -> Self {
        id.0
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for CredentialId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// A provider API key owned by a user. The key itself is sealed before
/// the entity is persisted and only `key_hint` (the last four characters)
/// ever leaves the service in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationCredential {
    id: CredentialId,
    name: String,
    provider: ProviderKind,
    owner: UserId,
    /// Base64 blob produced by the credential sealer.
    sealed_key: String,
    key_hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    /// Disabled credentials cannot be resolved for workflow runs.
    #[serde(default = "enabled_default")]
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IntegrationCredential {
    pub fn new(
        id: CredentialId,
        name: impl Into<String>,
        provider: ProviderKind,
        owner: UserId,
        sealed_key: impl Into<String>,
        key_hint: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("credential name cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id,
            name,
            provider,
            owner,
            sealed_key: sealed_key.into(),
            key_hint: key_hint.into(),
            endpoint: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn id(&self) -> &CredentialId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn sealed_key(&self) -> &str {
        &self.sealed_key
    }

    pub fn key_hint(&self) -> &str {
        &self.key_hint
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_sealed_key(&mut self, sealed_key: impl Into<String>, key_hint: impl Into<String>) {
        self.sealed_key = sealed_key.into();
        self.key_hint = key_hint.into();
        self.touch();
    }

    pub fn set_endpoint(&mut self, endpoint: Option<String>) {
        self.endpoint = endpoint;
        self.touch();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn enabled_default() -> bool {
    true
}

impl StorageEntity for IntegrationCredential {
    type Key = CredentialId;
    const COLLECTION: &'static str = "integration_credentials";

    fn storage_key(&self) -> CredentialId {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_serde() {
        let json = serde_json::to_string(&ProviderKind::AzureOpenAi).unwrap();
        assert_eq!(json, "\"azure_open_ai\"");
        let back: ProviderKind = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(back, ProviderKind::Anthropic);
    }

    #[test]
    fn test_credential_creation() {
        let cred = IntegrationCredential::new(
            CredentialId::new("prod-openai").unwrap(),
            "Production OpenAI",
            ProviderKind::OpenAi,
            UserId::new("alice").unwrap(),
            "c2VhbGVk",
            "3xyz",
        )
        .unwrap();
        assert_eq!(cred.key_hint(), "3xyz");
        assert!(cred.endpoint().is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = IntegrationCredential::new(
            CredentialId::new("c").unwrap(),
            " ",
            ProviderKind::Google,
            UserId::new("alice").unwrap(),
            "blob",
            "hint",
        );
        assert!(result.is_err());
    }
}
