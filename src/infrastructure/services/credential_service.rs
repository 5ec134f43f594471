use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::credential::{CredentialId, IntegrationCredential, ProviderKind};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::storage::Storage;
use crate::domain::user::UserId;
use crate::infrastructure::credential::{
    CredentialResolver, CredentialSealer, ResolvedCredential, key_hint,
};

/// Manages sealed provider credentials. API keys are sealed on the way in
/// and only ever leave this service through [`CredentialResolver::resolve`];
/// everything else sees the stored hint.
#[derive(Debug)]
pub struct CredentialService {
    credentials: Arc<dyn Storage<IntegrationCredential>>,
    sealer: CredentialSealer,
}

impl CredentialService {
    pub fn new(credentials: Arc<dyn Storage<IntegrationCredential>>, sealer: CredentialSealer) -> Self {
        Self {
            credentials,
            sealer,
        }
    }

    pub async fn create(
        &self,
        owner: &UserId,
        id: CredentialId,
        name: String,
        provider: ProviderKind,
        api_key: &str,
        endpoint: Option<String>,
    ) -> DomainResult<IntegrationCredential> {
        if self.credentials.exists(&id).await? {
            return Err(DomainError::conflict(format!(
                "credential '{id}' already exists"
            )));
        }
        if api_key.trim().is_empty() {
            return Err(DomainError::validation("api key cannot be empty"));
        }
        if provider.requires_endpoint() && endpoint.is_none() {
            return Err(DomainError::validation(format!(
                "provider '{}' requires an endpoint",
                provider.as_str()
            )));
        }
        let sealed = self.sealer.seal(api_key)?;
        let mut credential =
            IntegrationCredential::new(id, name, provider, owner.clone(), sealed, key_hint(api_key))?;
        if let Some(endpoint) = endpoint {
            credential = credential.with_endpoint(endpoint);
        }
        self.credentials.put(&credential).await?;
        info!(credential = %credential.id(), provider = provider.as_str(), "created credential");
        Ok(credential)
    }

    pub async fn get(&self, owner: &UserId, id: &CredentialId) -> DomainResult<IntegrationCredential> {
        self.owned(owner, id).await
    }

    pub async fn list(&self, owner: &UserId) -> DomainResult<Vec<IntegrationCredential>> {
        let mut credentials: Vec<IntegrationCredential> = self
            .credentials
            .list()
            .await?
            .into_iter()
            .filter(|credential| credential.owner() == owner)
            .collect();
        credentials.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(credentials)
    }

    /// Replaces the sealed key with a freshly sealed one.
    pub async fn rotate_key(
        &self,
        owner: &UserId,
        id: &CredentialId,
        api_key: &str,
    ) -> DomainResult<IntegrationCredential> {
        let mut credential = self.owned(owner, id).await?;
        if api_key.trim().is_empty() {
            return Err(DomainError::validation("api key cannot be empty"));
        }
        let sealed = self.sealer.seal(api_key)?;
        credential.set_sealed_key(sealed, key_hint(api_key));
        self.credentials.put(&credential).await?;
        info!(credential = %id, "rotated credential key");
        Ok(credential)
    }

    pub async fn set_enabled(
        &self,
        owner: &UserId,
        id: &CredentialId,
        enabled: bool,
    ) -> DomainResult<IntegrationCredential> {
        let mut credential = self.owned(owner, id).await?;
        credential.set_enabled(enabled);
        self.credentials.put(&credential).await?;
        Ok(credential)
    }

    pub async fn rename(
        &self,
        owner: &UserId,
        id: &CredentialId,
        name: String,
    ) -> DomainResult<IntegrationCredential> {
        let mut credential = self.owned(owner, id).await?;
        if name.trim().is_empty() {
            return Err(DomainError::validation("credential name cannot be empty"));
        }
        credential.set_name(name);
        self.credentials.put(&credential).await?;
        Ok(credential)
    }

    pub async fn delete(&self, owner: &UserId, id: &CredentialId) -> DomainResult<()> {
        self.owned(owner, id).await?;
        self.credentials.delete(id).await?;
        Ok(())
    }

    async fn owned(&self, owner: &UserId, id: &CredentialId) -> DomainResult<IntegrationCredential> {
        let credential = self
            .credentials
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("credential '{id}'")))?;
        if credential.owner() != owner {
            return Err(DomainError::forbidden(format!(
                "credential '{id}' belongs to another user"
            )));
        }
        Ok(credential)
    }
}

#[async_trait]
impl CredentialResolver for CredentialService {
    async fn resolve(&self, id: &CredentialId, requester: &UserId) -> DomainResult<ResolvedCredential> {
        let credential = self.owned(requester, id).await?;
        if !credential.enabled() {
            return Err(DomainError::credential(format!(
                "credential '{id}' is disabled"
            )));
        }
        let api_key = self.sealer.open(credential.sealed_key())?;
        Ok(ResolvedCredential {
            provider: credential.provider(),
            api_key,
            endpoint: credential.endpoint().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    fn service() -> CredentialService {
        let credentials = Arc::new(InMemoryStorage::new());
        let sealer = CredentialSealer::new("a-test-sealing-secret").unwrap();
        CredentialService::new(credentials, sealer)
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn cid() -> CredentialId {
        CredentialId::new("openai-main").unwrap()
    }

    #[tokio::test]
    async fn test_create_seals_and_hints() {
        let service = service();
        let credential = service
            .create(
                &alice(),
                cid(),
                "Main key".into(),
                ProviderKind::OpenAi,
                "sk-verysecret1234",
                None,
            )
            .await
            .unwrap();
        assert_ne!(credential.sealed_key(), "sk-verysecret1234");
        assert_eq!(credential.key_hint(), "...1234");
        assert!(credential.enabled());
    }

    #[tokio::test]
    async fn test_azure_requires_endpoint() {
        let service = service();
        let result = service
            .create(
                &alice(),
                cid(),
                "Azure".into(),
                ProviderKind::AzureOpenAi,
                "key",
                None,
            )
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_resolve_round_trips_key() {
        let service = service();
        service
            .create(
                &alice(),
                cid(),
                "Main".into(),
                ProviderKind::Anthropic,
                "sk-ant-original",
                None,
            )
            .await
            .unwrap();
        let resolved = service.resolve(&cid(), &alice()).await.unwrap();
        assert_eq!(resolved.api_key, "sk-ant-original");
        assert_eq!(resolved.provider, ProviderKind::Anthropic);
    }

    #[tokio::test]
    async fn test_resolve_denied_for_non_owner_and_disabled() {
        let service = service();
        service
            .create(&alice(), cid(), "Main".into(), ProviderKind::OpenAi, "sk-k", None)
            .await
            .unwrap();

        let bob = UserId::new("bob").unwrap();
        assert!(matches!(
            service.resolve(&cid(), &bob).await,
            Err(DomainError::Forbidden(_))
        ));

        service.set_enabled(&alice(), &cid(), false).await.unwrap();
        assert!(matches!(
            service.resolve(&cid(), &alice()).await,
            Err(DomainError::Credential(_))
        ));
    }

    #[tokio::test]
    async fn test_rotate_replaces_hint() {
        let service = service();
        service
            .create(&alice(), cid(), "Main".into(), ProviderKind::OpenAi, "sk-old-9999", None)
            .await
            .unwrap();
        let rotated = service.rotate_key(&alice(), &cid(), "sk-new-5678").await.unwrap();
        assert_eq!(rotated.key_hint(), "...5678");
        let resolved = service.resolve(&cid(), &alice()).await.unwrap();
        assert_eq!(resolved.api_key, "sk-new-5678");
    }
}
