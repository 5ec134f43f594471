pub mod sealer;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::credential::{CredentialId, ProviderKind};
use crate::domain::error::DomainResult;
use crate::domain::user::UserId;

pub use sealer::{CredentialSealer, key_hint};

/// A credential unsealed for immediate use. Never persisted or logged.
#[derive(Clone)]
pub struct ResolvedCredential {
    pub provider: ProviderKind,
    pub api_key: String,
    pub endpoint: Option<String>,
}

impl Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Looks up and unseals a credential on behalf of a requester. Only the
/// credential's owner may resolve it.
#[async_trait]
pub trait CredentialResolver: Send + Sync + Debug {
    async fn resolve(
        &self,
        id: &CredentialId,
        requester: &UserId,
    ) -> DomainResult<ResolvedCredential>;
}
