use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::error::DomainResult;
use crate::domain::storage::entity::StorageEntity;

/// Generic persistence interface. Backends store entities as JSON documents
/// addressed by key within the entity's collection.
#[async_trait]
pub trait Storage<E: StorageEntity>: Send + Sync + Debug {
    async fn get(&self, key: &E::Key) -> DomainResult<Option<E>>;

    async fn put(&self, entity: &E) -> DomainResult<()>;

    /// Returns `true` if an entity was deleted.
    async fn delete(&self, key: &E::Key) -> DomainResult<bool>;

    async fn list(&self) -> DomainResult<Vec<E>>;

    async fn exists(&self, key: &E::Key) -> DomainResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn count(&self) -> DomainResult<usize> {
        Ok(self.list().await?.len())
    }
}
