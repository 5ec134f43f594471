use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::error::DomainResult;
use crate::domain::storage::{Storage, StorageEntity, StorageKey};

/// Map-backed storage for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryStorage<E: StorageEntity> {
    items: RwLock<HashMap<String, E>>,
}

impl<E: StorageEntity> InMemoryStorage<E> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<E: StorageEntity> Storage<E> for InMemoryStorage<E> {
    async fn get(&self, key: &E::Key) -> DomainResult<Option<E>> {
        Ok(self.items.read().await.get(key.as_str()).cloned())
    }

    async fn put(&self, entity: &E) -> DomainResult<()> {
        self.items
            .write()
            .await
            .insert(entity.storage_key().as_str().to_string(), entity.clone());
        Ok(())
    }

    async fn delete(&self, key: &E::Key) -> DomainResult<bool> {
        Ok(self.items.write().await.remove(key.as_str()).is_some())
    }

    async fn list(&self) -> DomainResult<Vec<E>> {
        Ok(self.items.read().await.values().cloned().collect())
    }
}
