use std::fmt::Debug;

use serde::{Serialize, de::DeserializeOwned};

/// Key used to address an entity in storage.
pub trait StorageKey: Clone + Debug + Send + Sync {
    fn as_str(&self) -> &str;
}

impl StorageKey for String {
    fn as_str(&self) -> &str {
        self
    }
}

/// An entity that can be persisted through a [`Storage`](super::Storage)
/// backend. Entities are stored as JSON documents keyed by their storage key.
pub trait StorageEntity:
    Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    type Key: StorageKey;

    /// Logical collection name, used as the persistence namespace
    /// (table name in Postgres, map name in memory).
    const COLLECTION: &'static str;

    fn storage_key(&self) -> Self::Key;
}
