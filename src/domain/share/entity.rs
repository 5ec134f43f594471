use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::folder::FolderId;
use crate::domain::storage::StorageEntity;
use crate::domain::user::UserId;

/// A read-only grant of a folder subtree to another user. Prompts with
/// `shared` visibility inside the subtree become visible to the grantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryShare {
    id: String,
    folder_id: FolderId,
    owner: UserId,
    grantee: UserId,
    created_at: DateTime<Utc>,
}

impl LibraryShare {
    pub fn new(folder_id: FolderId, owner: UserId, grantee: UserId) -> DomainResult<Self> {
        if owner == grantee {
            return Err(DomainError::validation("cannot share a folder with yourself"));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            folder_id,
            owner,
            grantee,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn folder_id(&self) -> &FolderId {
        &self.folder_id
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn grantee(&self) -> &UserId {
        &self.grantee
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl StorageEntity for LibraryShare {
    type Key = String;
    const COLLECTION: &'static str = "library_shares";

    fn storage_key(&self) -> String {
        self.id.clone()
    }
}
